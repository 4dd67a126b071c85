//! Command-line interface

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use compact_str::CompactString;
use tracing::info;

use crate::{
    client::{ActivityService, FetchOptions, FetchSource, Fetched, PulseClient, Settled},
    config::PulseConfig,
    result::{PulseError, Result},
};

#[derive(Debug, Parser)]
#[command(name = "pulse", version, about = "Cached, rate-limit aware GitHub statistics fetcher")]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write debug logs to the log directory
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a JSON url through the cache
    Fetch {
        url: String,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch a GitHub API endpoint, e.g. /users/octocat/repos
    Github {
        endpoint: String,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch several urls concurrently and report each outcome
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Summarize a user's public GitHub activity
    Stats {
        /// GitHub login, defaults to `github_user` from the config
        #[arg(long)]
        user: Option<String>,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove one url's entry, or every entry when no url is given
    Clear { url: Option<String> },
}

#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Bypass the cache for this request
    #[arg(long)]
    pub skip_cache: bool,
    /// Retries after the first attempt
    #[arg(long)]
    pub retries: Option<u32>,
    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Cache lifetime in seconds
    #[arg(long)]
    pub ttl_secs: Option<u64>,
    /// Give up immediately on 4xx responses other than 403/429
    #[arg(long)]
    pub no_retry_client_errors: bool,
}

impl FetchArgs {
    pub fn apply(&self, mut options: FetchOptions) -> FetchOptions {
        if let Some(retries) = self.retries {
            options = options.with_max_retries(retries);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options = options.with_timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(ttl_secs) = self.ttl_secs {
            options = options.with_cache_ttl(Duration::from_secs(ttl_secs));
        }
        options
            .with_skip_cache(self.skip_cache)
            .with_retry_client_errors(!self.no_retry_client_errors)
    }
}

/// Run a parsed command against `config`
pub async fn execute(command: Command, config: &PulseConfig) -> Result<()> {
    let client = PulseClient::new(config.client_config(), config.response_cache())?;
    let defaults = config.fetch_options();

    match command {
        Command::Fetch { url, fetch } => {
            let fetched = client
                .fetch_with_retry_outcome::<serde_json::Value>(&url, &fetch.apply(defaults))
                .await?;
            report_source(&url, &fetched);
            print_json(&fetched.data)
        },
        Command::Github { endpoint, fetch } => {
            let value: serde_json::Value =
                client.fetch_github(&endpoint, &fetch.apply(defaults)).await?;
            print_json(&value)
        },
        Command::Batch { urls, fetch } => {
            let results = client
                .batch_fetch::<serde_json::Value, _>(&urls, &fetch.apply(defaults))
                .await;
            let mut failed = 0;
            for (url, result) in urls.iter().zip(results) {
                match result {
                    Settled::Fulfilled(value) => println!("ok\t{url}\t{value}"),
                    Settled::Rejected(err) => {
                        failed += 1;
                        println!("error\t{url}\t{}", err.message);
                    },
                }
            }
            if failed > 0 {
                return Err(PulseError::GeneralError(
                    format!("{failed} of {} requests failed", urls.len()).into(),
                ));
            }
            Ok(())
        },
        Command::Stats { user } => {
            let user = user
                .map(CompactString::from)
                .or_else(|| config.github_user.clone());
            let user = match user {
                Some(user) => user,
                None => {
                    return Err(PulseError::config_validation_error(
                        "github_user",
                        "pass --user or set github_user in the config file",
                    ));
                },
            };
            let service = ActivityService::new(Arc::new(client), user)
                .with_contributions_url(config.contributions_url.clone())
                .with_options(defaults);
            let snapshot = service.snapshot().await;
            print_json(&snapshot)?;
            match snapshot.total_failure() {
                Some(err) => Err(PulseError::Fetch(err.clone())),
                None => Ok(()),
            }
        },
        Command::Cache { action: CacheAction::Clear { url } } => {
            match url {
                Some(url) => {
                    client.cache().clear(&url);
                    println!("cleared {url}");
                },
                None => {
                    let removed = client.cache().clear_all();
                    println!("cleared {removed} entries");
                },
            }
            Ok(())
        },
    }
}

fn report_source<T>(url: &str, fetched: &Fetched<T>) {
    match &fetched.source {
        FetchSource::RateLimitedCache => eprintln!("warning: rate limited, showing cached data"),
        FetchSource::StaleCache(err) => {
            eprintln!("warning: {} Showing cached data.", err.message)
        },
        FetchSource::Cache | FetchSource::Network => {
            info!(url, cached = fetched.is_cached(), "Fetch complete")
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PulseError::GeneralError(e.to_string().into()))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_with_overrides() {
        let cli = Cli::try_parse_from([
            "pulse", "fetch", "https://api.example.com/x", "--retries", "2", "--ttl-secs", "60",
            "--skip-cache",
        ])
        .unwrap();

        let Command::Fetch { url, fetch } = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(url, "https://api.example.com/x");

        let options = fetch.apply(FetchOptions::default());
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.cache_ttl, Some(Duration::from_secs(60)));
        assert!(options.skip_cache);
        assert!(options.retry_client_errors);
    }

    #[test]
    fn test_fetch_args_keep_config_defaults() {
        let defaults = FetchOptions::default().with_max_retries(7);
        let options = FetchArgs::default().apply(defaults);

        assert_eq!(options.max_retries, 7);
        assert_eq!(options.cache_ttl, None);
    }

    #[test]
    fn test_batch_requires_urls() {
        assert!(Cli::try_parse_from(["pulse", "batch"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pulse", "cache", "clear", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Cache { action: CacheAction::Clear { url: None } }));
    }
}
