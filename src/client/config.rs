//! Configuration for the fetch client

use std::{fmt, sync::Arc, time::Duration};

use compact_str::CompactString;

use super::error::{ClientError, Result};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = concat!("folio-pulse/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const GITHUB_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Client-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Prefix for relative GitHub endpoints
    pub github_base_url: CompactString,
    /// Sent with every request
    pub user_agent: CompactString,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            github_base_url: DEFAULT_GITHUB_API_URL.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl ClientConfig {
    pub fn new(github_base_url: impl Into<CompactString>) -> Self {
        Self {
            github_base_url: github_base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<CompactString>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.github_base_url.is_empty() {
            return Err(ClientError::config_validation(
                "github_url",
                "Base URL cannot be empty",
            ));
        }

        if !self.github_base_url.starts_with("http://")
            && !self.github_base_url.starts_with("https://")
        {
            return Err(ClientError::config_validation(
                "github_url",
                "Base URL must start with http:// or https://",
            ));
        }

        if url::Url::parse(&self.github_base_url).is_err() {
            return Err(ClientError::config_validation(
                "github_url",
                "Base URL is not a valid URL format",
            ));
        }

        if self.user_agent.is_empty() {
            return Err(ClientError::config_validation(
                "user_agent",
                "GitHub rejects requests without a User-Agent",
            ));
        }

        Ok(())
    }
}

/// Observer invoked with `(attempt, last_error)` right before each retry wait
pub type RetryObserver = Arc<dyn Fn(u32, &ClientError) + Send + Sync>;

/// Per-call knobs for [`PulseClient::fetch_with_retry`](super::PulseClient::fetch_with_retry)
#[derive(Clone)]
pub struct FetchOptions {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Deadline for each individual attempt
    pub timeout: Duration,
    /// Lifetime of the cached response; `None` uses the caller's default
    pub cache_ttl: Option<Duration>,
    /// Skip the initial cache read and the cache write on success
    pub skip_cache: bool,
    /// Keep retrying 4xx responses other than 403/429
    pub retry_client_errors: bool,
    /// Upper bound on a server-supplied `Retry-After` wait
    pub max_retry_delay: Duration,
    pub on_retry: Option<RetryObserver>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: None,
            skip_cache: false,
            retry_client_errors: true,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            on_retry: None,
        }
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("skip_cache", &self.skip_cache)
            .field("retry_client_errors", &self.retry_client_errors)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }

    pub fn with_retry_client_errors(mut self, retry: bool) -> Self {
        self.retry_client_errors = retry;
        self
    }

    pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    pub fn on_retry(mut self, observer: impl Fn(u32, &ClientError) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub(crate) fn ttl_or(&self, default: Duration) -> Duration {
        self.cache_ttl.unwrap_or(default)
    }
}
