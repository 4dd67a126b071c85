use std::{path::PathBuf, sync::Arc, time::Duration};

use compact_str::CompactString;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    cache::{DEFAULT_CACHE_PREFIX, DirStore, KeyValueStore, MemoryStore, ResponseCache},
    client::{
        ClientConfig, FetchOptions,
        config::{DEFAULT_GITHUB_API_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT},
        service::DEFAULT_CONTRIBUTIONS_URL,
    },
    result::{PulseError, Result},
};

/// On-disk settings, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub github_url: CompactString,
    pub github_user: Option<CompactString>,
    pub contributions_url: CompactString,
    pub cache_prefix: CompactString,
    /// Defaults to the platform cache directory
    pub cache_dir: Option<PathBuf>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub log_level: Option<CompactString>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            github_url: DEFAULT_GITHUB_API_URL.into(),
            github_user: None,
            contributions_url: DEFAULT_CONTRIBUTIONS_URL.into(),
            cache_prefix: DEFAULT_CACHE_PREFIX.into(),
            cache_dir: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            log_level: None,
        }
    }
}

impl PulseConfig {
    pub fn validate(&self) -> Result<()> {
        self.client_config().validate()?;

        if url::Url::parse(&self.contributions_url).is_err() {
            return Err(PulseError::config_validation_error(
                "contributions_url",
                "Contributions URL is not a valid URL format",
            ));
        }

        if self.timeout_ms == 0 {
            return Err(PulseError::config_validation_error(
                "timeout_ms",
                "Timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.github_url.clone())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_retries(self.max_retries)
    }

    /// Cache over the configured directory, falling back to memory when no
    /// cache directory can be determined
    pub fn response_cache(&self) -> ResponseCache {
        let store: Arc<dyn KeyValueStore> = match self.cache_dir.clone().map(DirStore::with_dir) {
            Some(store) => Arc::new(store),
            None => match DirStore::new() {
                Some(store) => Arc::new(store),
                None => {
                    warn!("No cache directory available, caching in memory only");
                    Arc::new(MemoryStore::new())
                },
            },
        };
        ResponseCache::new(store, self.cache_prefix.clone())
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = BaseDirs::new() {
        dirs.config_dir().join("folio-pulse.toml")
    } else {
        PathBuf::from("folio-pulse.toml")
    }
}

/// Load the configuration, writing defaults if the file does not exist yet
pub fn load_config(config_file: &PathBuf) -> Result<PulseConfig> {
    let config: PulseConfig = confy::load_path(config_file)
        .map_err(|e| PulseError::config_load_error(config_file.clone(), e))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PulseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fetch_options_follow_config() {
        let config = PulseConfig { timeout_ms: 2500, max_retries: 1, ..Default::default() };
        let options = config.fetch_options();

        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.max_retries, 1);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = PulseConfig { timeout_ms: 0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(PulseError::ConfigValidationError { field, .. }) if field == "timeout_ms"
        ));
    }

    #[test]
    fn test_rejects_bad_github_url() {
        let config = PulseConfig { github_url: "not a url".into(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_stored_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pulse.toml");
        let config = PulseConfig {
            github_user: Some("octo".into()),
            cache_dir: Some(temp_dir.path().join("cache")),
            max_retries: 5,
            ..Default::default()
        };

        confy::store_path(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_load_writes_defaults_for_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh.toml");

        assert_eq!(load_config(&path).unwrap(), PulseConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_response_cache_uses_configured_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = PulseConfig {
            cache_dir: Some(temp_dir.path().to_path_buf()),
            cache_prefix: "t_".into(),
            ..Default::default()
        };

        let cache = config.response_cache();
        cache.set("k", &1, Duration::from_secs(60));

        assert_eq!(cache.prefix(), "t_");
        assert_eq!(config.response_cache().get::<i32>("k"), Some(1));
    }
}
