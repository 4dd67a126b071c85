//! Resilient fetch client: read-through cache, bounded retries, rate-limit
//! awareness and per-attempt timeouts

use std::sync::Arc;

use chrono::Utc;
use compact_str::{CompactString, format_compact};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::{
    config::{ClientConfig, DEFAULT_CACHE_TTL, FetchOptions, GITHUB_CACHE_TTL},
    error::{ApiError, ClientError, ErrorKind},
    retry::{parse_retry_after, retry_delay},
    transport::{HttpTransport, ReqwestTransport},
};
use crate::cache::ResponseCache;

/// Where a returned value came from
#[derive(Debug, Clone, PartialEq)]
pub enum FetchSource {
    /// Fresh cache entry, no request made
    Cache,
    /// Successful network response
    Network,
    /// Rate limited, served a fresh cache entry instead
    RateLimitedCache,
    /// Every attempt failed, served a possibly expired cache entry
    StaleCache(ApiError),
}

/// A fetched value and its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub source: FetchSource,
}

impl<T> Fetched<T> {
    fn new(data: T, source: FetchSource) -> Self {
        Self { data, source }
    }

    pub fn is_cached(&self) -> bool {
        !matches!(self.source, FetchSource::Network)
    }
}

/// Per-url outcome of [`PulseClient::batch_fetch`]
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Fulfilled(T),
    Rejected(ApiError),
}

impl<T> Settled<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, ApiError>> for Settled<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled(value),
            Err(err) => Self::Rejected(err),
        }
    }
}

/// Read-only JSON client with caching and retries
#[derive(Debug, Clone)]
pub struct PulseClient {
    transport: Arc<dyn HttpTransport>,
    cache: ResponseCache,
    config: ClientConfig,
}

impl PulseClient {
    /// Client over a `reqwest` transport
    pub fn new(config: ClientConfig, cache: ResponseCache) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, cache, Arc::new(transport)))
    }

    pub fn with_transport(
        config: ClientConfig,
        cache: ResponseCache,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self { transport, cache, config }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch `url` as JSON, see [`PulseClient::fetch_with_retry_outcome`].
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<T, ApiError> {
        self.fetch_with_retry_outcome(url, options)
            .await
            .map(|fetched| fetched.data)
    }

    /// Fetch `url` as JSON and report where the value came from.
    ///
    /// A fresh cache entry short-circuits the request. Otherwise up to
    /// `max_retries + 1` attempts are made. A 403/429 serves a fresh cache
    /// entry if one exists. Once every attempt has failed, any cache entry,
    /// expired or not, is returned before an error is surfaced.
    #[instrument(skip(self, options), fields(max_retries = options.max_retries))]
    pub async fn fetch_with_retry_outcome<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Fetched<T>, ApiError> {
        let ttl = options.ttl_or(DEFAULT_CACHE_TTL);

        if !options.skip_cache
            && let Some(data) = self.fresh_cached::<T>(url)
        {
            debug!("Using cached data");
            return Ok(Fetched::new(data, FetchSource::Cache));
        }

        let mut last_error: Option<ClientError> = None;
        let mut retry_after = None;

        for attempt in 0..=options.max_retries {
            if attempt > 0 {
                let delay = retry_delay(attempt, retry_after.take(), options.max_retry_delay);
                info!(
                    attempt,
                    max_retries = options.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );

                if let (Some(observer), Some(err)) = (&options.on_retry, &last_error) {
                    observer(attempt, err);
                }

                sleep(delay).await;
            }

            match self.attempt::<T>(url, options).await {
                Ok((data, raw)) => {
                    if !options.skip_cache {
                        self.cache.set(url, &raw, ttl);
                    }
                    return Ok(Fetched::new(data, FetchSource::Network));
                },
                Err(err) => {
                    if let ClientError::RateLimit { retry_after: hint, .. } = &err {
                        retry_after = *hint;

                        if let Some(data) = self.fresh_cached::<T>(url) {
                            warn!("Rate limited, using cached data");
                            return Ok(Fetched::new(data, FetchSource::RateLimitedCache));
                        }
                    }

                    warn!(
                        attempt = attempt + 1,
                        attempts = options.max_retries + 1,
                        error = %err,
                        "Attempt failed"
                    );

                    let give_up = !options.retry_client_errors && err.kind() == ErrorKind::Client;
                    last_error = Some(err);
                    if give_up {
                        debug!("Client error is not retried");
                        break;
                    }
                },
            }
        }

        let error = match &last_error {
            Some(err) => ApiError::from(err),
            None => ApiError::new(ErrorKind::Other, "Request failed"),
        };

        if let Some(stale) = self.cache.lookup::<T>(url) {
            warn!(is_expired = stale.is_expired, "All retries failed, using cached data");
            return Ok(Fetched::new(stale.data, FetchSource::StaleCache(error.cached())));
        }

        Err(error)
    }

    /// Fetch a GitHub endpoint. Relative paths are resolved against the
    /// configured API base and the cache TTL defaults to ten minutes.
    pub async fn fetch_github<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &FetchOptions,
    ) -> Result<T, ApiError> {
        let url = self.github_url(endpoint);
        let options = FetchOptions {
            cache_ttl: Some(options.ttl_or(GITHUB_CACHE_TTL)),
            ..options.clone()
        };
        self.fetch_with_retry(&url, &options).await
    }

    pub fn github_url(&self, endpoint: &str) -> CompactString {
        if endpoint.starts_with("http") {
            return endpoint.into();
        }

        let base = self.config.github_base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format_compact!("{base}{endpoint}")
        } else {
            format_compact!("{base}/{endpoint}")
        }
    }

    /// Fetch every url concurrently. One result per url, in input order.
    pub async fn batch_fetch<T, U>(&self, urls: &[U], options: &FetchOptions) -> Vec<Settled<T>>
    where
        T: DeserializeOwned,
        U: AsRef<str>,
    {
        let fetches = urls
            .iter()
            .map(|url| async move { Settled::from(self.fetch_with_retry::<T>(url.as_ref(), options).await) });

        let results: Vec<Settled<T>> = join_all(fetches).await;
        debug!(
            total = results.len(),
            fulfilled = results.iter().filter(|r| r.is_fulfilled()).count(),
            "Batch fetch settled"
        );
        results
    }

    fn fresh_cached<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        self.cache
            .lookup::<T>(url)
            .filter(|cached| !cached.is_expired)
            .map(|cached| cached.data)
    }

    /// One request under the per-attempt deadline
    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<(T, Value), ClientError> {
        let response = timeout(options.timeout, self.transport.get(url))
            .await
            .map_err(|_| ClientError::timeout(options.timeout))??;

        match response.status {
            403 | 429 => {
                let hint = response
                    .retry_after
                    .as_deref()
                    .and_then(|value| parse_retry_after(value, Utc::now()));
                Err(ClientError::rate_limit(response.status, hint))
            },
            _ if !response.is_success() => {
                Err(ClientError::status(response.status, response.reason))
            },
            _ => {
                let raw: Value = serde_json::from_str(&response.body)
                    .map_err(|e| ClientError::json_parse(url, e))?;
                let data = T::deserialize(&raw).map_err(|e| ClientError::json_parse(url, e))?;
                Ok((data, raw))
            },
        }
    }
}
