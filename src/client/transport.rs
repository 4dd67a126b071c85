//! HTTP transport used by the fetch client

use std::fmt::Debug;

use async_trait::async_trait;
use compact_str::CompactString;
use reqwest::{Client, header};
use tracing::{debug, instrument};

use super::{
    config::ClientConfig,
    error::{ClientError, Result},
};

/// What the retry loop needs to know about a response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: CompactString,
    /// Raw `Retry-After` header value
    pub retry_after: Option<CompactString>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single GET. Timeouts and retries are applied by the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get(&self, url: &str) -> Result<RawResponse>;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let parsed = url::Url::parse(url).map_err(|_| ClientError::invalid_url(url))?;

        let response = self.client.get(parsed).send().await.map_err(ClientError::network)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(CompactString::from);
        let body = response.text().await.map_err(ClientError::network)?;

        debug!(status = status.as_u16(), bytes = body.len(), "Received response");

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().into(),
            retry_after,
            body,
        })
    }
}
