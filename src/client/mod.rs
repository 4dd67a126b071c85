//! Fetch client modules
//!
//! A read-only JSON client with a read-through cache, bounded retries with
//! exponential backoff, rate-limit handling and per-attempt timeouts, plus the
//! GitHub activity service built on top of it.

pub mod api;
pub mod config;
pub mod error;
pub mod retry;
pub mod service;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use api::{FetchSource, Fetched, PulseClient, Settled};
pub use config::{ClientConfig, FetchOptions, RetryObserver};
pub use error::{ApiError, ClientError, ErrorKind};
pub use service::{ActivityService, ActivitySnapshot};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};

pub type Result<T> = std::result::Result<T, ClientError>;
