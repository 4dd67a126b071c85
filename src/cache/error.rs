use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Storage-level failures. The response cache logs and swallows these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry could not be encoded or decoded: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Cache store lock was poisoned")]
    Poisoned,
}
