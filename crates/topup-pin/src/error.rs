//! Error types

/// Transaction PIN errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// PIN does not have the required shape
    #[error("PIN rejected: {0}")]
    FormatRejected(String),

    /// Secret or flag store failed
    #[error("Storage error: {0}")]
    Storage(#[from] topup_storage::Error),

    /// Hashing or hash parsing failed
    #[error("Hash error: {0}")]
    Hash(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
