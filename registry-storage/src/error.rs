//! Error types for the persistence engine.
//!
//! One flat error enum crosses the crate boundary. Callers branch on
//! the variants that matter to them (`NotFound`, `UnreadableRegistry`)
//! and bubble the rest; nothing in this crate panics across the public
//! boundary.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures surfaced by the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Required settings were missing or inconsistent when a backend
    /// was constructed. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested object does not exist in the backing store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Local filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error outside the registry
    /// decode path.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to the remote store.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered an operation with a non-success
    /// status.
    #[error("store rejected {key}: HTTP {status}")]
    Backend { key: String, status: u16 },

    /// The stored registry document could not be decoded. The
    /// in-memory catalog is left untouched when this is returned.
    #[error("unreadable registry document")]
    UnreadableRegistry(#[source] RegistryDecodeError),

    /// Package name or version unsuitable for key derivation.
    #[error("invalid package: {0}")]
    InvalidPackage(String),
}

/// Why a registry document failed to decode.
#[derive(Debug, Error)]
pub enum RegistryDecodeError {
    #[error("corrupt compressed stream: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("malformed registry JSON: {0}")]
    Parse(#[source] serde_json::Error),
}
