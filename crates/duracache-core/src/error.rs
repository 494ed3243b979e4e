//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key not found, or present but expired and evicted on lookup
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Operation attempted after `dispose()`/`shutdown()`
    #[error("cache has been disposed")]
    Disposed,

    /// A caller-supplied argument failed validation (e.g. an empty key)
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// Serialization or deserialization of a typed value failed
    #[error("serialization error: {0}")]
    SerializationFailed(String),

    /// The underlying storage engine reported a failure
    #[error("backend error: {0}")]
    BackendFailure(String),

    /// The per-user protection provider failed to encrypt or decrypt a payload
    #[error("protection error: {0}")]
    ProtectionFailed(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
