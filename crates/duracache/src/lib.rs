//! duracache: asynchronous, persistent key/value blob cache for client
//! applications
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use duracache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let cache = InMemoryCache::new();
//!     cache.insert("key", b"value".to_vec(), None, None).await?;
//!
//!     match cache.get("key").await {
//!         Ok(value) => println!("got {} bytes", value.len()),
//!         Err(CacheError::KeyNotFound(_)) => println!("cache miss"),
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     Ok(())
//! }
//! ```

mod encrypted;
mod registry;

// Re-export core contract and types
pub use duracache_core::{
    never_expires, ticks_from_datetime, ticks_to_datetime, BlobCache, CacheConfig, CacheElement,
    CacheError, Clock, DateTimeKind, JsonSerializer, ObjectCache, Result, Serializer, SystemClock,
};

// Re-export storage backends
pub use duracache_storage::{InMemoryCache, PersistentCache, Transform};

// Decorator and lifecycle registry
pub use encrypted::{EncryptedCache, NoopProtection, ProtectionProvider};
pub use registry::{DisposedSink, Registry, RegistryPaths};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        never_expires, BlobCache, CacheConfig, CacheElement, CacheError, Clock, DateTimeKind,
        DisposedSink, EncryptedCache, InMemoryCache, JsonSerializer, NoopProtection, ObjectCache,
        PersistentCache, ProtectionProvider, Registry, RegistryPaths, Result, Serializer,
        SystemClock,
    };
}

#[cfg(test)]
mod tests;
