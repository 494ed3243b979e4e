//! duracache-core: core traits and types for the duracache blob-cache engine.
//!
//! This crate defines the contract every backend (in-memory, persistent,
//! encrypted) must honour, independent of storage medium.

mod config;
mod error;
mod object_cache;
mod traits;
mod types;

pub use config::{CacheConfig, DateTimeKind};
pub use error::{CacheError, Result};
pub use object_cache::ObjectCache;
pub use traits::*;
pub use types::*;
