//! duracache-storage: in-memory and SQLite-backed implementations of the
//! duracache blob-cache contract

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryCache;
pub use sqlite::{PersistentCache, Transform};
