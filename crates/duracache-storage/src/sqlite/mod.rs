//! SQLite-backed persistent cache: schema management, the single-writer
//! operation queue, and the `BlobCache` implementation built on top of them

mod cache;
mod queue;
mod schema;

pub use cache::{PersistentCache, Transform};
pub use queue::OperationQueue;
pub use schema::SCHEMA_VERSION;
