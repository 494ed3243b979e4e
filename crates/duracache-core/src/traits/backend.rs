//! The blob-cache contract every backend must honour

use crate::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Core trait implemented by every cache backend (in-memory, persistent,
/// encrypted decorator).
///
/// All keys are case-sensitive, non-empty UTF-8 strings. An `Ok(())` return
/// from a write method means the write was accepted; it does not imply the
/// write has been flushed to stable storage (see `flush`).
///
/// `type_name` tags a row with the fully-qualified logical type name used by
/// [`crate::ObjectCache`]'s typed-object filtering operations; raw-byte
/// callers pass `None`.
#[async_trait]
pub trait BlobCache: Send + Sync + 'static {
    /// Insert or overwrite a single blob.
    ///
    /// `expiration` of `None` means the entry never expires (see
    /// [`crate::never_expires`]).
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError>;

    /// Insert or overwrite several blobs sharing one type tag and expiration.
    ///
    /// Atomic: either all entries are inserted or the batch fails. Default
    /// implementation calls [`BlobCache::insert`] once per pair; backends
    /// with a native batch path should override this.
    async fn insert_many(
        &self,
        entries: HashMap<String, Vec<u8>>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.insert(&key, value, type_name, expiration).await?;
        }
        Ok(())
    }

    /// Fetch a blob by key. Returns `Err(CacheError::KeyNotFound)` if absent
    /// or expired (an expired entry is evicted as a side effect).
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;

    /// Fetch several blobs by key.
    ///
    /// Returns only present, non-expired entries; missing or expired keys
    /// are simply absent from the result, never an error. Default
    /// implementation calls [`BlobCache::get`] per key; backends with a
    /// native batch path should override this.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Ok(value) = self.get(key).await {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Fetch the creation timestamp recorded for `key`. `None` if the entry
    /// does not exist; this does not error.
    async fn get_created_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError>;

    /// List all non-expired keys currently in the cache.
    async fn get_all_keys(&self) -> Result<Vec<String>, CacheError>;

    /// List all non-expired keys written through the typed-object API under
    /// the given logical type name.
    async fn get_all_keys_by_type(&self, type_name: &str) -> Result<Vec<String>, CacheError>;

    /// Remove a single key. Removing an absent key is not an error.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    /// Remove several keys.
    ///
    /// Default implementation calls [`BlobCache::invalidate`] per key;
    /// backends with a native batch path should override this.
    async fn invalidate_many(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.invalidate(key).await?;
        }
        Ok(())
    }

    /// Remove every entry.
    async fn invalidate_all(&self) -> Result<(), CacheError>;

    /// Remove every entry written under the given logical type name.
    async fn invalidate_all_by_type(&self, type_name: &str) -> Result<(), CacheError>;

    /// Force any buffered writes to become durable.
    async fn flush(&self) -> Result<(), CacheError>;

    /// Evict expired entries and reclaim space.
    async fn vacuum(&self) -> Result<(), CacheError>;

    /// Whether [`BlobCache::shutdown`] has already been called.
    fn is_disposed(&self) -> bool;

    /// Flush pending writes and release underlying resources. Idempotent;
    /// operations issued after shutdown return `Err(CacheError::Disposed)`.
    async fn shutdown(&self) -> Result<(), CacheError>;
}
