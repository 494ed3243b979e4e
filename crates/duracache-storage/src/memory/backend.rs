//! In-memory cache backend guarded by a single mutex

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use duracache_core::{never_expires, BlobCache, CacheError, Clock, Result, SystemClock};

/// A [`duracache_core::CacheElement`] minus its key, since the key is the
/// map entry itself.
#[derive(Debug, Clone)]
struct StoredElement {
    type_name: Option<String>,
    value: Vec<u8>,
    created_at: DateTime<Utc>,
    expiration: DateTime<Utc>,
}

impl StoredElement {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }
}

/// Reference implementation of [`BlobCache`] backed by an in-process map.
///
/// Intended for tests and the registry's `in_memory` slot. Must match
/// `PersistentCache`'s observable semantics: lazy expiration, typed
/// filtering, and error kinds.
pub struct InMemoryCache {
    data: Mutex<HashMap<String, StoredElement>>,
    clock: Arc<dyn Clock>,
    disposed: AtomicBool,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Create an empty cache using the real wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty cache using a caller-supplied clock (tests inject a
    /// fixed or stepped clock here).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            clock,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }
}

#[async_trait]
impl BlobCache for InMemoryCache {
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_live()?;
        if key.is_empty() {
            return Err(CacheError::ArgumentInvalid("key must not be empty".into()));
        }
        let element = StoredElement {
            type_name: type_name.map(str::to_string),
            value,
            created_at: self.clock.now(),
            expiration: expiration.unwrap_or_else(never_expires),
        };
        self.data.lock().insert(key.to_string(), element);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_live()?;
        let now = self.clock.now();
        let mut data = self.data.lock();
        match data.get(key) {
            Some(element) if element.is_expired_at(now) => {
                data.remove(key);
                Err(CacheError::KeyNotFound(key.to_string()))
            }
            Some(element) => Ok(element.value.clone()),
            None => Err(CacheError::KeyNotFound(key.to_string())),
        }
    }

    async fn get_created_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.ensure_live()?;
        let now = self.clock.now();
        let mut data = self.data.lock();
        match data.get(key) {
            Some(element) if element.is_expired_at(now) => {
                data.remove(key);
                Ok(None)
            }
            Some(element) => Ok(Some(element.created_at)),
            None => Ok(None),
        }
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        self.ensure_live()?;
        let now = self.clock.now();
        let data = self.data.lock();
        Ok(data
            .iter()
            .filter(|(_, el)| !el.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn get_all_keys_by_type(&self, type_name: &str) -> Result<Vec<String>> {
        self.ensure_live()?;
        let now = self.clock.now();
        let data = self.data.lock();
        Ok(data
            .iter()
            .filter(|(_, el)| !el.is_expired_at(now) && el.type_name.as_deref() == Some(type_name))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.ensure_live()?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        self.ensure_live()?;
        self.data.lock().clear();
        Ok(())
    }

    async fn invalidate_all_by_type(&self, type_name: &str) -> Result<()> {
        self.ensure_live()?;
        self.data
            .lock()
            .retain(|_, el| el.type_name.as_deref() != Some(type_name));
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.ensure_live()?;
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        self.ensure_live()?;
        let now = self.clock.now();
        self.data.lock().retain(|_, el| !el.is_expired_at(now));
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn shutdown(&self) -> Result<()> {
        self.disposed.store(true, Ordering::Release);
        self.data.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex as StdMutex;

    struct FixedClock(StdMutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let cache = InMemoryCache::new();
        cache
            .insert("k1", b"hello".to_vec(), None, None)
            .await
            .unwrap();
        let value = cache.get("k1").await.unwrap();
        assert_eq!(value, b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_errors() {
        let cache = InMemoryCache::new();
        let result = cache.get("missing").await;
        assert!(matches!(result, Err(CacheError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = InMemoryCache::new();
        cache.insert("k1", b"v".to_vec(), None, None).await.unwrap();
        cache.invalidate("k1").await.unwrap();
        assert!(matches!(
            cache.get("k1").await,
            Err(CacheError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_lazily() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let cache = InMemoryCache::with_clock(clock.clone());
        let expiry = clock.now() + Duration::milliseconds(10);
        cache
            .insert("k1", b"v".to_vec(), None, Some(expiry))
            .await
            .unwrap();

        *clock.0.lock().unwrap() = expiry + Duration::milliseconds(1);
        let result = cache.get("k1").await;
        assert!(matches!(result, Err(CacheError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn vacuum_removes_only_expired_entries() {
        let clock = Arc::new(FixedClock(StdMutex::new(Utc::now())));
        let cache = InMemoryCache::with_clock(clock.clone());
        let now = clock.now();
        cache
            .insert("expired", b"v".to_vec(), None, Some(now - Duration::seconds(1)))
            .await
            .unwrap();
        cache
            .insert("live", b"v".to_vec(), None, Some(now + Duration::hours(1)))
            .await
            .unwrap();

        cache.vacuum().await.unwrap();

        assert!(matches!(
            cache.get("expired").await,
            Err(CacheError::KeyNotFound(_))
        ));
        assert!(cache.get("live").await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_disposes_and_rejects_further_operations() {
        let cache = InMemoryCache::new();
        cache.insert("k1", b"v".to_vec(), None, None).await.unwrap();
        cache.shutdown().await.unwrap();
        assert!(cache.is_disposed());
        assert!(matches!(
            cache.insert("k2", b"v".to_vec(), None, None).await,
            Err(CacheError::Disposed)
        ));
    }

    #[tokio::test]
    async fn get_all_keys_by_type_filters_untagged_entries() {
        let cache = InMemoryCache::new();
        cache.insert("k1", b"v".to_vec(), None, None).await.unwrap();
        let keys = cache.get_all_keys_by_type("widget").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn get_all_keys_by_type_matches_tagged_entries() {
        let cache = InMemoryCache::new();
        cache
            .insert("k1", b"v".to_vec(), Some("widget"), None)
            .await
            .unwrap();
        cache.insert("k2", b"v".to_vec(), None, None).await.unwrap();
        let keys = cache.get_all_keys_by_type("widget").await.unwrap();
        assert_eq!(keys, vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn get_created_at_returns_none_for_missing_key() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get_created_at("missing").await.unwrap(), None);
    }
}
