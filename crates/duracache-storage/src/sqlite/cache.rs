//! SQLite-backed [`BlobCache`] fronted by the single-writer operation queue

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use duracache_core::{never_expires, BlobCache, CacheElement, CacheError, Result};
use tokio::sync::broadcast;

use super::queue::OperationQueue;

/// Hooks applied to payloads before they are written and after they are
/// read, so [`crate::EncryptedCache`]-equivalent decorators can transform
/// bytes without duplicating the SQLite plumbing. Identity by default.
pub type Transform = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

fn identity_transform() -> Transform {
    Arc::new(|bytes: &[u8]| Ok(bytes.to_vec()))
}

/// Persistent, SQLite-backed implementation of [`BlobCache`].
///
/// Every public method checks disposal, then routes through the
/// [`OperationQueue`]. `get` additionally coalesces concurrent requests for
/// the same key across batch passes: the first caller to ask for `k`
/// becomes the leader and broadcasts its result to any follower that asked
/// before the leader's batch completed.
pub struct PersistentCache {
    queue: OperationQueue,
    inflight: DashMap<String, broadcast::Sender<Result<Vec<u8>>>>,
    disposed: AtomicBool,
    pre_write: Transform,
    post_read: Transform,
}

impl PersistentCache {
    /// Open (or create) a persistent cache at `path` with identity
    /// pre-write/post-read transforms.
    pub fn open(path: PathBuf) -> Result<Self> {
        Ok(Self {
            queue: OperationQueue::open(path)?,
            inflight: DashMap::new(),
            disposed: AtomicBool::new(false),
            pre_write: identity_transform(),
            post_read: identity_transform(),
        })
    }

    /// Open with custom pre-write/post-read transforms (used by the
    /// encrypted decorator to protect payloads in place rather than wrap
    /// another `BlobCache`).
    pub fn open_with_transforms(path: PathBuf, pre_write: Transform, post_read: Transform) -> Result<Self> {
        Ok(Self {
            queue: OperationQueue::open(path)?,
            inflight: DashMap::new(),
            disposed: AtomicBool::new(false),
            pre_write,
            post_read,
        })
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }

    async fn get_coalesced(&self, key: &str) -> Result<Vec<u8>> {
        let action = {
            match self.inflight.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(o) => Ok(o.get().subscribe()),
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    let (tx, _rx) = broadcast::channel(1);
                    v.insert(tx.clone());
                    Err(tx)
                }
            }
        };

        match action {
            Ok(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(CacheError::BackendFailure(
                    "in-flight leader request vanished without a result".into(),
                )),
            },
            Err(tx) => {
                let result = self.fetch_one(key).await;
                self.inflight.remove(key);
                if tx.receiver_count() > 0 {
                    let _ = tx.send(result.clone());
                }
                result
            }
        }
    }

    async fn fetch_one(&self, key: &str) -> Result<Vec<u8>> {
        let elements = self.queue.bulk_select(vec![key.to_string()]).await?;
        match elements.into_iter().next() {
            Some(element) => (self.post_read)(&element.value),
            None => Err(CacheError::KeyNotFound(key.to_string())),
        }
    }
}

#[async_trait]
impl BlobCache for PersistentCache {
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
        let value = (self.pre_write)(&value)?;
        let element = CacheElement {
            key: key.to_string(),
            type_name: type_name.map(str::to_string),
            value,
            created_at: Utc::now(),
            expiration: expiration.unwrap_or_else(never_expires),
        };
        self.queue.bulk_insert(vec![element]).await
    }

    async fn insert_many(
        &self,
        entries: std::collections::HashMap<String, Vec<u8>>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_live()?;
        let now = Utc::now();
        let expiration = expiration.unwrap_or_else(never_expires);
        let mut elements = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if key.is_empty() {
                return Err(CacheError::ArgumentInvalid("key must not be empty".into()));
            }
            elements.push(CacheElement {
                key,
                type_name: type_name.map(str::to_string),
                value: (self.pre_write)(&value)?,
                created_at: now,
                expiration,
            });
        }
        self.queue.bulk_insert(elements).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_live()?;
        self.get_coalesced(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<std::collections::HashMap<String, Vec<u8>>> {
        self.ensure_live()?;
        let elements = self.queue.bulk_select(keys.to_vec()).await?;
        let mut found = std::collections::HashMap::with_capacity(elements.len());
        for element in elements {
            found.insert(element.key, (self.post_read)(&element.value)?);
        }
        Ok(found)
    }

    async fn get_created_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.ensure_live()?;
        self.queue.get_created_at(key.to_string()).await
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        self.ensure_live()?;
        self.queue.get_all_keys().await
    }

    async fn get_all_keys_by_type(&self, type_name: &str) -> Result<Vec<String>> {
        self.ensure_live()?;
        let elements = self.queue.bulk_select_by_type(type_name.to_string()).await?;
        Ok(elements.into_iter().map(|e| e.key).collect())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.ensure_live()?;
        self.queue.bulk_invalidate(vec![key.to_string()]).await
    }

    async fn invalidate_many(&self, keys: &[String]) -> Result<()> {
        self.ensure_live()?;
        self.queue.bulk_invalidate(keys.to_vec()).await
    }

    async fn invalidate_all(&self) -> Result<()> {
        self.ensure_live()?;
        self.queue.invalidate_all().await
    }

    async fn invalidate_all_by_type(&self, type_name: &str) -> Result<()> {
        self.ensure_live()?;
        self.queue.bulk_invalidate_by_type(type_name.to_string()).await
    }

    async fn flush(&self) -> Result<()> {
        self.ensure_live()?;
        self.queue.flush().await
    }

    async fn vacuum(&self) -> Result<()> {
        self.ensure_live()?;
        self.queue.vacuum().await
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn shutdown(&self) -> Result<()> {
        self.disposed.store(true, Ordering::Release);
        self.queue.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path(label: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "duracache-persistent-test-{label}-{}-{n}.db",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let path = temp_db_path("roundtrip");
        let cache = PersistentCache::open(path.clone()).unwrap();
        cache.insert("k1", b"hello".to_vec(), None, None).await.unwrap();
        let value = cache.get("k1").await.unwrap();
        assert_eq!(value, b"hello");
        cache.shutdown().await.unwrap();
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn invalidate_then_get_fails() {
        let path = temp_db_path("invalidate");
        let cache = PersistentCache::open(path.clone()).unwrap();
        cache.insert("k1", b"v".to_vec(), None, None).await.unwrap();
        cache.invalidate("k1").await.unwrap();
        assert!(matches!(cache.get("k1").await, Err(CacheError::KeyNotFound(_))));
        cache.shutdown().await.unwrap();
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn shutdown_then_insert_is_disposed() {
        let path = temp_db_path("disposed");
        let cache = PersistentCache::open(path.clone()).unwrap();
        cache.shutdown().await.unwrap();
        assert!(cache.is_disposed());
        assert!(matches!(
            cache.insert("k1", b"v".to_vec(), None, None).await,
            Err(CacheError::Disposed)
        ));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn concurrent_get_coalesces_to_one_leader() {
        let path = temp_db_path("coalesce");
        let cache = Arc::new(PersistentCache::open(path.clone()).unwrap());
        cache.insert("k1", b"value".to_vec(), None, None).await.unwrap();

        let a = cache.clone();
        let b = cache.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.get("k1").await }),
            tokio::spawn(async move { b.get("k1").await })
        );
        assert_eq!(ra.unwrap().unwrap(), b"value");
        assert_eq!(rb.unwrap().unwrap(), b"value");

        cache.shutdown().await.unwrap();
        let _ = std::fs::remove_file(path);
    }
}
