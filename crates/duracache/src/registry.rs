//! Process-wide named cache slots with lazy initialization and a shutdown barrier

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duracache_core::{BlobCache, CacheError, Result};
use duracache_storage::{InMemoryCache, PersistentCache};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// On-disk paths for the three persistent named slots. Resolving these from
/// OS-specific data directories is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct RegistryPaths {
    /// Machine-wide cache, survives user account changes.
    pub local_machine: PathBuf,
    /// Per-user-account cache.
    pub user_account: PathBuf,
    /// Cache intended to sit behind an `EncryptedCache` decorator by the caller.
    pub secure: PathBuf,
}

/// Sink `BlobCache` returned once the registry has been shut down: rejects
/// every operation with [`CacheError::Disposed`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisposedSink;

#[async_trait]
impl BlobCache for DisposedSink {
    async fn insert(&self, _: &str, _: Vec<u8>, _: Option<&str>, _: Option<DateTime<Utc>>) -> Result<()> {
        Err(CacheError::Disposed)
    }

    async fn get(&self, _: &str) -> Result<Vec<u8>> {
        Err(CacheError::Disposed)
    }

    async fn get_created_at(&self, _: &str) -> Result<Option<DateTime<Utc>>> {
        Err(CacheError::Disposed)
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Err(CacheError::Disposed)
    }

    async fn get_all_keys_by_type(&self, _: &str) -> Result<Vec<String>> {
        Err(CacheError::Disposed)
    }

    async fn invalidate(&self, _: &str) -> Result<()> {
        Err(CacheError::Disposed)
    }

    async fn invalidate_all(&self) -> Result<()> {
        Err(CacheError::Disposed)
    }

    async fn invalidate_all_by_type(&self, _: &str) -> Result<()> {
        Err(CacheError::Disposed)
    }

    async fn flush(&self) -> Result<()> {
        Err(CacheError::Disposed)
    }

    async fn vacuum(&self) -> Result<()> {
        Err(CacheError::Disposed)
    }

    fn is_disposed(&self) -> bool {
        true
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-wide registry of named cache slots: `local_machine`,
/// `user_account`, `secure`, `in_memory`. Each slot resolves lazily on first
/// use and is torn down together by [`Registry::shutdown`].
pub struct Registry {
    local_machine: OnceCell<Arc<PersistentCache>>,
    local_machine_path: PathBuf,
    user_account: OnceCell<Arc<PersistentCache>>,
    user_account_path: PathBuf,
    secure: OnceCell<Arc<PersistentCache>>,
    secure_path: PathBuf,
    in_memory: OnceCell<Arc<InMemoryCache>>,
    shutdown_requested: AtomicBool,
}

static REGISTRY: Mutex<Option<Arc<Registry>>> = Mutex::new(None);

impl Registry {
    /// Initialize the process-wide registry with explicit on-disk paths.
    /// Calling this more than once has no effect after the first call wins,
    /// unless the previous registry was torn down with `reset_for_test`.
    pub fn init(paths: RegistryPaths) -> Arc<Registry> {
        let mut slot = REGISTRY.lock();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let registry = Arc::new(Registry {
            local_machine: OnceCell::new(),
            local_machine_path: paths.local_machine,
            user_account: OnceCell::new(),
            user_account_path: paths.user_account,
            secure: OnceCell::new(),
            secure_path: paths.secure,
            in_memory: OnceCell::new(),
            shutdown_requested: AtomicBool::new(false),
        });
        *slot = Some(registry.clone());
        registry
    }

    /// Access the already-initialized registry.
    pub fn get() -> Option<Arc<Registry>> {
        REGISTRY.lock().clone()
    }

    /// Test-only: forget the process-wide registry so the next `init` call
    /// starts a fresh one. Does not affect any `Arc<Registry>` a test still
    /// holds — it keeps working against its own slots.
    #[cfg(test)]
    pub fn reset_for_test() {
        *REGISTRY.lock() = None;
    }

    fn shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    async fn resolve_persistent(
        &self,
        cell: &OnceCell<Arc<PersistentCache>>,
        path: &PathBuf,
    ) -> Result<Arc<dyn BlobCache>> {
        if self.shutting_down() {
            return Ok(Arc::new(DisposedSink));
        }
        let handle = cell
            .get_or_try_init(|| async { PersistentCache::open(path.clone()).map(Arc::new) })
            .await?;
        Ok(handle.clone() as Arc<dyn BlobCache>)
    }

    /// Machine-wide persistent cache.
    pub async fn local_machine(&self) -> Result<Arc<dyn BlobCache>> {
        self.resolve_persistent(&self.local_machine, &self.local_machine_path).await
    }

    /// Per-user-account persistent cache.
    pub async fn user_account(&self) -> Result<Arc<dyn BlobCache>> {
        self.resolve_persistent(&self.user_account, &self.user_account_path).await
    }

    /// Persistent cache intended to be wrapped in an `EncryptedCache` by the caller.
    pub async fn secure(&self) -> Result<Arc<dyn BlobCache>> {
        self.resolve_persistent(&self.secure, &self.secure_path).await
    }

    /// Process-lifetime in-memory cache, not backed by disk.
    pub async fn in_memory(&self) -> Result<Arc<dyn BlobCache>> {
        if self.shutting_down() {
            return Ok(Arc::new(DisposedSink));
        }
        let handle = self
            .in_memory
            .get_or_init(|| async { Arc::new(InMemoryCache::new()) })
            .await;
        Ok(handle.clone() as Arc<dyn BlobCache>)
    }

    /// Flip the shutdown flag, dispose every slot that was ever initialized,
    /// and wait for all of them to finish shutting down.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_requested.store(true, Ordering::Release);

        if let Some(c) = self.local_machine.get() {
            c.shutdown().await?;
        }
        if let Some(c) = self.user_account.get() {
            c.shutdown().await?;
        }
        if let Some(c) = self.secure.get() {
            c.shutdown().await?;
        }
        if let Some(c) = self.in_memory.get() {
            c.shutdown().await?;
        }
        Ok(())
    }

}
