//! Decorator that protects payloads through a pluggable per-user provider

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duracache_core::{BlobCache, Result};

/// Protects (encrypts) and unprotects (decrypts) payloads for the current
/// user or machine principal.
///
/// Implementations typically wrap a platform credential/keychain API.
/// Protecting a zero-length buffer is undefined on some platforms, so
/// callers never invoke this on empty payloads (see [`EncryptedCache`]).
pub trait ProtectionProvider: Send + Sync + 'static {
    /// Encrypt `plaintext` for the current principal.
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` previously produced by [`ProtectionProvider::protect`].
    fn unprotect(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Identity provider: used on platforms with no user-scoped protection API,
/// and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProtection;

impl ProtectionProvider for NoopProtection {
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn unprotect(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

/// Decorates any [`BlobCache`] (normally a `PersistentCache`) with
/// transparent payload protection: every write is protected before being
/// handed to the inner cache, every read is unprotected after.
pub struct EncryptedCache<C: BlobCache> {
    inner: C,
    provider: Arc<dyn ProtectionProvider>,
}

impl<C: BlobCache> EncryptedCache<C> {
    /// Wrap `inner` with a custom protection provider.
    pub fn new(inner: C, provider: Arc<dyn ProtectionProvider>) -> Self {
        Self { inner, provider }
    }

    /// Wrap `inner` with the identity (no-op) provider.
    pub fn noop(inner: C) -> Self {
        Self::new(inner, Arc::new(NoopProtection))
    }

    fn protect(&self, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(plaintext);
        }
        self.provider.protect(&plaintext)
    }

    fn unprotect(&self, ciphertext: Vec<u8>) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(ciphertext);
        }
        self.provider.unprotect(&ciphertext)
    }
}

#[async_trait]
impl<C: BlobCache> BlobCache for EncryptedCache<C> {
    async fn insert(
        &self,
        key: &str,
        value: Vec<u8>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let protected = self.protect(value)?;
        self.inner.insert(key, protected, type_name, expiration).await
    }

    async fn insert_many(
        &self,
        entries: HashMap<String, Vec<u8>>,
        type_name: Option<&str>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut protected = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            protected.insert(key, self.protect(value)?);
        }
        self.inner.insert_many(protected, type_name, expiration).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let value = self.inner.get(key).await?;
        self.unprotect(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let found = self.inner.get_many(keys).await?;
        let mut unprotected = HashMap::with_capacity(found.len());
        for (key, value) in found {
            unprotected.insert(key, self.unprotect(value)?);
        }
        Ok(unprotected)
    }

    async fn get_created_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.inner.get_created_at(key).await
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        self.inner.get_all_keys().await
    }

    async fn get_all_keys_by_type(&self, type_name: &str) -> Result<Vec<String>> {
        self.inner.get_all_keys_by_type(type_name).await
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await
    }

    async fn invalidate_many(&self, keys: &[String]) -> Result<()> {
        self.inner.invalidate_many(keys).await
    }

    async fn invalidate_all(&self) -> Result<()> {
        self.inner.invalidate_all().await
    }

    async fn invalidate_all_by_type(&self, type_name: &str) -> Result<()> {
        self.inner.invalidate_all_by_type(type_name).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn vacuum(&self) -> Result<()> {
        self.inner.vacuum().await
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown().await
    }
}
