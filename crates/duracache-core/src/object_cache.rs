//! Typed-object API layered on top of a [`BlobCache`]

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::{BlobCache, CacheError, JsonSerializer, Serializer};

/// Adapts any [`BlobCache`] into a typed-object store by layering a
/// [`Serializer`] over the raw blob API.
///
/// Generic over:
/// - `C`: the underlying blob backend (in-memory, persistent, encrypted)
/// - `S`: the serialization format (JSON by default)
pub struct ObjectCache<C, S = JsonSerializer>
where
    C: BlobCache,
    S: Serializer,
{
    backend: Arc<C>,
    serializer: S,
    _marker: PhantomData<S>,
}

impl<C: BlobCache> ObjectCache<C, JsonSerializer> {
    /// Wrap a backend with the default JSON serializer.
    pub fn new(backend: Arc<C>) -> Self {
        Self::with_serializer(backend, JsonSerializer)
    }
}

impl<C, S> ObjectCache<C, S>
where
    C: BlobCache,
    S: Serializer,
{
    /// Wrap a backend with a custom serializer.
    pub fn with_serializer(backend: Arc<C>, serializer: S) -> Self {
        Self {
            backend,
            serializer,
            _marker: PhantomData,
        }
    }

    /// Insert a typed object, tagging the entry with `T`'s type name so it
    /// can later be enumerated or bulk-invalidated by type.
    pub async fn insert_object<T>(
        &self,
        key: &str,
        value: &T,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError>
    where
        T: Serialize + Send + Sync,
    {
        let bytes = self.serializer.serialize(value)?;
        let type_name = std::any::type_name::<T>();
        self.backend
            .insert(key, bytes, Some(type_name), expiration)
            .await
    }

    /// Fetch and decode a typed object previously written with
    /// [`ObjectCache::insert_object`].
    pub async fn get_object<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned,
    {
        let bytes = self.backend.get(key).await?;
        self.serializer.deserialize(&bytes)
    }

    /// Decode every non-expired object stored under `T`'s logical type name.
    pub async fn get_all_objects<T>(&self) -> Result<Vec<(String, T)>, CacheError>
    where
        T: DeserializeOwned,
    {
        let type_name = std::any::type_name::<T>();
        let keys = self.backend.get_all_keys_by_type(type_name).await?;
        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            if let Ok(bytes) = self.backend.get(&key).await {
                if let Ok(value) = self.serializer.deserialize(&bytes) {
                    objects.push((key, value));
                }
            }
        }
        Ok(objects)
    }

    /// Remove every object stored under `T`'s logical type name.
    pub async fn invalidate_all_objects<T>(&self) -> Result<(), CacheError> {
        let type_name = std::any::type_name::<T>();
        self.backend.invalidate_all_by_type(type_name).await
    }

    /// Access the wrapped blob backend directly (for raw-byte operations).
    pub fn backend(&self) -> &Arc<C> {
        &self.backend
    }
}

impl<C, S> Clone for ObjectCache<C, S>
where
    C: BlobCache,
    S: Serializer,
{
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            serializer: self.serializer.clone(),
            _marker: PhantomData,
        }
    }
}
