//! Integration tests for the `ObjectCache` facade over both backends

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct TestData {
        id: u64,
        name: String,
        value: i32,
    }

    #[tokio::test]
    async fn object_cache_roundtrips_typed_value_over_memory() {
        let cache = ObjectCache::new(Arc::new(InMemoryCache::new()));
        let data = TestData { id: 1, name: "test".into(), value: 42 };

        cache.insert_object("k1", &data, None).await.unwrap();
        let fetched: TestData = cache.get_object("k1").await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn object_cache_miss_returns_key_not_found() {
        let cache = ObjectCache::new(Arc::new(InMemoryCache::new()));
        let err = cache.get_object::<TestData>("missing").await.unwrap_err();
        assert!(matches!(err, CacheError::KeyNotFound(_)));
    }

    #[tokio::test]
    async fn object_cache_invalidate_all_objects_clears_only_matching_type() {
        let cache = ObjectCache::new(Arc::new(InMemoryCache::new()));
        let data = TestData { id: 1, name: "a".into(), value: 1 };

        cache.insert_object("typed", &data, None).await.unwrap();
        cache.backend().insert("untyped", b"raw".to_vec(), None, None).await.unwrap();

        cache.invalidate_all_objects::<TestData>().await.unwrap();

        assert!(cache.get_object::<TestData>("typed").await.is_err());
        assert_eq!(cache.backend().get("untyped").await.unwrap(), b"raw");
    }

    #[tokio::test]
    async fn encrypted_cache_over_memory_roundtrips() {
        let cache = EncryptedCache::noop(InMemoryCache::new());
        cache.insert("k1", b"secret".to_vec(), None, None).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), b"secret");
    }

    #[tokio::test]
    async fn registry_in_memory_slot_is_usable_end_to_end() {
        Registry::reset_for_test();
        let registry = Registry::init(RegistryPaths {
            local_machine: std::env::temp_dir().join("duracache-lib-test-local.db"),
            user_account: std::env::temp_dir().join("duracache-lib-test-user.db"),
            secure: std::env::temp_dir().join("duracache-lib-test-secure.db"),
        });

        let cache = registry.in_memory().await.unwrap();
        cache.insert("k1", b"v".to_vec(), None, None).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), b"v");

        registry.shutdown().await.unwrap();
        let sink = registry.in_memory().await.unwrap();
        assert!(sink.is_disposed());
        assert!(matches!(sink.get("k1").await, Err(CacheError::Disposed)));
        Registry::reset_for_test();
    }
}
