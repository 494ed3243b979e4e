//! Basic example demonstrating duracache with the in-memory backend

use duracache::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== duracache Basic Example ===\n");

    let backend = Arc::new(InMemoryCache::new());
    let cache = ObjectCache::new(backend);

    let user = User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
    };

    println!("Storing user in cache...");
    cache.insert_object("user:123", &user, None).await?;

    println!("Retrieving user from cache...");
    match cache.get_object::<User>("user:123").await {
        Ok(found) => {
            println!("cache HIT: {} <{}>", found.name, found.email);
        }
        Err(CacheError::KeyNotFound(_)) => {
            println!("cache MISS");
        }
        Err(e) => return Err(e.into()),
    }

    println!("\nUsing raw byte keys...");
    cache
        .backend()
        .insert("session:abc123", b"user_data".to_vec(), None, None)
        .await?;
    println!(
        "session key present: {}",
        cache.backend().get("session:abc123").await.is_ok()
    );

    println!("\nEnumerating every stored User...");
    for (key, found) in cache.get_all_objects::<User>().await? {
        println!("  {key} -> {} <{}>", found.name, found.email);
    }

    println!("\nDeleting user from cache...");
    cache.backend().invalidate("user:123").await?;
    println!(
        "exists after delete: {}",
        cache.backend().get("user:123").await.is_ok()
    );

    println!("\n--- Expiring entry example ---");
    let soon = chrono::Utc::now() + chrono::Duration::milliseconds(1);
    cache
        .backend()
        .insert("temp_data", b"expires soon".to_vec(), None, Some(soon))
        .await?;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    match cache.backend().get("temp_data").await {
        Err(CacheError::KeyNotFound(_)) => println!("temp_data lazily evicted on read"),
        other => println!("unexpected result: {other:?}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
