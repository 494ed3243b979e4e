//! Read Coalescing Example
//!
//! `PersistentCache::get` coalesces concurrent lookups for the same key: the
//! first caller becomes the leader and performs the SQLite read, every other
//! caller that asks for the same key before the leader's batch completes
//! rides along on the same result instead of issuing its own read.

use duracache::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Read Coalescing Demo ===\n");

    let path = std::env::temp_dir().join("duracache-coalescing-example.db");
    let cache = Arc::new(PersistentCache::open(path.clone())?);
    cache.insert("expensive:report", b"report data".to_vec(), None, None).await?;

    let mut handles = Vec::new();
    for i in 0..10 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let value = cache.get("expensive:report").await;
            println!("  request {i} completed: {}", value.is_ok());
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    cache.shutdown().await?;
    let _ = std::fs::remove_file(path);

    println!("\nAll ten readers observed the same coalesced result.");
    Ok(())
}
