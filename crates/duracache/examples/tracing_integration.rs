//! Shows the structured logs duracache emits through the `tracing` crate:
//! PRAGMA failures and legacy-payload fallbacks are logged, not printed.

use duracache::prelude::*;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    println!("initialized tracing, watch for duracache log lines below\n");

    let path = std::env::temp_dir().join("duracache-tracing-example.db");
    let cache = PersistentCache::open(path.clone())?;

    cache.insert("user:1", b"\"Alice\"".to_vec(), None, None).await?;
    println!("got: {:?}", cache.get("user:1").await?);

    println!("\nreading a legacy unwrapped payload through the JSON serializer...");
    let object_cache = ObjectCache::new(Arc::new(PersistentCache::open(
        std::env::temp_dir().join("duracache-tracing-legacy-example.db"),
    )?));
    object_cache.backend().insert("legacy", b"\"unwrapped\"".to_vec(), None, None).await?;
    let legacy: String = object_cache.get_object("legacy").await?;
    println!("got legacy value via fallback decode: {legacy:?}");

    cache.shutdown().await?;
    object_cache.backend().shutdown().await?;
    let _ = std::fs::remove_file(path);

    Ok(())
}
