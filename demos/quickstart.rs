//! # Quickstart
//!
//! Runs against an in-memory SQLite database with the in-process cache, so
//! it needs no server:
//! - Defining a model with `#[model]`
//! - Insert, cached reads, update, upsert and delete through chains
//! - A transaction whose cache effects land after commit
//!
//! ```sh
//! RUST_LOG=debug cargo run --example quickstart --features debug-logging
//! ```

use std::sync::Arc;

use sqlcache::prelude::*;
use tracing_subscriber::EnvFilter;

#[model]
#[table(name = "users")]
pub struct User {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub sex: i32,
}

const CREATE_USERS: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    sex INTEGER NOT NULL DEFAULT 0
)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("sqlcache quickstart");
    println!("===================");

    // one connection: each in-memory connection is a separate database
    let mut database = DatabaseConfig::from_url("sqlite::memory:");
    database.min_connections = 1;
    database.max_connections = 1;
    let store = SqlxStore::connect(&database).await?;

    let cache = Arc::new(MemoryCache::new());
    let engine = Engine::new(Arc::new(store), EngineConfig::default())
        .with_cache(CacheParams::new(cache.clone(), 300, "demo"));
    let db = SqlCache::from_engine(engine);
    db.health_check().await?;

    let engine = db.engine();
    engine.exec_raw(CREATE_USERS, &[]).await?;

    println!("\nInsert");
    let mut admin = User {
        name: "admin".to_string(),
        phone: "8613011112222".to_string(),
        sex: 1,
        ..Default::default()
    };
    let id = engine.model(&mut admin).use_cache().insert().await?;
    println!("  inserted id {} (record now carries id {})", id, admin.id);

    println!("\nCached read");
    let mut found = User::default();
    engine
        .model(&mut found)
        .index("phone", "8613011112222")
        .use_cache()
        .query()
        .await?;
    println!("  by phone: {:?}", found);
    println!("  cache keys: {:?}", cache.keys().await);

    println!("\nUpdate");
    found.name = "root".to_string();
    let affected = engine
        .model(&mut found)
        .select(["name"])
        .use_cache()
        .update()
        .await?;
    println!("  {} row(s) updated", affected);

    println!("\nCollection query");
    for (name, phone) in [("alice", "861"), ("bob", "862")] {
        let mut user = User {
            name: name.to_string(),
            phone: phone.to_string(),
            sex: 2,
            ..Default::default()
        };
        engine.model(&mut user).insert().await?;
    }
    let mut women: Vec<User> = Vec::new();
    engine
        .model(&mut women)
        .filter("sex = 2")
        .order_by(["name"])
        .desc()
        .limit(10)
        .query()
        .await?;
    for user in &women {
        println!("  {} {}", user.id, user.name);
    }

    println!("\nTransaction");
    let mut tx = engine.tx_begin().await?;
    let mut carol = User {
        name: "carol".to_string(),
        phone: "863".to_string(),
        sex: 2,
        ..Default::default()
    };
    tx.insert(engine.model(&mut carol).use_cache()).await?;
    tx.exec("UPDATE users SET sex = ? WHERE phone = ?", &[json!(1), json!("861")])
        .await?;
    println!("  {} cache effect(s) waiting for commit", tx.pending_effects().len());
    tx.commit().await?;
    println!("  committed, cache keys: {:?}", cache.keys().await);

    println!("\nRaw map query");
    let rows = engine
        .query_map("SELECT sex, count(*) AS total FROM users GROUP BY sex", &[])
        .await?;
    for row in rows {
        println!("  {:?}", row);
    }

    println!("\nDelete");
    match engine.table("users").delete().await {
        Err(err) => println!("  refused: {}", err),
        Ok(n) => println!("  deleted {} row(s)", n),
    }
    let deleted = engine.model(&mut admin).delete().await?;
    println!("  deleted {} row(s), cache keys: {:?}", deleted, cache.keys().await);

    Ok(())
}
