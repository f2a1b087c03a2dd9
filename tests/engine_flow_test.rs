//! Engine flow tests over a scripted store
//!
//! Checks the statements each dialect receives, the select-then-write upsert
//! used where no conflict clause exists, cache-aside reads and the cache
//! effects of writes and transactions.

use std::sync::Arc;

use sqlcache::prelude::*;

#[model]
#[table(name = "users")]
pub struct User {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub sex: i32,
}

fn admin() -> User {
    User {
        id: 0,
        name: "admin".to_string(),
        phone: "8613011112222".to_string(),
        sex: 1,
    }
}

fn user_row(id: i64, name: &str, phone: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(id));
    row.insert("name".to_string(), json!(name));
    row.insert("phone".to_string(), json!(phone));
    row.insert("sex".to_string(), json!(1));
    row
}

fn engine_for(dialect: Dialect) -> (Engine, RecordingStore) {
    let store = RecordingStore::new(dialect);
    let engine = Engine::new(Arc::new(store.clone()), EngineConfig::default());
    (engine, store)
}

fn cached_engine(dialect: Dialect) -> (Engine, RecordingStore, Arc<MemoryCache>) {
    let (engine, store) = engine_for(dialect);
    let cache = Arc::new(MemoryCache::new());
    let engine = engine.with_cache(CacheParams::new(cache.clone(), 60, "test"));
    (engine, store, cache)
}

// ========================================
// Statement text per dialect
// ========================================

#[tokio::test]
async fn test_where_and_select_across_dialects() {
    for (dialect, expected) in [
        (Dialect::MySql, "SELECT `id`,`phone` FROM users WHERE id <= 100"),
        (Dialect::Postgres, "SELECT \"id\",\"phone\" FROM users WHERE id <= 100"),
    ] {
        let (engine, store) = engine_for(dialect);
        let mut users: Vec<User> = Vec::new();
        engine
            .model(&mut users)
            .filter("id <= 100")
            .select(["id", "phone"])
            .query()
            .await
            .unwrap();
        assert_eq!(store.last_statement().unwrap(), expected);
    }
}

#[tokio::test]
async fn test_primary_key_wins_over_custom_where() {
    let (engine, store) = engine_for(Dialect::MySql);
    let mut found = User::default();
    engine
        .model(&mut found)
        .id(7)
        .filter("name = 'x'")
        .query()
        .await
        .unwrap();
    assert_eq!(
        store.last_statement().unwrap(),
        "SELECT `id`,`name`,`phone`,`sex` FROM users WHERE `id` = 7"
    );
}

#[tokio::test]
async fn test_and_with_quotes_arguments() {
    let (engine, store) = engine_for(Dialect::Postgres);
    let mut users: Vec<User> = Vec::new();
    engine
        .model(&mut users)
        .and_with("name = ?", &[json!("O'Neil")])
        .query()
        .await
        .unwrap();
    assert!(store
        .last_statement()
        .unwrap()
        .ends_with("WHERE 1=1 AND name = 'O''Neil'"));
}

#[tokio::test]
async fn test_build_previews_without_running() {
    let (engine, store) = engine_for(Dialect::MsSql);
    let sql = engine
        .table("users")
        .select(["id"])
        .limit(5)
        .build(OperationKind::Query)
        .unwrap();
    assert_eq!(sql, "SELECT TOP 5 [id] FROM users WHERE 1=1");
    assert!(store.statements().is_empty());
}

// ========================================
// Insert id strategies
// ========================================

#[tokio::test]
async fn test_insert_mysql_reads_driver_id() {
    let (engine, store) = engine_for(Dialect::MySql);
    store.push_outcome(1, 41);
    let mut user = admin();
    let id = engine.model(&mut user).insert().await.unwrap();
    assert_eq!(id, 41);
    assert_eq!(user.id, 41);
    assert_eq!(
        store.last_statement().unwrap(),
        "INSERT INTO users (`name`,`phone`,`sex`) VALUES ('admin','8613011112222',1)"
    );
}

#[tokio::test]
async fn test_insert_postgres_returning() {
    let (engine, store) = engine_for(Dialect::Postgres);
    store.push_rows(vec![user_row(11, "admin", "8613011112222")]);
    let mut user = admin();
    let id = engine.model(&mut user).insert().await.unwrap();
    assert_eq!(id, 11);
    assert_eq!(user.id, 11);
    assert!(store.last_statement().unwrap().ends_with(") RETURNING \"id\""));
}

#[tokio::test]
async fn test_insert_mssql_scope_identity() {
    let (engine, store) = engine_for(Dialect::MsSql);
    let mut identity = Row::new();
    identity.insert("last_insert_id".to_string(), json!("12"));
    store.push_rows(vec![identity]);

    let id = engine.model(&mut admin()).insert().await.unwrap();
    assert_eq!(id, 12);
    assert_eq!(
        store.last_statement().unwrap(),
        "INSERT INTO users ([name],[phone],[sex]) VALUES ('admin','8613011112222',1); \
         SELECT SCOPE_IDENTITY() AS last_insert_id"
    );
}

// ========================================
// Upsert
// ========================================

#[tokio::test]
async fn test_upsert_mysql_returns_existing_key() {
    let (engine, store) = engine_for(Dialect::MySql);
    store.push_outcome(2, 41);
    let id = engine
        .model(&mut admin())
        .select(["phone"])
        .on_conflict(["phone"])
        .upsert()
        .await
        .unwrap();
    assert_eq!(id, 41);
    assert!(store
        .last_statement()
        .unwrap()
        .ends_with("ON DUPLICATE KEY UPDATE `id`=LAST_INSERT_ID(`id`),`phone`='8613011112222'"));
}

#[tokio::test]
async fn test_upsert_postgres_requires_conflict_columns() {
    let (engine, store) = engine_for(Dialect::Postgres);
    let err = engine.model(&mut admin()).upsert().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingConflictColumns { .. }));
    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_upsert_mssql_inserts_when_absent() {
    let (engine, store) = engine_for(Dialect::MsSql);
    store.push_rows(vec![]);
    let mut identity = Row::new();
    identity.insert("last_insert_id".to_string(), json!(12));
    store.push_rows(vec![identity]);

    let mut user = admin();
    let id = engine
        .model(&mut user)
        .select(["name", "phone"])
        .on_conflict(["phone"])
        .upsert()
        .await
        .unwrap();
    assert_eq!(id, 12);
    assert_eq!(user.id, 12);
    assert_eq!(
        store.statements(),
        vec![
            "BEGIN".to_string(),
            "SELECT [id] FROM users WHERE [phone] = '8613011112222'".to_string(),
            "INSERT INTO users ([name],[phone],[sex]) VALUES ('admin','8613011112222',1); \
             SELECT SCOPE_IDENTITY() AS last_insert_id"
                .to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_upsert_mssql_updates_when_present() {
    let (engine, store) = engine_for(Dialect::MsSql);
    let mut existing = Row::new();
    existing.insert("id".to_string(), json!(12));
    store.push_rows(vec![existing]);

    let id = engine
        .model(&mut admin())
        .select(["phone"])
        .on_conflict(["phone"])
        .upsert()
        .await
        .unwrap();
    assert_eq!(id, 12, "same key as the first upsert");
    assert_eq!(
        store.statements()[2],
        "UPDATE users SET [phone]='8613011112222' WHERE [id] = 12"
    );
    assert_eq!(store.last_statement().unwrap(), "COMMIT");
}

#[tokio::test]
async fn test_upsert_mssql_rolls_back_on_failure() {
    let (engine, store) = engine_for(Dialect::MsSql);
    store.push_rows(vec![]);
    store.push_fetch_error("identity insert rejected");

    let err = engine
        .model(&mut admin())
        .on_conflict(["phone"])
        .upsert()
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(store.last_statement().unwrap(), "ROLLBACK");
}

// ========================================
// Preconditions
// ========================================

#[tokio::test]
async fn test_preconditions_never_reach_the_store() {
    let (engine, store) = engine_for(Dialect::MySql);

    let err = engine.table("users").query().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingModel(OperationKind::Query)));

    let mut users: Vec<User> = Vec::new();
    let err = engine.model(&mut users).insert().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingModel(OperationKind::Insert)));

    let err = engine.model(&mut admin()).id(0).query().await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPrimaryKey(_)));

    let err = engine
        .model(&mut admin())
        .index("tags", json!(["a", "b"]))
        .query()
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NonScalarIndex { .. }));

    let err = engine.model(&mut admin()).table("").query().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingTable(_)));

    assert!(store.statements().is_empty());
}

#[tokio::test]
#[should_panic(expected = "delete rejected")]
async fn test_strict_mode_panics_on_precondition() {
    let store = RecordingStore::new(Dialect::MySql);
    let engine = Engine::new(Arc::new(store), EngineConfig::default().strict(true));
    let _ = engine.table("users").delete().await;
}

#[tokio::test]
async fn test_strict_mode_returns_store_errors() {
    let store = RecordingStore::new(Dialect::MySql);
    store.push_exec_error("duplicate entry");
    let engine = Engine::new(Arc::new(store), EngineConfig::default().strict(true));
    let err = engine.model(&mut admin()).insert().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

// ========================================
// Cache coordination
// ========================================

#[tokio::test]
async fn test_cached_read_after_update_survives_store_outage() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);

    let mut user = admin();
    user.id = 5;
    user.name = "renamed".to_string();
    // UPDATE uses the default outcome; the refresh reads this row back
    store.push_rows(vec![user_row(5, "renamed", "8613011112222")]);
    let affected = engine
        .model(&mut user)
        .index("phone", "8613011112222")
        .use_cache()
        .update()
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(
        cache.keys().await,
        vec!["test:cache:users:id:5", "test:cache:users:phone:8613011112222"]
    );

    store.set_offline(true);

    let mut by_key = User::default();
    let rows = engine.model(&mut by_key).id(5).use_cache().query().await.unwrap();
    assert_eq!(rows, 1);
    assert_eq!(by_key.name, "renamed");

    let mut by_phone = User::default();
    engine
        .model(&mut by_phone)
        .index("phone", "8613011112222")
        .use_cache()
        .query()
        .await
        .unwrap();
    assert_eq!(by_phone.id, 5);

    // without use_cache the store is asked, and it is down
    let err = engine.model(&mut User::default()).id(5).query().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[tokio::test]
async fn test_read_miss_populates_cache() {
    let (engine, store, cache) = cached_engine(Dialect::Postgres);
    store.push_rows(vec![user_row(8, "admin", "861")]);

    let mut found = User::default();
    engine.model(&mut found).id(8).use_cache().query().await.unwrap();
    assert_eq!(found.name, "admin");
    assert_eq!(store.statements().len(), 1);
    assert_eq!(cache.keys().await, vec!["test:cache:users:id:8"]);

    let mut again = User::default();
    engine.model(&mut again).id(8).use_cache().query().await.unwrap();
    assert_eq!(again.name, "admin");
    assert_eq!(store.statements().len(), 1, "second read served from cache");
}

#[tokio::test]
async fn test_cache_outage_is_a_miss() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    cache.set_offline(true);
    store.push_rows(vec![user_row(3, "admin", "861")]);

    let mut found = User::default();
    let rows = engine.model(&mut found).id(3).use_cache().query().await.unwrap();
    assert_eq!(rows, 1);
    assert_eq!(found.name, "admin");

    // a failing cache does not fail the write either
    let affected = engine.model(&mut found).use_cache().update().await.unwrap();
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn test_write_without_cache_flag_invalidates() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    store.push_rows(vec![user_row(5, "admin", "861")]);
    engine
        .model(&mut User::default())
        .id(5)
        .use_cache()
        .query()
        .await
        .unwrap();
    assert_eq!(cache.keys().await.len(), 1);

    let mut user = admin();
    user.id = 5;
    engine.model(&mut user).update().await.unwrap();
    assert!(cache.keys().await.is_empty());
}

#[tokio::test]
async fn test_delete_invalidates_record_and_pointers() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    let mut user = admin();
    user.id = 5;
    store.push_rows(vec![user_row(5, "admin", "8613011112222")]);
    engine
        .model(&mut user)
        .index("phone", "8613011112222")
        .use_cache()
        .update()
        .await
        .unwrap();
    assert_eq!(cache.keys().await.len(), 2);

    let deleted = engine
        .model(&mut user)
        .index("phone", "8613011112222")
        .delete()
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.last_statement().unwrap(), "DELETE FROM users WHERE `id` = 5");
    assert!(cache.keys().await.is_empty());
}

#[tokio::test]
async fn test_read_with_excluded_columns_is_not_cached() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    let mut partial = user_row(7, "admin", "861");
    partial.shift_remove("phone");
    store.push_rows(vec![partial]);

    let mut found = User::default();
    engine
        .model(&mut found)
        .id(7)
        .exclude(["phone"])
        .use_cache()
        .query()
        .await
        .unwrap();
    assert_eq!(found.name, "admin");
    assert!(cache.keys().await.is_empty());

    store.push_rows(vec![user_row(7, "admin", "861")]);
    let mut full = User::default();
    engine.model(&mut full).id(7).use_cache().query().await.unwrap();
    assert_eq!(full.phone, "861");
    assert_eq!(store.statements().len(), 2, "full read goes to the store");
}

#[tokio::test]
async fn test_delete_by_where_invalidates_matched_records() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    store.push_rows(vec![user_row(7, "admin", "861")]);
    engine.model(&mut User::default()).id(7).use_cache().query().await.unwrap();
    assert_eq!(cache.keys().await, vec!["test:cache:users:id:7"]);

    let mut matched = Row::new();
    matched.insert("id".to_string(), json!(7));
    store.push_rows(vec![matched]);
    let deleted = engine.table("users").filter("phone = '861'").delete().await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(
        store.statements()[1..],
        [
            "SELECT `id` FROM users WHERE phone = '861'".to_string(),
            "DELETE FROM users WHERE phone = '861'".to_string(),
        ]
    );
    assert!(cache.keys().await.is_empty());

    // the stale record is no longer served
    engine.model(&mut User::default()).id(7).use_cache().query().await.unwrap();
    assert_eq!(store.statements().len(), 4);
}

#[tokio::test]
async fn test_update_by_where_refreshes_matched_records() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    let mut matched = Row::new();
    matched.insert("id".to_string(), json!(4));
    store.push_rows(vec![matched]);
    store.push_rows(vec![user_row(4, "root", "861")]);

    let mut user = admin();
    user.name = "root".to_string();
    let affected = engine
        .model(&mut user)
        .select(["name"])
        .filter("phone = '861'")
        .use_cache()
        .update()
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let statements = store.statements();
    assert_eq!(statements[0], "SELECT `id` FROM users WHERE phone = '861'");
    assert_eq!(statements[1], "UPDATE users SET `name`='root' WHERE phone = '861'");
    assert_eq!(statements[2], "SELECT * FROM users WHERE `id` = 4");
    assert_eq!(cache.keys().await, vec!["test:cache:users:id:4"]);
}

#[tokio::test]
async fn test_where_addressed_write_without_cache_runs_one_statement() {
    let (engine, store) = engine_for(Dialect::MySql);
    engine.table("users").filter("sex = 2").delete().await.unwrap();
    assert_eq!(store.statements(), vec!["DELETE FROM users WHERE sex = 2".to_string()]);
}

#[tokio::test]
async fn test_detached_update_needs_a_record() {
    let (engine, store) = engine_for(Dialect::MySql);
    let err = engine.table("users").filter("sex = 2").update().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingModel(OperationKind::Update)));
    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_cache_alone() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);
    store.push_exec_error("lock wait timeout");
    let mut user = admin();
    user.id = 5;
    let err = engine.model(&mut user).use_cache().update().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert!(cache.keys().await.is_empty());
    assert_eq!(store.statements().len(), 1, "no refresh read after a failed write");
}

// ========================================
// Transactions and cache effects
// ========================================

#[tokio::test]
async fn test_cache_effects_wait_for_commit() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);

    let mut user = admin();
    user.id = 5;
    let mut tx = engine.tx_begin().await.unwrap();
    tx.update(engine.model(&mut user).use_cache()).await.unwrap();
    assert_eq!(tx.pending_effects().len(), 1);
    assert!(cache.keys().await.is_empty());

    store.push_rows(vec![user_row(5, "admin", "8613011112222")]);
    tx.commit().await.unwrap();

    assert_eq!(cache.keys().await, vec!["test:cache:users:id:5"]);
    let statements = store.statements();
    assert_eq!(statements[0], "BEGIN");
    assert_eq!(statements[2], "COMMIT");
    assert_eq!(statements[3], "SELECT * FROM users WHERE `id` = 5");
}

#[tokio::test]
async fn test_failed_transaction_drops_cache_effects() {
    let (engine, store, cache) = cached_engine(Dialect::MySql);

    let mut user = admin();
    user.id = 5;
    let mut tx = engine.tx_begin().await.unwrap();
    tx.update(engine.model(&mut user).use_cache()).await.unwrap();

    store.push_exec_error("deadlock found");
    let err = tx.exec("UPDATE users SET sex = 2", &[]).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert!(tx.is_finished());
    assert!(tx.pending_effects().is_empty());
    assert_eq!(store.last_statement().unwrap(), "ROLLBACK");

    let err = tx.delete(engine.model(&mut user)).await.unwrap_err();
    assert!(matches!(err, EngineError::TransactionFinished));
    assert!(cache.keys().await.is_empty());
}

#[tokio::test]
async fn test_mssql_upsert_inside_transaction_uses_it() {
    let (engine, store) = engine_for(Dialect::MsSql);
    let mut existing = Row::new();
    existing.insert("id".to_string(), json!(3));

    let mut tx = engine.tx_begin().await.unwrap();
    store.push_rows(vec![existing]);
    let id = tx
        .upsert(engine.model(&mut admin()).select(["name"]).on_conflict(["phone"]))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(id, 3);
    let statements = store.statements();
    assert_eq!(statements.iter().filter(|s| *s == "BEGIN").count(), 1);
    assert_eq!(statements.last().unwrap(), "COMMIT");
}
