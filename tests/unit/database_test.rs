//! Unit tests for the SeekShell database layer (connection, migrations, key-value store).

use serde_json::json;
use tempfile::TempDir;

use seekshell::database::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use seekshell::database::{Database, KeyValueStore, MemoryStore, SqliteStore};

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_kv_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='kv_store'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists, "kv_store should exist after migrations");
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_reopening_does_not_rerun_migrations() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("shell.db");
    {
        let db = Database::open(&path).unwrap();
        assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
    }
    let db = Database::open(&path).unwrap();
    let rows: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_sqlite_store_missing_key_is_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get("tab-state", "tabState").unwrap(), None);
}

#[test]
fn test_sqlite_store_set_then_get() {
    let store = SqliteStore::open_in_memory().unwrap();
    let value = json!({"tabs": [{"id": "a"}], "activeTabId": "a"});
    store.set("tab-state", "tabState", &value).unwrap();
    assert_eq!(store.get("tab-state", "tabState").unwrap(), Some(value));
}

#[test]
fn test_sqlite_store_overwrites_existing_key() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("ns", "k", &json!(1)).unwrap();
    store.set("ns", "k", &json!(2)).unwrap();
    assert_eq!(store.get("ns", "k").unwrap(), Some(json!(2)));
}

#[test]
fn test_sqlite_store_namespaces_are_isolated() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("tab-state", "k", &json!("tabs")).unwrap();
    store.set("session-state", "k", &json!("cookies")).unwrap();
    assert_eq!(store.get("tab-state", "k").unwrap(), Some(json!("tabs")));
    assert_eq!(store.get("session-state", "k").unwrap(), Some(json!("cookies")));
}

#[test]
fn test_sqlite_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("shell.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        store.set("session-state", "sessions", &json!({"t1": []})).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(
        store.get("session-state", "sessions").unwrap(),
        Some(json!({"t1": []}))
    );
}

#[test]
fn test_sqlite_store_rejects_corrupt_value() {
    let db = Database::open_in_memory().unwrap();
    db.connection()
        .execute(
            "INSERT INTO kv_store (namespace, key, value, updated_at) VALUES ('ns', 'k', '{not json', 0)",
            [],
        )
        .unwrap();
    let store = SqliteStore::new(db);
    assert!(store.get("ns", "k").is_err());
}

#[test]
fn test_memory_store_counts_writes_per_key() {
    let store = MemoryStore::new();
    store.set("ns", "a", &json!(1)).unwrap();
    store.set("ns", "a", &json!(2)).unwrap();
    store.set("ns", "b", &json!(3)).unwrap();
    assert_eq!(store.write_count("ns", "a"), 2);
    assert_eq!(store.write_count("ns", "b"), 1);
    assert_eq!(store.write_count("ns", "c"), 0);
    assert_eq!(store.get("ns", "a").unwrap(), Some(json!(2)));
}
