//! Versioned schema migrations.
//!
//! `schema_version` records every applied step; each step runs once, in order.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};
use tracing::info;

type Step = fn(&Connection) -> Result<(), rusqlite::Error>;

/// Ordered migration steps: version, description, body.
const MIGRATIONS: &[(i32, &str, Step)] = &[(1, "Namespaced key-value store", create_kv_store)];

/// Highest version in [`MIGRATIONS`].
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Version recorded in the database, or 0 before the first migration.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Applies every step newer than the recorded version.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);
    for (version, description, step) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        step(conn)?;
        let applied_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![version, applied_at, description],
        )?;
        info!(version, description, "applied schema migration");
    }
    Ok(())
}

fn create_kv_store(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_store (
             namespace TEXT NOT NULL,
             key TEXT NOT NULL,
             value TEXT NOT NULL,
             updated_at INTEGER NOT NULL,
             PRIMARY KEY (namespace, key)
         );",
    )
}
