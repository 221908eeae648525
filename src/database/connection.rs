//! SQLite connection for the shell's durable store.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A migrated `rusqlite::Connection`.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file and brings its schema up to date.
    ///
    /// Two shell instances may share the file; concurrent writers wait up to
    /// [`BUSY_TIMEOUT`] and the last write wins.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        Self::prepare(Connection::open(path)?)
    }

    /// Opens a private in-memory database, discarded on drop.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::prepare(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn prepare(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }
}
