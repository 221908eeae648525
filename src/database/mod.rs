//! Durable storage for the shell.
//!
//! Provides SQLite connection management, schema migrations and the
//! namespaced key-value store the core components persist through.
//!
//! # Usage
//!
//! ```no_run
//! use seekshell::database::{KeyValueStore, SqliteStore};
//!
//! let store = SqliteStore::open("seekshell.db").expect("failed to open database");
//! store
//!     .set("tab-state", "tabState", &serde_json::json!({"tabs": []}))
//!     .expect("write failed");
//! ```

pub mod connection;
pub mod kv_store;
pub mod migrations;

pub use connection::Database;
pub use kv_store::{KeyValueStore, MemoryStore, SqliteStore};
