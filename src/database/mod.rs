//! PromptTrail persistence layer.
//!
//! Provides SQLite connection management, schema migrations and the key-value
//! backends the bookmark store writes through.
//!
//! # Usage
//!
//! ```no_run
//! use prompttrail::database::{Database, SqliteStorage};
//!
//! let db = Database::open("prompttrail.db").expect("failed to open database");
//! let storage = SqliteStorage::new(db);
//! ```

pub mod connection;
pub mod migrations;
pub mod storage;

pub use connection::Database;
pub use storage::{MemoryStorage, SqliteStorage, StorageBackend};
