//! SQLite connection holding the bookmark key-value table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;

/// How long a write waits on a lock held by another page's session.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// An open, migrated bookmark database.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (or creates) the database file at `path` and brings its schema up to date.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::migrated(conn, Some(path.as_ref().to_path_buf()))
    }

    /// Opens a private in-memory database; its contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::migrated(Connection::open_in_memory()?, None)
    }

    fn migrated(conn: Connection, path: Option<PathBuf>) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn, path })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> i32 {
        migrations::get_schema_version(&self.conn)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
