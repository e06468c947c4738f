pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod repository;
pub mod store;
pub mod validation;

pub use error::StoreError;
pub use repository::{CapsuleRepository, OpenOutcome};
pub use store::CapsuleStore;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// Location string that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Lock wait used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, busy_timeout)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_in_memory_with(busy_timeout: Duration) -> Result<Self> {
        let db = Self::init(Connection::open_in_memory()?, busy_timeout)?;
        info!("In-memory database opened");
        Ok(db)
    }

    /// Open whatever `location` names: a file path, or [`IN_MEMORY`].
    pub fn open_location(location: &str, busy_timeout: Duration) -> Result<Self> {
        if location == IN_MEMORY {
            Self::open_in_memory_with(busy_timeout)
        } else {
            Self::open(Path::new(location), busy_timeout)
        }
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("DB lock poisoned: {}", e)))?;
        f(&conn)
    }
}
