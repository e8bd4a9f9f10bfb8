pub mod campaigns;
pub mod migrations;
pub mod users;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

use crate::store::migrations::BASE_MIGRATION;

/// Timestamp layout used for `date_added`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("transaction already finished")]
    TransactionClosed,
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("blocking database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Shared handle to the single SQLite connection.
///
/// Every caller locks the connection for the whole unit of work, so two
/// transactions never interleave on it.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed creating database directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening database: {}", path.display()))?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self::from_connection(conn)?;
        debug!("opened database at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> std::result::Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> std::result::Result<Self, StoreError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection on the current thread.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> T,
    ) -> std::result::Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut guard))
    }

    /// Same as [`Database::with_conn`] but off the async executor.
    pub async fn run<T, F>(&self, f: F) -> std::result::Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f)).await?
    }
}

pub fn migrate(conn: &Connection) -> std::result::Result<(), StoreError> {
    conn.execute_batch(BASE_MIGRATION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Database;

    #[test]
    fn opens_file_database_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/campaigns.db");
        let db = Database::open(&path, Duration::from_millis(100)).expect("open");
        let tables: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('campaign_data', 'user_credentials')",
                    [],
                    |row| row.get(0),
                )
            })
            .expect("lock")
            .expect("query");
        assert_eq!(tables, 2);
        assert!(path.exists());
    }

    #[test]
    fn migration_is_repeatable() {
        let db = Database::open_in_memory().expect("open");
        db.with_conn(|conn| super::migrate(conn))
            .expect("lock")
            .expect("second migration");
    }

    #[tokio::test]
    async fn run_executes_off_the_executor() {
        let db = Database::open_in_memory().expect("open");
        let count: i64 = db
            .run(|conn| conn.query_row("SELECT COUNT(*) FROM campaign_data", [], |row| row.get(0)))
            .await
            .expect("task")
            .expect("query");
        assert_eq!(count, 0);
    }
}
