//! Persistence layer for volume metadata.
//!
//! SQLite-based, one serialized record per volume keyed by volume name.
//! [`Database`] owns the connection, pragmas, and schema; [`VolumeStore`]
//! layers the transactional record operations on top.

mod schema;
mod volumes;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{VolumeError, VolumeResult};

pub use volumes::VolumeStore;

/// File name of the metadata database under a backend's mount root.
pub const METADATA_DB_FILE: &str = "metadata.db";

/// On-disk files the database engine owns under the mount root. A volume
/// named after any of these would collide with the store itself, so
/// backends reserve them.
pub const METADATA_DB_FILES: [&str; 3] = [METADATA_DB_FILE, "metadata.db-wal", "metadata.db-shm"];

/// Helper macro to convert rusqlite errors to VolumeError.
macro_rules! db_err {
    ($result:expr) => {
        $result.map_err(|e| VolumeError::Database(e.to_string()))
    };
}

pub(crate) use db_err;

/// SQLite database handle.
///
/// Thread-safe via `parking_lot::Mutex`. [`VolumeStore`] wraps this to
/// provide the record-level API.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database.
    pub fn open(db_path: &Path) -> VolumeResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = db_err!(Connection::open(db_path))?;

        // SQLite configuration
        // - WAL mode: better concurrent read performance
        // - FULL sync: fsync after each transaction
        // - Busy timeout: rides out slow remote-filesystem I/O
        db_err!(conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=100000;
            "
        ))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the database connection.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Close the underlying connection, surfacing any flush failure.
    ///
    /// Fails if other handles to this database are still alive.
    pub fn close(self) -> VolumeResult<()> {
        let mutex = Arc::try_unwrap(self.conn).map_err(|_| {
            VolumeError::Internal("cannot close database: handle still shared".into())
        })?;
        mutex
            .into_inner()
            .close()
            .map_err(|(_, e)| VolumeError::Database(e.to_string()))
    }

    fn init_schema(conn: &Connection) -> VolumeResult<()> {
        for sql in schema::all_schemas() {
            db_err!(conn.execute_batch(sql))?;
        }

        let current_version: Option<i32> = db_err!(
            conn.query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
        )?;

        match current_version {
            None => {
                let now = Utc::now().to_rfc3339();
                db_err!(conn.execute(
                    "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, ?2)",
                    rusqlite::params![schema::SCHEMA_VERSION, now],
                ))?;
                tracing::info!(
                    "Initialized metadata schema version {}",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::warn!(
                    "Metadata schema version {} is older than current {}. Migrations not yet implemented.",
                    v,
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(VolumeError::Database(format!(
                    "metadata schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_db_open() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join(METADATA_DB_FILE);
        let _db = Database::open(&db_path).unwrap();
    }

    #[test]
    fn test_db_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join(METADATA_DB_FILE);
        let _db = Database::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_db_close() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join(METADATA_DB_FILE)).unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_db_close_fails_while_shared() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join(METADATA_DB_FILE)).unwrap();
        let clone = db.clone();
        assert!(matches!(db.close(), Err(VolumeError::Internal(_))));
        drop(clone);
    }
}
