//! Transactional record operations for volume metadata.
//!
//! Every mutation runs inside one SQLite transaction and takes a callback
//! that validates or mutates the record while the transaction is open. A
//! callback error rolls the transaction back with the stored value
//! untouched. The store never exposes a bare read-then-separate-write pair
//! to callers.

use std::collections::HashMap;

use rusqlite::{OptionalExtension, params};

use crate::db::{Database, db_err};
use crate::errors::{VolumeError, VolumeResult};
use crate::volume::VolumeMetadata;

/// Record-level API over [`Database`] for volume metadata.
#[derive(Clone)]
pub struct VolumeStore {
    db: Database,
}

impl VolumeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Atomically create the record for `name`.
    ///
    /// Fails with a conflict if the name is already present. `init` builds
    /// the fresh record and may perform side effects that must succeed
    /// before anything is persisted, such as provisioning the data
    /// directory; an `init` error aborts without persisting.
    pub fn create_with<F>(&self, name: &str, init: F) -> VolumeResult<VolumeMetadata>
    where
        F: FnOnce() -> VolumeResult<VolumeMetadata>,
    {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        let exists = db_err!(
            tx.query_row("SELECT 1 FROM volumes WHERE name = ?1", [name], |_| Ok(()))
                .optional()
        )?
        .is_some();
        if exists {
            return Err(VolumeError::Conflict(format!(
                "volume {name} already exists"
            )));
        }

        let metadata = init()?;
        let blob = encode(name, &metadata)?;
        db_err!(tx.execute(
            "INSERT INTO volumes (name, metadata) VALUES (?1, ?2)",
            params![name, blob],
        ))?;
        db_err!(tx.commit())?;
        Ok(metadata)
    }

    /// Read the record for `name` without mutating anything.
    pub fn get(&self, name: &str) -> VolumeResult<VolumeMetadata> {
        let conn = self.db.conn();
        let blob = db_err!(
            conn.query_row(
                "SELECT metadata FROM volumes WHERE name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()
        )?;
        match blob {
            Some(blob) => decode(name, &blob),
            None => Err(VolumeError::NotFound(name.to_owned())),
        }
    }

    /// Atomically read-modify-write the record for `name`.
    ///
    /// `mutate` receives a mutable handle to the current record; the result
    /// is persisted only if it returns `Ok`, and the updated record is
    /// returned. On error the transaction rolls back, leaving the stored
    /// value unchanged.
    pub fn update_with<F>(&self, name: &str, mutate: F) -> VolumeResult<VolumeMetadata>
    where
        F: FnOnce(&mut VolumeMetadata) -> VolumeResult<()>,
    {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        let blob = db_err!(
            tx.query_row(
                "SELECT metadata FROM volumes WHERE name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()
        )?
        .ok_or_else(|| VolumeError::NotFound(name.to_owned()))?;

        let mut metadata = decode(name, &blob)?;
        mutate(&mut metadata)?;

        let blob = encode(name, &metadata)?;
        db_err!(tx.execute(
            "UPDATE volumes SET metadata = ?2 WHERE name = ?1",
            params![name, blob],
        ))?;
        db_err!(tx.commit())?;
        Ok(metadata)
    }

    /// Atomically delete the record for `name`.
    ///
    /// `precondition` may veto the deletion by returning an error (for
    /// example while the volume is still mounted) and may perform side
    /// effects that must succeed before the record disappears, such as
    /// purging the data directory.
    pub fn delete_if<F>(&self, name: &str, precondition: F) -> VolumeResult<()>
    where
        F: FnOnce(&VolumeMetadata) -> VolumeResult<()>,
    {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        let blob = db_err!(
            tx.query_row(
                "SELECT metadata FROM volumes WHERE name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()
        )?
        .ok_or_else(|| VolumeError::NotFound(name.to_owned()))?;

        let metadata = decode(name, &blob)?;
        precondition(&metadata)?;

        db_err!(tx.execute("DELETE FROM volumes WHERE name = ?1", [name]))?;
        db_err!(tx.commit())?;
        Ok(())
    }

    /// Snapshot every key/record pair in the store.
    pub fn list_all(&self) -> VolumeResult<HashMap<String, VolumeMetadata>> {
        let conn = self.db.conn();
        let mut stmt = db_err!(conn.prepare("SELECT name, metadata FROM volumes"))?;
        let rows = db_err!(stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }))?;

        let mut volumes = HashMap::new();
        for row in rows {
            let (name, blob) = db_err!(row)?;
            let metadata = decode(&name, &blob)?;
            volumes.insert(name, metadata);
        }
        Ok(volumes)
    }

    /// Close the underlying database, surfacing any flush failure.
    pub fn close(self) -> VolumeResult<()> {
        self.db.close()
    }
}

fn encode(name: &str, metadata: &VolumeMetadata) -> VolumeResult<String> {
    serde_json::to_string(metadata)
        .map_err(|e| VolumeError::Database(format!("serialize metadata for volume {name}: {e}")))
}

fn decode(name: &str, blob: &str) -> VolumeResult<VolumeMetadata> {
    serde_json::from_str(blob)
        .map_err(|e| VolumeError::Database(format!("corrupt metadata for volume {name}: {e}")))
}
