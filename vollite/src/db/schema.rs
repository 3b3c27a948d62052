//! Metadata database schema.

/// Current schema version. Bump when the DDL below changes shape.
pub const SCHEMA_VERSION: i32 = 1;

/// One JSON metadata blob per volume, keyed by volume name.
const VOLUMES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS volumes (
    name     TEXT PRIMARY KEY,
    metadata TEXT NOT NULL
);
";

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    version    INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub fn all_schemas() -> &'static [&'static str] {
    &[VOLUMES_TABLE, SCHEMA_VERSION_TABLE]
}
