//! Volume metadata model.
//!
//! Follows the config/state split used by the metadata store: a
//! [`VolumeSpec`] is fixed at creation time while [`VolumeStatus`] changes
//! over the volume's life. Both are persisted together as one
//! [`VolumeMetadata`] record keyed by the volume name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-volume directory holding the actual data.
pub const DATA_DIR_NAME: &str = "_data";

/// Immutable creation-time configuration for a volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Delete the volume's data directory together with its metadata.
    #[serde(default)]
    pub purge_after_delete: bool,
}

/// Mutable runtime state for a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatus {
    /// Identifier of the exclusive current mounter, `None` while unmounted.
    #[serde(default)]
    pub mounted_by: Option<String>,
}

/// Full metadata record for one volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMetadata {
    /// Data location relative to the backend's mount root, always
    /// `<name>/_data`. Computed once at creation and never changed.
    pub mountpoint: PathBuf,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
    /// Immutable creation-time configuration.
    pub spec: VolumeSpec,
    /// Mutable runtime state.
    pub status: VolumeStatus,
}

impl VolumeMetadata {
    /// Build a fresh record for `name`: computed mountpoint, creation
    /// timestamp, unmounted status.
    pub fn new(name: &str, spec: VolumeSpec) -> Self {
        Self {
            mountpoint: Path::new(name).join(DATA_DIR_NAME),
            created_at: Utc::now(),
            spec,
            status: VolumeStatus::default(),
        }
    }

    /// Absolute path of the volume's data directory under `root`.
    pub fn data_path(&self, root: &Path) -> PathBuf {
        root.join(&self.mountpoint)
    }

    /// Whether any caller currently holds the volume mounted.
    pub fn is_mounted(&self) -> bool {
        self.status.mounted_by.is_some()
    }
}
