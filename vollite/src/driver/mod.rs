//! Driver contract and backend implementations.
//!
//! A [`VolumeDriver`] is one storage backend serving the volume lifecycle
//! against a metadata store rooted at its local mount root. Backends are
//! constructed through the [`DriverRegistry`]; a transport layer resolves a
//! backend kind once and forwards every subsequent lifecycle call onto the
//! resulting driver instance.

mod nfs;
mod registry;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::VolumeResult;
use crate::volume::VolumeMetadata;

pub use nfs::{MOCK_ADDRESS, NFS_DRIVER_KIND, NfsDriver, NfsOptions};
pub use registry::{DriverFactory, DriverRegistry};

/// Contract every storage backend implements.
///
/// All operations are synchronous and serialize on one exclusive lock per
/// driver instance, pure reads included. Distinct driver instances operate
/// fully independently.
pub trait VolumeDriver: Send + Sync {
    /// Create a volume named `name`.
    ///
    /// Validates the per-volume options (`purgeAfterDelete` is the only
    /// recognized key; anything else is rejected), refuses reserved and
    /// already-existing names, then persists a fresh record and provisions
    /// the data directory in one atomic step.
    fn create(&self, name: &str, options: &HashMap<String, String>) -> VolumeResult<()>;

    /// Snapshot of every volume's metadata, keyed by name.
    fn list(&self) -> VolumeResult<HashMap<String, VolumeMetadata>>;

    /// Metadata for `name`.
    fn get(&self, name: &str) -> VolumeResult<VolumeMetadata>;

    /// Remove the volume `name`.
    ///
    /// Fails while the volume is mounted. When the volume was created with
    /// `purgeAfterDelete`, the data directory is deleted as well; if that
    /// deletion fails the metadata record is left intact.
    fn remove(&self, name: &str) -> VolumeResult<()>;

    /// The volume's mountpoint, relative to the backend's mount root.
    fn path(&self, name: &str) -> VolumeResult<PathBuf>;

    /// Mark the volume mounted by `caller` and return its mountpoint.
    ///
    /// Fails if any caller already holds the volume.
    fn mount(&self, name: &str, caller: &str) -> VolumeResult<PathBuf>;

    /// Clear the mount held by `caller`.
    ///
    /// Fails if the volume is not mounted or is held by a different caller.
    fn unmount(&self, name: &str, caller: &str) -> VolumeResult<()>;

    /// Tear the backend down: release the metadata store and detach the
    /// remote export from the mount root.
    ///
    /// Store-close failures are logged and swallowed; a failed unmount of
    /// the remote export is surfaced to the caller.
    fn destroy(&self) -> VolumeResult<()>;
}
