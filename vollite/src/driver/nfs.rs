//! NFS storage backend.
//!
//! Mounts a remote NFS export onto a local root at initialization, then
//! serves the volume lifecycle purely against the metadata store and the
//! directory tree under that root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::{Database, METADATA_DB_FILE, METADATA_DB_FILES, VolumeStore};
use crate::errors::{VolumeError, VolumeResult};
use crate::fs;
use crate::volume::{VolumeMetadata, VolumeSpec};

use super::VolumeDriver;

/// Kind name under which this backend registers.
pub const NFS_DRIVER_KIND: &str = "nfs";

/// Address sentinel that skips the real mount syscalls, so the backend can
/// be exercised hermetically against a plain local directory.
pub const MOCK_ADDRESS: &str = "nfs-server.mock";

/// Per-volume create option selecting the purge policy.
const OPT_PURGE_AFTER_DELETE: &str = "purgeAfterDelete";

fn default_mount_options() -> Vec<String> {
    [
        "nfsvers=4",
        "rw",
        "noatime",
        "rsize=8192",
        "wsize=8192",
        "tcp",
        "timeo=14",
        "sync",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// Backend configuration payload for the NFS driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NfsOptions {
    /// Address of the NFS server.
    pub address: String,
    /// Exported path on the server.
    pub remote_path: String,
    /// Mount flags handed to the mount syscall, in order.
    #[serde(default = "default_mount_options")]
    pub mount_options: Vec<String>,
    /// Default purge policy for volumes that do not set their own.
    #[serde(default)]
    pub purge_after_delete: bool,
}

impl NfsOptions {
    fn parse(payload: &str) -> VolumeResult<Self> {
        serde_json::from_str(payload)
            .map_err(|e| VolumeError::Config(format!("invalid NFS driver options: {e}")))
    }

    fn is_mock(&self) -> bool {
        self.address == MOCK_ADDRESS
    }
}

/// NFS-backed [`VolumeDriver`].
///
/// Carries no state beyond its options, the mount root, and the metadata
/// store. Every operation acquires the store lock exclusively, so metadata
/// reads stay serialized with mutations.
pub struct NfsDriver {
    opts: NfsOptions,
    root: PathBuf,
    reserved_names: Vec<&'static str>,
    /// `None` once the driver has been destroyed.
    store: RwLock<Option<VolumeStore>>,
}

impl NfsDriver {
    /// Initialize the backend: parse options, prepare and mount the root,
    /// open the metadata store.
    pub fn new(mount_root: &Path, options: &str) -> VolumeResult<Self> {
        let opts = NfsOptions::parse(options)?;

        std::fs::create_dir_all(mount_root).map_err(|e| {
            VolumeError::Storage(format!(
                "failed to create mount root {}: {}",
                mount_root.display(),
                e
            ))
        })?;

        if !opts.is_mock() {
            fs::mount_remote(
                &opts.address,
                &opts.remote_path,
                mount_root,
                &opts.mount_options,
            )?;
        }

        let db = Database::open(&mount_root.join(METADATA_DB_FILE))?;

        info!(
            address = %opts.address,
            remote_path = %opts.remote_path,
            root = %mount_root.display(),
            "NFS backend initialized"
        );

        Ok(Self {
            opts,
            root: mount_root.to_path_buf(),
            reserved_names: METADATA_DB_FILES.to_vec(),
            store: RwLock::new(Some(VolumeStore::new(db))),
        })
    }

    /// Registry constructor for the `"nfs"` kind.
    pub fn factory(mount_root: &Path, options: &str) -> VolumeResult<Box<dyn VolumeDriver>> {
        Ok(Box::new(Self::new(mount_root, options)?))
    }

    /// Resolve the per-volume spec from create options, falling back to
    /// the backend defaults.
    fn spec_from_options(&self, options: &HashMap<String, String>) -> VolumeResult<VolumeSpec> {
        let mut spec = VolumeSpec {
            purge_after_delete: self.opts.purge_after_delete,
        };
        for (key, value) in options {
            match key.as_str() {
                OPT_PURGE_AFTER_DELETE => {
                    spec.purge_after_delete = value.parse().map_err(|_| {
                        VolumeError::Validation(format!(
                            "invalid value {value:?} for {OPT_PURGE_AFTER_DELETE}"
                        ))
                    })?;
                }
                _ => {
                    return Err(VolumeError::Validation(format!(
                        "unknown option {key} with value {value}"
                    )));
                }
            }
        }
        Ok(spec)
    }
}

/// The store handle, or an error once the driver has been destroyed.
fn live(store: &Option<VolumeStore>) -> VolumeResult<&VolumeStore> {
    store
        .as_ref()
        .ok_or_else(|| VolumeError::Internal("driver has been destroyed".into()))
}

impl VolumeDriver for NfsDriver {
    fn create(&self, name: &str, options: &HashMap<String, String>) -> VolumeResult<()> {
        let guard = self.store.write();
        let store = live(&guard)?;

        if self.reserved_names.contains(&name) {
            return Err(VolumeError::Validation(format!(
                "volume name {name} is reserved, choose a different name"
            )));
        }
        let spec = self.spec_from_options(options)?;

        info!(volume = %name, "create volume");

        store.create_with(name, || {
            let metadata = VolumeMetadata::new(name, spec);
            std::fs::create_dir_all(metadata.data_path(&self.root)).map_err(|e| {
                VolumeError::Storage(format!(
                    "failed to create data directory for volume {name}: {e}"
                ))
            })?;
            Ok(metadata)
        })?;
        Ok(())
    }

    fn list(&self) -> VolumeResult<HashMap<String, VolumeMetadata>> {
        let guard = self.store.write();
        let store = live(&guard)?;

        debug!("list volumes");
        store.list_all()
    }

    fn get(&self, name: &str) -> VolumeResult<VolumeMetadata> {
        let guard = self.store.write();
        let store = live(&guard)?;

        debug!(volume = %name, "get volume");
        store.get(name)
    }

    fn remove(&self, name: &str) -> VolumeResult<()> {
        let guard = self.store.write();
        let store = live(&guard)?;

        info!(volume = %name, "remove volume");

        store.delete_if(name, |metadata| {
            if let Some(holder) = &metadata.status.mounted_by {
                return Err(VolumeError::Conflict(format!(
                    "volume {name} is mounted by {holder}, unmount it before removing"
                )));
            }

            if metadata.spec.purge_after_delete {
                std::fs::remove_dir_all(self.root.join(name)).map_err(|e| {
                    VolumeError::Storage(format!("failed to remove data for volume {name}: {e}"))
                })?;
            }
            Ok(())
        })
    }

    fn path(&self, name: &str) -> VolumeResult<PathBuf> {
        let guard = self.store.write();
        let store = live(&guard)?;

        debug!(volume = %name, "path volume");
        Ok(store.get(name)?.mountpoint)
    }

    fn mount(&self, name: &str, caller: &str) -> VolumeResult<PathBuf> {
        let guard = self.store.write();
        let store = live(&guard)?;

        info!(volume = %name, caller = %caller, "mount volume");

        let metadata = store.update_with(name, |metadata| {
            if metadata.is_mounted() {
                return Err(VolumeError::Conflict(format!(
                    "volume {name} is already mounted"
                )));
            }
            metadata.status.mounted_by = Some(caller.to_owned());
            Ok(())
        })?;
        Ok(metadata.mountpoint)
    }

    fn unmount(&self, name: &str, caller: &str) -> VolumeResult<()> {
        let guard = self.store.write();
        let store = live(&guard)?;

        info!(volume = %name, caller = %caller, "unmount volume");

        store.update_with(name, |metadata| {
            match metadata.status.mounted_by.as_deref() {
                None => Err(VolumeError::Conflict(format!(
                    "volume {name} is not mounted"
                ))),
                Some(holder) if holder != caller => Err(VolumeError::Conflict(format!(
                    "volume {name} is mounted by {holder}"
                ))),
                Some(_) => {
                    metadata.status.mounted_by = None;
                    Ok(())
                }
            }
        })?;
        Ok(())
    }

    fn destroy(&self) -> VolumeResult<()> {
        let mut guard = self.store.write();

        if let Some(store) = guard.take() {
            if let Err(e) = store.close() {
                warn!(error = %e, "failed to close metadata store");
            }
        }

        if !self.opts.is_mock() {
            fs::unmount_remote(&self.root)?;
        }

        info!(root = %self.root.display(), "NFS backend destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    const MOCK_OPTIONS: &str =
        r#"{"address": "nfs-server.mock", "remotePath": "/exports/volumes"}"#;

    fn create_test_driver() -> (TempDir, NfsDriver) {
        let root = TempDir::new().unwrap();
        let driver = NfsDriver::new(root.path(), MOCK_OPTIONS).unwrap();
        (root, driver)
    }

    fn no_options() -> HashMap<String, String> {
        HashMap::new()
    }

    fn options(key: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(key.to_owned(), value.to_owned())])
    }

    #[test]
    fn test_parse_options_defaults() {
        let opts = NfsOptions::parse(MOCK_OPTIONS).unwrap();
        assert_eq!(opts.address, MOCK_ADDRESS);
        assert_eq!(opts.remote_path, "/exports/volumes");
        assert!(!opts.purge_after_delete);
        assert!(opts.mount_options.contains(&"nfsvers=4".to_string()));
        assert!(opts.mount_options.contains(&"tcp".to_string()));
    }

    #[test]
    fn test_parse_options_rejects_unknown_keys() {
        let err =
            NfsOptions::parse(r#"{"address": "a", "remotePath": "/x", "bogus": 1}"#).unwrap_err();
        assert!(matches!(err, VolumeError::Config(_)));
    }

    #[test]
    fn test_parse_options_requires_address() {
        let err = NfsOptions::parse(r#"{"remotePath": "/x"}"#).unwrap_err();
        assert!(matches!(err, VolumeError::Config(_)));
    }

    #[test]
    fn test_create_and_get() {
        let (root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();

        let metadata = driver.get("v1").unwrap();
        assert_eq!(metadata.mountpoint, Path::new("v1").join("_data"));
        assert!(!metadata.is_mounted());
        assert!(root.path().join("v1").join("_data").is_dir());
    }

    #[test]
    fn test_create_reserved_name_fails() {
        let (_root, driver) = create_test_driver();
        let err = driver.create("metadata.db", &no_options()).unwrap_err();
        assert!(matches!(err, VolumeError::Validation(_)));
        assert!(driver.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_existing_name_conflicts() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();

        let err = driver.create("v1", &no_options()).unwrap_err();
        assert!(matches!(err, VolumeError::Conflict(_)));
        assert_eq!(driver.list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_malformed_purge_flag() {
        let (_root, driver) = create_test_driver();
        let err = driver
            .create("v1", &options("purgeAfterDelete", "bogus"))
            .unwrap_err();
        assert!(matches!(err, VolumeError::Validation(_)));
        assert!(driver.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_unknown_option() {
        let (_root, driver) = create_test_driver();
        let err = driver.create("v1", &options("unknown", "x")).unwrap_err();
        assert!(matches!(err, VolumeError::Validation(_)));
        assert!(driver.list().unwrap().is_empty());
    }

    #[test]
    fn test_mount_sets_holder_and_returns_mountpoint() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();

        let mountpoint = driver.mount("v1", "c1").unwrap();
        assert_eq!(mountpoint, Path::new("v1").join("_data"));
        assert_eq!(
            driver.get("v1").unwrap().status.mounted_by.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn test_second_mount_conflicts_and_leaves_state() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();
        driver.mount("v1", "c1").unwrap();

        let err = driver.mount("v1", "c2").unwrap_err();
        assert!(matches!(err, VolumeError::Conflict(_)));
        assert_eq!(
            driver.get("v1").unwrap().status.mounted_by.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn test_unmount_by_non_owner_conflicts() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();
        driver.mount("v1", "c1").unwrap();

        let err = driver.unmount("v1", "c2").unwrap_err();
        assert!(matches!(err, VolumeError::Conflict(_)));
        assert_eq!(
            driver.get("v1").unwrap().status.mounted_by.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn test_unmount_clears_holder() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();
        driver.mount("v1", "c1").unwrap();

        driver.unmount("v1", "c1").unwrap();
        assert!(!driver.get("v1").unwrap().is_mounted());

        let err = driver.unmount("v1", "c1").unwrap_err();
        assert!(matches!(err, VolumeError::Conflict(_)));
    }

    #[test]
    fn test_remove_mounted_volume_conflicts() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();
        driver.mount("v1", "c1").unwrap();

        let err = driver.remove("v1").unwrap_err();
        assert!(matches!(err, VolumeError::Conflict(_)));
        assert!(driver.get("v1").is_ok());
    }

    #[test]
    fn test_remove_retains_data_without_purge() {
        let (root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();
        assert_eq!(
            driver.mount("v1", "c1").unwrap(),
            Path::new("v1").join("_data")
        );
        driver.unmount("v1", "c1").unwrap();

        driver.remove("v1").unwrap();
        assert!(matches!(
            driver.get("v1").unwrap_err(),
            VolumeError::NotFound(_)
        ));
        assert!(root.path().join("v1").is_dir());
    }

    #[test]
    fn test_remove_purges_data_when_flagged() {
        let (root, driver) = create_test_driver();
        driver
            .create("v1", &options("purgeAfterDelete", "true"))
            .unwrap();
        assert!(root.path().join("v1").join("_data").is_dir());

        driver.remove("v1").unwrap();
        assert!(!root.path().join("v1").exists());
    }

    #[test]
    fn test_backend_purge_default_applies_to_new_volumes() {
        let root = TempDir::new().unwrap();
        let opts = r#"{"address": "nfs-server.mock", "remotePath": "/x", "purgeAfterDelete": true}"#;
        let driver = NfsDriver::new(root.path(), opts).unwrap();

        driver.create("v1", &no_options()).unwrap();
        assert!(driver.get("v1").unwrap().spec.purge_after_delete);

        // Per-volume option overrides the backend default.
        driver
            .create("v2", &options("purgeAfterDelete", "false"))
            .unwrap();
        assert!(!driver.get("v2").unwrap().spec.purge_after_delete);
    }

    #[test]
    fn test_path_returns_mountpoint() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();

        assert_eq!(driver.path("v1").unwrap(), Path::new("v1").join("_data"));
        assert!(matches!(
            driver.path("ghost").unwrap_err(),
            VolumeError::NotFound(_)
        ));
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let (_root, driver) = create_test_driver();
        let driver = Arc::new(driver);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let driver = Arc::clone(&driver);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    driver.create("racy", &HashMap::new())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(VolumeError::Conflict(_))))
        );
        assert_eq!(driver.list().unwrap().len(), 1);
    }

    #[test]
    fn test_destroy_closes_store() {
        let (_root, driver) = create_test_driver();
        driver.create("v1", &no_options()).unwrap();

        driver.destroy().unwrap();
        assert!(matches!(
            driver.get("v1").unwrap_err(),
            VolumeError::Internal(_)
        ));
    }

    #[test]
    fn test_metadata_survives_driver_restart() {
        let root = TempDir::new().unwrap();
        {
            let driver = NfsDriver::new(root.path(), MOCK_OPTIONS).unwrap();
            driver.create("durable", &no_options()).unwrap();
            driver.mount("durable", "c1").unwrap();
            driver.unmount("durable", "c1").unwrap();
            driver.destroy().unwrap();
        }

        let driver = NfsDriver::new(root.path(), MOCK_OPTIONS).unwrap();
        let metadata = driver.get("durable").unwrap();
        assert_eq!(metadata.mountpoint, Path::new("durable").join("_data"));
        assert!(!metadata.is_mounted());
    }
}
