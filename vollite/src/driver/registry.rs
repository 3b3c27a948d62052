//! Name-to-constructor registry for storage backends.
//!
//! The registry holds no domain logic. It is populated once during process
//! initialization and handed by reference to whatever constructs backends;
//! registering the same kind twice is a programming error, not a runtime
//! error.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::{VolumeError, VolumeResult};

use super::{NFS_DRIVER_KIND, NfsDriver, VolumeDriver};

/// Constructor for one backend kind: mount root and options payload in,
/// ready driver out.
pub type DriverFactory = fn(&Path, &str) -> VolumeResult<Box<dyn VolumeDriver>>;

/// Maps a backend kind name to its constructor.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in backends.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(NFS_DRIVER_KIND, NfsDriver::factory);
        registry
    }

    /// Associate `kind` with `factory`.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was already registered; backends register exactly
    /// once at startup.
    pub fn register(&mut self, kind: impl Into<String>, factory: DriverFactory) {
        let kind = kind.into();
        let previous = self.factories.insert(kind.clone(), factory);
        assert!(previous.is_none(), "driver kind {kind:?} registered twice");
    }

    /// Construct a driver of `kind` rooted at `mount_root`.
    ///
    /// `options` is the backend-specific configuration payload. Unknown
    /// kinds are a configuration error.
    pub fn create(
        &self,
        kind: &str,
        mount_root: &Path,
        options: &str,
    ) -> VolumeResult<Box<dyn VolumeDriver>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| VolumeError::Config(format!("unknown driver kind {kind:?}")))?;
        factory(mount_root, options)
    }

    /// Registered backend kind names.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_registers_nfs() {
        let registry = DriverRegistry::builtin();
        assert_eq!(registry.kinds(), vec![NFS_DRIVER_KIND]);
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let registry = DriverRegistry::builtin();
        let err = registry
            .create("cephfs", Path::new("/tmp/mnt"), "{}")
            .err()
            .unwrap();
        assert!(matches!(err, VolumeError::Config(_)));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = DriverRegistry::builtin();
        registry.register(NFS_DRIVER_KIND, NfsDriver::factory);
    }

    #[test]
    fn test_create_builds_working_driver() {
        let root = TempDir::new().unwrap();
        let registry = DriverRegistry::builtin();

        let driver = registry
            .create(
                NFS_DRIVER_KIND,
                root.path(),
                r#"{"address": "nfs-server.mock", "remotePath": "/exports/volumes"}"#,
            )
            .unwrap();

        driver.create("v1", &HashMap::new()).unwrap();
        assert_eq!(driver.list().unwrap().len(), 1);
    }
}
