//! Error types for the volume driver core.
//!
//! Every fallible operation in the crate returns [`VolumeResult`]. The
//! [`VolumeError`] kinds map one-to-one onto the failure classes a wire
//! transport needs to distinguish when translating driver errors for a
//! container runtime.

use thiserror::Error;

/// Unified error type for volume driver operations.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// Driver-level configuration is malformed or names an unknown backend.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied name or option failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The named volume does not exist.
    #[error("volume {0} not found")]
    NotFound(String),

    /// The operation conflicts with the volume's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A host filesystem or remote mount operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The metadata database rejected an operation.
    #[error("database error: {0}")]
    Database(String),

    /// Invariant breach inside the driver itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type VolumeResult<T> = Result<T, VolumeError>;

impl From<std::io::Error> for VolumeError {
    fn from(e: std::io::Error) -> Self {
        VolumeError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_names_volume() {
        let err = VolumeError::NotFound("vol-1".into());
        assert_eq!(err.to_string(), "volume vol-1 not found");
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(VolumeError::from(io), VolumeError::Storage(_)));
    }
}
