//! Host filesystem helpers for remote-export mounts.
//!
//! Wraps the mount(2)/umount(2) syscalls used to attach a backend's remote
//! export to its local mount root. Only the syscall plumbing lives here;
//! lifecycle decisions (when to mount, mock targets) belong to the
//! backends.

use std::path::Path;

use crate::errors::{VolumeError, VolumeResult};

/// Mount `address:remote_path` onto `target` as an NFS filesystem.
///
/// `options` are passed to the kernel verbatim, joined into the mount data
/// string in order.
#[cfg(target_os = "linux")]
pub fn mount_remote(
    address: &str,
    remote_path: &str,
    target: &Path,
    options: &[String],
) -> VolumeResult<()> {
    use nix::mount::{MsFlags, mount};

    let source = format!("{address}:{remote_path}");
    let data = options.join(",");

    mount(
        Some(source.as_str()),
        target,
        Some("nfs"),
        MsFlags::empty(),
        Some(data.as_str()),
    )
    .map_err(|e| {
        VolumeError::Storage(format!(
            "failed to mount {} on {}: {}",
            source,
            target.display(),
            e
        ))
    })?;

    tracing::debug!(
        source = %source,
        target = %target.display(),
        options = %data,
        "remote export mounted"
    );
    Ok(())
}

/// Detach the remote export mounted at `target`.
#[cfg(target_os = "linux")]
pub fn unmount_remote(target: &Path) -> VolumeResult<()> {
    use nix::mount::umount;

    umount(target).map_err(|e| {
        VolumeError::Storage(format!("failed to unmount {}: {}", target.display(), e))
    })?;

    tracing::debug!(target = %target.display(), "remote export unmounted");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn mount_remote(
    _address: &str,
    _remote_path: &str,
    _target: &Path,
    _options: &[String],
) -> VolumeResult<()> {
    Err(VolumeError::Storage(
        "remote filesystem mounts are only supported on Linux".to_string(),
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn unmount_remote(_target: &Path) -> VolumeResult<()> {
    Err(VolumeError::Storage(
        "remote filesystem mounts are only supported on Linux".to_string(),
    ))
}
