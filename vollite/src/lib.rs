//! # vollite — volume driver engine for container runtimes
//!
//! `vollite` implements the storage side of a container volume plugin:
//! named volumes backed by a remote filesystem export, with durable
//! metadata and strict mount-state invariants. The wire protocol that
//! exposes these operations to a container runtime lives outside this
//! crate; a transport resolves a backend kind once through the
//! [`DriverRegistry`] and forwards every subsequent lifecycle call onto
//! the resulting [`VolumeDriver`] instance.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`volume`] | Data model: [`VolumeMetadata`] with its spec/status split. |
//! | [`errors`] | [`VolumeError`] covering all failure modes. |
//! | [`db`] | SQLite-backed transactional metadata store. |
//! | [`driver`] | [`VolumeDriver`] contract, registry, NFS backend. |
//! | [`fs`] | mount(2)/umount(2) plumbing for remote exports. |
//!
//! ## Guarantees
//!
//! - Volume names are unique; the store's own on-disk files can never be
//!   used as volume names.
//! - A volume has at most one exclusive mounter; unmounting requires the
//!   holder's identifier; a mounted volume cannot be removed.
//! - Every mutation is an atomic read-validate-write transaction against
//!   the store, so a crashed process never leaves a half-applied record.

pub mod db;
pub mod driver;
pub mod errors;
pub mod fs;
pub mod volume;

// Re-export the most commonly used items at crate root for convenience.
pub use driver::{DriverFactory, DriverRegistry, NfsDriver, NfsOptions, VolumeDriver};
pub use errors::{VolumeError, VolumeResult};
pub use volume::{VolumeMetadata, VolumeSpec, VolumeStatus};
