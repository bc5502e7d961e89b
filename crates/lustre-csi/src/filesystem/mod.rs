//! Filesystem operations for publishing volumes.
//!
//! This module handles:
//! - Mount point probing and corrupted-mount detection
//! - Serialized mount/unmount calls through the mount collaborator
//! - Forced cleanup of stuck mounts
//! - Sub-directory creation through a temporary internal mount

mod executor;
mod host;
mod lock;
mod mounter;
mod probe;
mod subdir;

pub use executor::{
    CLEANUP_TIMEOUT, DIR_MODE, FORCE_UNMOUNT_TIMEOUT, MountExecutor, SourceRedirect,
};
pub use host::{HostFs, LocalFs};
pub use lock::MountLock;
pub use mounter::{MountError, Mounter, NoopMounter, SystemMounter};
pub use probe::{MountState, is_corrupted_mount, probe};
pub use subdir::SubdirProvisioner;

/// Filesystem type used for internal mounts and when a request names none.
pub const LUSTRE_FS_TYPE: &str = "lustre";
