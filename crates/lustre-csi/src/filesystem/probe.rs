//! Mount point probing.

use std::io;
use std::path::Path;

use lustre_csi_common::{CsiError, CsiResult};

use super::host::HostFs;
use super::mounter::Mounter;

/// State of a path in the mount table, derived live on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Not a mount point, or the path does not exist.
    NotMounted,
    /// Mounted and its contents can be listed.
    MountedHealthy,
    /// Mounted (or assumed mounted) but unreachable, e.g. a stale handle.
    MountedCorrupted,
}

/// Whether a stat error indicates a broken mount rather than a bad path.
#[must_use]
pub fn is_corrupted_mount(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(
            libc::ENOTCONN
                | libc::ESTALE
                | libc::EIO
                | libc::EACCES
                | libc::EHOSTDOWN
                | libc::EWOULDBLOCK
        )
    )
}

/// Determine the [`MountState`] of `path`.
///
/// # Errors
///
/// Returns [`CsiError::Internal`] if the mount check fails for a reason
/// other than a missing path or a corrupted mount.
pub fn probe(mounter: &dyn Mounter, fs: &dyn HostFs, path: &Path) -> CsiResult<MountState> {
    let mounted = match mounter.is_mount_point(path) {
        Ok(mounted) => mounted,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(MountState::NotMounted),
        Err(err) if is_corrupted_mount(&err) => {
            tracing::warn!(path = %path.display(), error = %err, "Detected corrupted mount");
            return Ok(MountState::MountedCorrupted);
        }
        Err(err) => {
            return Err(CsiError::internal(format!(
                "could not check mount point {}: {err}",
                path.display()
            )));
        }
    };

    if !mounted {
        return Ok(MountState::NotMounted);
    }

    match fs.read_dir(path) {
        Ok(_) => Ok(MountState::MountedHealthy),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Mount point cannot be listed, treating as corrupted"
            );
            Ok(MountState::MountedCorrupted)
        }
    }
}
