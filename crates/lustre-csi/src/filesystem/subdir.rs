//! Sub-directory creation through a temporary internal mount.

use std::path::{Path, PathBuf};

use lustre_csi_common::{CsiError, CsiResult, NodePaths};

use super::LUSTRE_FS_TYPE;
use super::executor::{DIR_MODE, MountExecutor};
use crate::volume::VolumeDescriptor;

/// Creates a volume's sub-directory before the sub-tree is published.
///
/// The filesystem root is mounted under the working mount directory at a
/// path mirroring the publish target, the sub-directory is created inside
/// it, and the internal mount is torn down again on every exit path.
#[derive(Debug)]
pub struct SubdirProvisioner<'a> {
    executor: &'a MountExecutor,
    paths: &'a NodePaths,
}

impl<'a> SubdirProvisioner<'a> {
    /// Create a provisioner.
    #[must_use]
    pub const fn new(executor: &'a MountExecutor, paths: &'a NodePaths) -> Self {
        Self { executor, paths }
    }

    /// Make sure `sub_dir` exists inside `volume`'s filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::InvalidArgument`] if `sub_dir` is not a strict
    /// sub-path, and [`CsiError::Internal`] if the internal mount or the
    /// directory creation fails. Failing to tear down the internal mount is
    /// only logged.
    pub fn provision(
        &self,
        volume: &VolumeDescriptor,
        target: &Path,
        sub_dir: &str,
        options: &[String],
    ) -> CsiResult<()> {
        let internal = self.paths.internal_mount_path(target)?;
        let volume_path = self.paths.internal_volume_path(target, sub_dir)?;

        tracing::debug!(
            volume_id = %volume.id,
            internal = %internal.display(),
            sub_dir,
            "Provisioning sub-directory"
        );

        let _mount = self.mount_internal(volume, &internal, options)?;

        self.executor
            .host_fs()
            .create_dir_all(&volume_path, DIR_MODE)
            .map_err(|e| CsiError::internal(format!("failed to make subdirectory: {e}")))?;

        tracing::debug!(path = %volume_path.display(), "Sub-directory ready");
        Ok(())
    }

    fn mount_internal(
        &self,
        volume: &VolumeDescriptor,
        internal: &Path,
        options: &[String],
    ) -> CsiResult<InternalMount<'a>> {
        if self.executor.ensure_mount_point(internal)? {
            tracing::warn!(
                internal = %internal.display(),
                "Internal mount path is already mounted, unmounting stale mount"
            );
            self.executor.cleanup_with_force(internal).map_err(|e| {
                CsiError::internal(format!(
                    "Could not unmount existing volume at {:?}: {e}",
                    internal.display()
                ))
            })?;
        }

        self.executor
            .mount_or_remove_target(&volume.source(), internal, LUSTRE_FS_TYPE, options)?;

        Ok(InternalMount {
            executor: self.executor,
            path: internal.to_path_buf(),
        })
    }
}

/// Tears down the internal mount when dropped.
struct InternalMount<'a> {
    executor: &'a MountExecutor,
    path: PathBuf,
}

impl Drop for InternalMount<'_> {
    fn drop(&mut self) {
        tracing::debug!(internal = %self.path.display(), "Cleaning up internal mount");
        if let Err(err) = self.executor.cleanup_with_force(&self.path) {
            tracing::warn!(
                internal = %self.path.display(),
                error = %err,
                "Failed to clean up internal mount"
            );
        }
    }
}
