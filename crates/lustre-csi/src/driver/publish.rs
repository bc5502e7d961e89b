//! Publish and unpublish orchestration.
//!
//! Neither operation stores state: each call re-probes the target, so a
//! retried request after a crash either finds a healthy mount and returns or
//! repairs and mounts again.

use lustre_csi_common::{CsiError, CsiResult, is_strict_subpath};

use super::Driver;
use super::node::{PublishVolumeRequest, UnpublishVolumeRequest, mount_options};
use crate::filesystem::{LUSTRE_FS_TYPE, SubdirProvisioner};
use crate::volume::VolumeDescriptor;

impl Driver {
    /// Publish a volume at the request's target path.
    ///
    /// Sub-directory provisioning runs before the target is probed, so
    /// publishing an already-mounted target with a sub-directory repeats the
    /// internal mount; the target itself is mounted only once.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::InvalidArgument`] for missing request fields or a
    /// bad volume context and [`CsiError::Internal`] if provisioning or
    /// mounting fails.
    pub fn publish_volume(&self, request: &PublishVolumeRequest) -> CsiResult<()> {
        if request.volume_id.is_empty() {
            return Err(CsiError::invalid_argument("Volume ID missing in request"));
        }
        if request.target_path.as_os_str().is_empty() {
            return Err(CsiError::invalid_argument("Target path not provided"));
        }
        let Some(context) = &request.volume_context else {
            return Err(CsiError::invalid_argument("Volume context must be provided"));
        };

        let target = request.target_path.as_path();
        let volume = VolumeDescriptor::resolve(&request.volume_id, context)?;
        let (options, readonly) = mount_options(request.readonly, &request.mount_flags);

        if let Some(sub_dir) = &volume.sub_dir {
            if !is_strict_subpath(sub_dir) {
                return Err(CsiError::invalid_argument(
                    "Context sub-dir must be strict subpath",
                ));
            }

            if readonly {
                tracing::debug!(
                    volume_id = %volume.id,
                    sub_dir = %sub_dir,
                    "Not creating sub-dir on read-only volume, assuming existing path"
                );
            } else {
                tracing::debug!(volume_id = %volume.id, sub_dir = %sub_dir, "Creating sub-dir");
                SubdirProvisioner::new(self.executor(), &self.options().paths)
                    .provision(&volume, target, sub_dir, &options)?;
            }
        }

        let source = volume.publish_source();

        if self.executor().ensure_mount_point(target)? {
            tracing::info!(
                volume_id = %volume.id,
                target = %target.display(),
                "Volume is already mounted"
            );
            return Ok(());
        }

        let fs_type = if request.fs_type.is_empty() {
            LUSTRE_FS_TYPE
        } else {
            request.fs_type.as_str()
        };

        self.executor()
            .mount_or_remove_target(&source, target, fs_type, &options)?;

        tracing::info!(
            volume_id = %volume.id,
            source = %source,
            target = %target.display(),
            "Volume published"
        );
        Ok(())
    }

    /// Unpublish a volume from the request's target path.
    ///
    /// A target that no longer exists is success.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::InvalidArgument`] for missing request fields and
    /// [`CsiError::Internal`] if the target cannot be unmounted or removed.
    pub fn unpublish_volume(&self, request: &UnpublishVolumeRequest) -> CsiResult<()> {
        if request.volume_id.is_empty() {
            return Err(CsiError::invalid_argument("Volume ID missing in request"));
        }
        if request.target_path.as_os_str().is_empty() {
            return Err(CsiError::invalid_argument("Target path missing in request"));
        }

        let target = request.target_path.as_path();
        tracing::debug!(
            volume_id = %request.volume_id,
            target = %target.display(),
            "Unmounting volume"
        );

        self.executor().unmount_and_cleanup(target).map_err(|e| {
            CsiError::internal(format!(
                "failed to unmount target {:?}: {e}",
                target.display()
            ))
        })?;

        tracing::info!(
            volume_id = %request.volume_id,
            target = %target.display(),
            "Volume unpublished"
        );
        Ok(())
    }
}
