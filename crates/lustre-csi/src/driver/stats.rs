//! Volume usage statistics.

use std::io;

use lustre_csi_common::{CsiError, CsiResult};

use super::Driver;
use super::node::{VolumeStats, VolumeStatsRequest, VolumeUsage};

impl Driver {
    /// Byte and inode usage of the filesystem backing a published path.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::InvalidArgument`] for an empty volume ID or path,
    /// [`CsiError::NotFound`] if the path does not exist, and
    /// [`CsiError::Internal`] if the filesystem cannot be queried.
    pub fn volume_stats(&self, request: &VolumeStatsRequest) -> CsiResult<VolumeStats> {
        if request.volume_id.is_empty() {
            return Err(CsiError::invalid_argument(
                "NodeGetVolumeStats volume ID was empty",
            ));
        }
        let path = request.volume_path.as_path();
        if path.as_os_str().is_empty() {
            return Err(CsiError::invalid_argument(
                "NodeGetVolumeStats volume path was empty",
            ));
        }

        if let Err(err) = std::fs::symlink_metadata(path) {
            if err.kind() == io::ErrorKind::NotFound {
                return Err(CsiError::not_found(format!(
                    "path {} does not exist",
                    path.display()
                )));
            }
            return Err(CsiError::internal(format!(
                "failed to stat file {}: {err}",
                path.display()
            )));
        }

        let stat = rustix::fs::statvfs(path).map_err(|e| {
            CsiError::internal(format!("failed to get metrics: {}", io::Error::from(e)))
        })?;

        let block_size = stat.f_frsize;
        let stats = VolumeStats {
            bytes: VolumeUsage {
                available: stat.f_bavail.saturating_mul(block_size),
                total: stat.f_blocks.saturating_mul(block_size),
                used: stat
                    .f_blocks
                    .saturating_sub(stat.f_bfree)
                    .saturating_mul(block_size),
            },
            inodes: VolumeUsage {
                available: stat.f_ffree,
                total: stat.f_files,
                used: stat.f_files.saturating_sub(stat.f_ffree),
            },
        };

        tracing::debug!(
            volume_id = %request.volume_id,
            path = %path.display(),
            ?stats,
            "Collected volume stats"
        );
        Ok(stats)
    }
}
