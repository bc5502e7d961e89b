//! Node service requests and the async service facade.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use lustre_csi_common::{CsiError, CsiResult};
use serde::{Deserialize, Serialize};

use super::Driver;

/// Request to publish a volume at a target path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishVolumeRequest {
    /// Volume ID.
    pub volume_id: String,
    /// Directory to expose the volume at.
    pub target_path: PathBuf,
    /// Volume context; `None` if the request carried none.
    pub volume_context: Option<HashMap<String, String>>,
    /// Publish read-only.
    #[serde(default)]
    pub readonly: bool,
    /// User mount flags from the volume capability.
    #[serde(default)]
    pub mount_flags: Vec<String>,
    /// Filesystem type from the volume capability; empty means Lustre.
    #[serde(default)]
    pub fs_type: String,
}

/// Request to unpublish a volume from a target path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnpublishVolumeRequest {
    /// Volume ID.
    pub volume_id: String,
    /// Directory the volume was published at.
    pub target_path: PathBuf,
}

/// Request to stage or unstage a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageVolumeRequest {
    /// Volume ID.
    pub volume_id: String,
    /// Global staging directory.
    pub staging_target_path: PathBuf,
}

/// Request for usage statistics of a published volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeStatsRequest {
    /// Volume ID.
    pub volume_id: String,
    /// Path the volume is published at.
    pub volume_path: PathBuf,
}

/// Usage in one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeUsage {
    /// Available to unprivileged users.
    pub available: u64,
    /// Total capacity.
    pub total: u64,
    /// In use.
    pub used: u64,
}

/// Volume usage in bytes and inodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Byte usage.
    pub bytes: VolumeUsage,
    /// Inode usage.
    pub inodes: VolumeUsage,
}

/// Capabilities advertised by the node service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeCapability {
    /// `NodeGetVolumeStats` is implemented.
    GetVolumeStats,
    /// A volume can be published read-write at several targets on a node.
    SingleNodeMultiWriter,
}

/// Node identity reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node ID.
    pub node_id: String,
}

/// Compute mount options and the effective read-only flag.
///
/// `ro` from the request comes first, user flags follow in order. A user
/// `ro` also makes the mount read-only and is dropped if the request already
/// added it.
#[must_use]
pub fn mount_options(readonly: bool, mount_flags: &[String]) -> (Vec<String>, bool) {
    let mut options = Vec::with_capacity(mount_flags.len() + 1);
    let mut is_readonly = readonly;

    if readonly {
        options.push("ro".to_string());
    }

    for flag in mount_flags {
        if flag == "ro" {
            is_readonly = true;
            if readonly {
                continue;
            }
        }
        options.push(flag.clone());
    }

    (options, is_readonly)
}

/// Node service operations.
#[async_trait]
pub trait NodeService {
    /// Make a volume available at a target path.
    async fn node_publish_volume(&self, request: PublishVolumeRequest) -> CsiResult<()>;

    /// Remove a volume from a target path.
    async fn node_unpublish_volume(&self, request: UnpublishVolumeRequest) -> CsiResult<()>;

    /// Stage a volume. Not supported.
    async fn node_stage_volume(&self, request: StageVolumeRequest) -> CsiResult<()>;

    /// Unstage a volume. Not supported.
    async fn node_unstage_volume(&self, request: StageVolumeRequest) -> CsiResult<()>;

    /// Expand a volume. Not supported.
    async fn node_expand_volume(&self, volume_id: String) -> CsiResult<()>;

    /// Usage statistics of a published volume.
    async fn node_get_volume_stats(&self, request: VolumeStatsRequest) -> CsiResult<VolumeStats>;

    /// Capabilities of this node service.
    async fn node_get_capabilities(&self) -> CsiResult<Vec<NodeCapability>>;

    /// Identity of this node.
    async fn node_get_info(&self) -> CsiResult<NodeInfo>;
}

#[async_trait]
impl NodeService for Driver {
    async fn node_publish_volume(&self, request: PublishVolumeRequest) -> CsiResult<()> {
        self.run_blocking("NodePublishVolume", move |driver| {
            driver.publish_volume(&request)
        })
        .await
    }

    async fn node_unpublish_volume(&self, request: UnpublishVolumeRequest) -> CsiResult<()> {
        self.run_blocking("NodeUnpublishVolume", move |driver| {
            driver.unpublish_volume(&request)
        })
        .await
    }

    // Every Lustre mount shares one device number and root, so the
    // orchestrator's "still mounted elsewhere" check on unstage fails as soon
    // as a second volume of the same cluster is staged.
    async fn node_stage_volume(&self, _request: StageVolumeRequest) -> CsiResult<()> {
        Err(CsiError::unimplemented("NodeStageVolume"))
    }

    async fn node_unstage_volume(&self, _request: StageVolumeRequest) -> CsiResult<()> {
        Err(CsiError::unimplemented("NodeUnstageVolume"))
    }

    async fn node_expand_volume(&self, _volume_id: String) -> CsiResult<()> {
        Err(CsiError::unimplemented("NodeExpandVolume"))
    }

    async fn node_get_volume_stats(&self, request: VolumeStatsRequest) -> CsiResult<VolumeStats> {
        self.run_blocking("NodeGetVolumeStats", move |driver| {
            driver.volume_stats(&request)
        })
        .await
    }

    async fn node_get_capabilities(&self) -> CsiResult<Vec<NodeCapability>> {
        Ok(vec![
            NodeCapability::GetVolumeStats,
            NodeCapability::SingleNodeMultiWriter,
        ])
    }

    async fn node_get_info(&self) -> CsiResult<NodeInfo> {
        Ok(NodeInfo {
            node_id: self.options().node_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverOptions;
    use lustre_csi_common::ErrorCode;

    fn flags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn readonly_request_puts_ro_first() {
        let (options, readonly) = mount_options(true, &flags(&["flock", "ro"]));
        assert_eq!(options, flags(&["ro", "flock"]));
        assert!(readonly);
    }

    #[test]
    fn user_ro_flag_marks_readonly() {
        let (options, readonly) = mount_options(false, &flags(&["noatime", "ro"]));
        assert_eq!(options, flags(&["noatime", "ro"]));
        assert!(readonly);
    }

    #[test]
    fn read_write_keeps_flags_in_order() {
        let (options, readonly) = mount_options(false, &flags(&["flock", "noatime"]));
        assert_eq!(options, flags(&["flock", "noatime"]));
        assert!(!readonly);
    }

    #[tokio::test]
    async fn staging_is_unimplemented() {
        let driver = Driver::new(DriverOptions::new("node-1").with_mock_mount());

        let err = driver
            .node_stage_volume(StageVolumeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unimplemented);

        let err = driver
            .node_unstage_volume(StageVolumeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unimplemented);

        let err = driver
            .node_expand_volume("vol".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unimplemented);
    }

    #[tokio::test]
    async fn reports_node_info_and_capabilities() {
        let driver = Driver::new(DriverOptions::new("node-1").with_mock_mount());

        assert_eq!(driver.node_get_info().await.unwrap().node_id, "node-1");
        let capabilities = driver.node_get_capabilities().await.unwrap();
        assert!(capabilities.contains(&NodeCapability::GetVolumeStats));
        assert!(capabilities.contains(&NodeCapability::SingleNodeMultiWriter));
    }
}
