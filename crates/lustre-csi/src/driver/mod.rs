//! Node agent driver.
//!
//! This module provides the [`Driver`] type that serves node and identity
//! requests on top of the mount orchestration engine.

mod config;
mod identity;
mod node;
mod publish;
mod stats;

use std::sync::Arc;

use lustre_csi_common::{CsiError, CsiResult};

use crate::filesystem::{
    HostFs, LocalFs, MountExecutor, MountLock, Mounter, NoopMounter, SystemMounter,
};

pub use config::{DEFAULT_DRIVER_NAME, DriverOptions};
pub use identity::{IdentityService, PluginInfo};
pub use node::{
    NodeCapability, NodeInfo, NodeService, PublishVolumeRequest, StageVolumeRequest,
    UnpublishVolumeRequest, VolumeStats, VolumeStatsRequest, VolumeUsage, mount_options,
};

/// Node agent for one node.
///
/// Cheap to clone; clones share the executor and its mount lock.
#[derive(Debug, Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

#[derive(Debug)]
struct DriverInner {
    options: DriverOptions,
    executor: MountExecutor,
}

impl Driver {
    /// Create a driver that mounts through the system mount helper, or
    /// through [`NoopMounter`] when mock mounts are enabled.
    #[must_use]
    pub fn new(options: DriverOptions) -> Self {
        let mounter: Arc<dyn Mounter> = if options.mock_mount {
            tracing::warn!("Mock mounts enabled, volumes will not be mounted");
            Arc::new(NoopMounter::new())
        } else {
            Arc::new(SystemMounter::new())
        };
        Self::with_mounter(options, mounter, Arc::new(LocalFs))
    }

    /// Create a driver over explicit collaborators.
    #[must_use]
    pub fn with_mounter(
        options: DriverOptions,
        mounter: Arc<dyn Mounter>,
        fs: Arc<dyn HostFs>,
    ) -> Self {
        let executor = MountExecutor::new(mounter, fs, Arc::new(MountLock::default()))
            .with_redirect(options.source_redirect.clone())
            .with_timeouts(options.force_unmount_timeout, options.cleanup_timeout);
        Self::with_executor(options, executor)
    }

    /// Create a driver over a prepared executor.
    #[must_use]
    pub fn with_executor(options: DriverOptions, executor: MountExecutor) -> Self {
        Self {
            inner: Arc::new(DriverInner { options, executor }),
        }
    }

    /// Driver configuration.
    #[must_use]
    pub fn options(&self) -> &DriverOptions {
        &self.inner.options
    }

    /// Mount executor shared by all requests.
    #[must_use]
    pub fn executor(&self) -> &MountExecutor {
        &self.inner.executor
    }

    /// Run a blocking core operation off the async runtime.
    ///
    /// The operation runs to completion even if the returned future is
    /// dropped; mount syscalls are not interruptible.
    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> CsiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> CsiResult<T> + Send + 'static,
    {
        let driver = self.clone();
        tokio::task::spawn_blocking(move || f(&driver))
            .await
            .map_err(|e| CsiError::internal(format!("{operation} task failed: {e}")))?
    }
}
