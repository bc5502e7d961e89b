//! Driver configuration.

use std::path::PathBuf;
use std::time::Duration;

use lustre_csi_common::NodePaths;

use crate::filesystem::{CLEANUP_TIMEOUT, FORCE_UNMOUNT_TIMEOUT, SourceRedirect};

/// Name the driver registers under when none is configured.
pub const DEFAULT_DRIVER_NAME: &str = "lustre-csi.hpe.com";

/// Node agent configuration options.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Identifier of the node this agent runs on.
    pub node_id: String,
    /// Name the driver registers under.
    pub driver_name: String,
    /// Driver version reported to the orchestrator.
    pub version: String,
    /// Node-local paths.
    pub paths: NodePaths,
    /// Record mounts in memory instead of mounting. Testing only.
    pub mock_mount: bool,
    /// Optional mount source replacement.
    pub source_redirect: Option<SourceRedirect>,
    /// Timeout before unmounting an unhealthy target is forced.
    pub force_unmount_timeout: Duration,
    /// Timeout for the unmount inside a cleanup pass.
    pub cleanup_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            paths: NodePaths::new(),
            mock_mount: false,
            source_redirect: None,
            force_unmount_timeout: FORCE_UNMOUNT_TIMEOUT,
            cleanup_timeout: CLEANUP_TIMEOUT,
        }
    }
}

impl DriverOptions {
    /// Create options for the given node.
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }

    /// Set the driver name.
    #[must_use]
    pub fn with_driver_name(mut self, name: impl Into<String>) -> Self {
        self.driver_name = name.into();
        self
    }

    /// Set the working mount directory.
    #[must_use]
    pub fn with_working_mount_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths = NodePaths::with_working_mount_dir(dir);
        self
    }

    /// Enable mock mounts.
    #[must_use]
    pub const fn with_mock_mount(mut self) -> Self {
        self.mock_mount = true;
        self
    }

    /// Redirect mounts of one source to another.
    #[must_use]
    pub fn with_source_redirect(mut self, redirect: SourceRedirect) -> Self {
        self.source_redirect = Some(redirect);
        self
    }

    /// Set the unmount timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, force_unmount: Duration, cleanup: Duration) -> Self {
        self.force_unmount_timeout = force_unmount;
        self.cleanup_timeout = cleanup;
        self
    }
}
