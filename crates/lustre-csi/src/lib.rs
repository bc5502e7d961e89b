//! # Lustre CSI node agent
//!
//! Publishes Lustre filesystems, or sub-directories of them, at target
//! paths on a node and tears them down again.
//!
//! ## Features
//!
//! - Idempotent publish driven by live mount probing
//! - Corrupted mount detection and repair
//! - Sub-directory creation through a temporary internal mount
//! - Node-wide serialization of mount syscalls
//! - Forced unmount of stuck targets
//!
//! ## Example
//!
//! ```rust,ignore
//! use lustre_csi::driver::{Driver, DriverOptions, NodeService, PublishVolumeRequest};
//!
//! let driver = Driver::new(DriverOptions::new("node-1"));
//! driver.node_publish_volume(request).await?;
//! ```

pub mod cli;
pub mod driver;
pub mod filesystem;
pub mod version;
pub mod volume;

pub use driver::{Driver, DriverOptions, IdentityService, NodeService};
pub use lustre_csi_common::{CsiError, CsiResult, ErrorCode};
pub use volume::VolumeDescriptor;
