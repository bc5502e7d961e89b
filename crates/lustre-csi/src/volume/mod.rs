//! Volume description derived from a request's volume ID and context.
//!
//! This module handles:
//! - Case-insensitive volume context lookup
//! - Pod and claim metadata interpolation into sub-directory paths
//! - Resolution of the server address, filesystem name and mount source

mod context;
mod descriptor;

pub use context::{PLACEHOLDERS, VolumeContext};
pub use descriptor::{DEFAULT_FS_NAME, VolumeDescriptor};

/// Context key holding the management server address.
pub const MGS_IP_ADDRESS: &str = "mgs-ip-address";

/// Context key holding the optional sub-directory to publish.
pub const SUB_DIR: &str = "sub-dir";

/// Context keys the orchestrator fills in with pod and claim metadata.
pub mod keys {
    /// Name of the consuming pod.
    pub const POD_NAME: &str = "csi.storage.k8s.io/pod.name";
    /// Namespace of the consuming pod.
    pub const POD_NAMESPACE: &str = "csi.storage.k8s.io/pod.namespace";
    /// UID of the consuming pod.
    pub const POD_UID: &str = "csi.storage.k8s.io/pod.uid";
    /// Service account of the consuming pod.
    pub const SERVICE_ACCOUNT_NAME: &str = "csi.storage.k8s.io/serviceaccount.name";
    /// Name of the bound claim.
    pub const PVC_NAME: &str = "csi.storage.k8s.io/pvc/name";
    /// Namespace of the bound claim.
    pub const PVC_NAMESPACE: &str = "csi.storage.k8s.io/pvc/namespace";
    /// Name of the persistent volume.
    pub const PV_NAME: &str = "csi.storage.k8s.io/pv/name";
}
