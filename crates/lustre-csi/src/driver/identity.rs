//! Identity service.

use async_trait::async_trait;
use lustre_csi_common::{CsiError, CsiResult};
use serde::{Deserialize, Serialize};

use super::Driver;

/// Plugin name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Driver name.
    pub name: String,
    /// Driver version.
    pub vendor_version: String,
}

/// Identity service operations.
#[async_trait]
pub trait IdentityService {
    /// Name and version of the plugin.
    async fn get_plugin_info(&self) -> CsiResult<PluginInfo>;

    /// Whether the plugin is ready to serve requests.
    async fn probe(&self) -> CsiResult<bool>;
}

#[async_trait]
impl IdentityService for Driver {
    async fn get_plugin_info(&self) -> CsiResult<PluginInfo> {
        let options = self.options();
        if options.driver_name.is_empty() {
            return Err(CsiError::unavailable("Driver name not configured"));
        }
        if options.version.is_empty() {
            return Err(CsiError::unavailable("Driver is missing version"));
        }

        Ok(PluginInfo {
            name: options.driver_name.clone(),
            vendor_version: options.version.clone(),
        })
    }

    async fn probe(&self) -> CsiResult<bool> {
        Ok(true)
    }
}
