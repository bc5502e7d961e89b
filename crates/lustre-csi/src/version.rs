//! Driver version report.

use serde::{Deserialize, Serialize};

/// Version details printed by `lustre-csi-node version` and logged at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Name the driver registers under.
    #[serde(rename = "Driver Name")]
    pub driver_name: String,
    /// Driver version.
    #[serde(rename = "Driver Version")]
    pub driver_version: String,
    /// Operating system and architecture.
    #[serde(rename = "Platform")]
    pub platform: String,
}

impl VersionInfo {
    /// Version details for the named driver.
    #[must_use]
    pub fn new(driver_name: impl Into<String>) -> Self {
        Self {
            driver_name: driver_name.into(),
            driver_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self).map(|yaml| yaml.trim().to_string())
    }
}
