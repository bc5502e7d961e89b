//! Volume descriptor resolution.

use std::collections::HashMap;

use lustre_csi_common::{CsiError, CsiResult, clean_subpath};

use super::context::VolumeContext;
use super::{MGS_IP_ADDRESS, SUB_DIR};

/// Filesystem name used when the volume ID does not carry one.
pub const DEFAULT_FS_NAME: &str = "lustrefs";

const ID_SEPARATOR: char = '#';

/// One logical filesystem mount request, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDescriptor {
    /// Human-readable volume name, possibly empty.
    pub name: String,
    /// Volume ID as supplied by the orchestrator.
    pub id: String,
    /// Address of the management server, e.g. `10.0.0.1@tcp`.
    pub server_address: String,
    /// Name of the exported filesystem.
    pub filesystem_name: String,
    /// Interpolated and lexically cleaned sub-directory, without leading or
    /// trailing slashes.
    pub sub_dir: Option<String>,
}

impl VolumeDescriptor {
    /// Build a descriptor from a volume ID and the request's volume context.
    ///
    /// The server address and sub-directory always come from the context. The
    /// sub-directory is interpolated and then cleaned, so `a/../b` resolves to
    /// `b`; a sub-directory that escapes its base keeps its leading `..` and
    /// is rejected at publish time. A volume ID of the form
    /// `name#fsname#server[#sub-dir]` supplies the name; disagreement with
    /// the context is logged.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::InvalidArgument`] if the server address is missing
    /// or empty, or if a provided sub-directory is empty after trimming
    /// slashes.
    pub fn resolve(id: &str, raw_context: &HashMap<String, String>) -> CsiResult<Self> {
        let context = VolumeContext::new(raw_context);

        let raw_sub_dir = context.get(SUB_DIR).map(|raw| raw.trim_matches('/'));
        if raw_sub_dir.is_some_and(str::is_empty) {
            return Err(CsiError::invalid_argument(
                "Context sub-dir must not be empty or root if provided",
            ));
        }
        let sub_dir = raw_sub_dir.map(|raw| clean_subpath(&context.interpolate(raw)));

        let server_address = match context.get(MGS_IP_ADDRESS) {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => {
                return Err(CsiError::invalid_argument(
                    "Context mgs-ip-address must be provided",
                ));
            }
        };

        let from_id = Self::parse_id(id);
        let name = from_id.as_ref().map(|v| v.name.clone()).unwrap_or_default();

        let volume = Self {
            name,
            id: id.to_string(),
            server_address,
            filesystem_name: filesystem_name(id),
            sub_dir,
        };

        if let Some(from_id) = from_id {
            if !from_id.agrees_with(&volume.server_address, raw_sub_dir) {
                tracing::warn!(
                    volume_id = %id,
                    "Volume context does not match values in volume ID"
                );
            }
        }

        Ok(volume)
    }

    /// Parse a volume ID of the form `name#fsname#server[#sub-dir]`.
    ///
    /// Returns `None` if the ID has fewer than three segments.
    #[must_use]
    pub fn parse_id(id: &str) -> Option<Self> {
        let segments: Vec<&str> = id.split(ID_SEPARATOR).collect();
        if segments.len() < 3 {
            tracing::debug!(volume_id = %id, "Volume ID is not in name#fsname#server form");
            return None;
        }

        let sub_dir = segments
            .get(3)
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            name: segments[0].to_string(),
            id: id.to_string(),
            server_address: segments[2].to_string(),
            filesystem_name: DEFAULT_FS_NAME.to_string(),
            sub_dir,
        })
    }

    /// Whether an ID-derived descriptor names the same server and
    /// sub-directory as the context. The context sub-directory is compared
    /// before interpolation, as written.
    fn agrees_with(&self, server_address: &str, raw_sub_dir: Option<&str>) -> bool {
        self.server_address == server_address && self.sub_dir.as_deref() == raw_sub_dir
    }

    /// Mount source for the filesystem root.
    ///
    /// A server address without a network suffix is assumed to be on `tcp`.
    #[must_use]
    pub fn source(&self) -> String {
        let fs_name = self.filesystem_name.trim_start_matches('/');
        if self.server_address.contains('@') {
            format!("{}:/{fs_name}", self.server_address)
        } else {
            format!("{}@tcp:/{fs_name}", self.server_address)
        }
    }

    /// Mount source for the published path: the root source with the
    /// sub-directory appended.
    #[must_use]
    pub fn publish_source(&self) -> String {
        match &self.sub_dir {
            Some(sub_dir) => format!("{}/{sub_dir}", self.source()),
            None => self.source(),
        }
    }
}

/// Filesystem name encoded in a volume ID.
///
/// IDs of the form `server:/fsname[/path]` name the filesystem after the
/// `:/`; an ID that is a plain word is taken as the filesystem name itself.
fn filesystem_name(id: &str) -> String {
    if id.contains(ID_SEPARATOR) {
        return DEFAULT_FS_NAME.to_string();
    }

    if let Some((_, path)) = id.split_once(":/") {
        return path
            .split('/')
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FS_NAME)
            .to_string();
    }

    let is_word = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_word {
        id.to_string()
    } else {
        DEFAULT_FS_NAME.to_string()
    }
}
