//! Node-local paths and sub-path validation.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;

use crate::error::{CsiError, CsiResult};

/// Default directory used to mount filesystem roots while creating
/// sub-directories.
pub static WORKING_MOUNT_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("LUSTRE_CSI_WORKING_MOUNT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
});

/// Returns true if `sub_path`, joined onto any base directory, stays strictly
/// inside that base.
///
/// The check is lexical: the path must be relative, must not climb above its
/// starting point through `..` at any step, and must not clean down to the
/// base itself (`""`, `"."`, `"a/.."`).
#[must_use]
pub fn is_strict_subpath(sub_path: &str) -> bool {
    let mut depth: usize = 0;

    for component in Path::new(sub_path).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    depth > 0
}

/// Lexically clean a relative sub-path: drop `.` segments and fold each `..`
/// into the segment before it.
///
/// A `..` with nothing left to fold into is kept, so an escaping path stays
/// escaping and still fails [`is_strict_subpath`]. A path that cleans down to
/// its base returns `""`.
#[must_use]
pub fn clean_subpath(sub_path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in sub_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            name => segments.push(name),
        }
    }

    segments.join("/")
}

/// Standard paths used by the node agent.
#[derive(Debug, Clone)]
pub struct NodePaths {
    /// Root under which filesystem roots are temporarily mounted.
    pub working_mount_dir: PathBuf,
}

impl NodePaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom working mount directory.
    #[must_use]
    pub fn with_working_mount_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_mount_dir: dir.into(),
        }
    }

    /// Internal mount point that mirrors `target_path` under the working
    /// mount directory.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] if the target path does not resolve to
    /// a strict sub-path of the working directory.
    pub fn internal_mount_path(&self, target_path: &Path) -> CsiResult<PathBuf> {
        let target = target_path.to_string_lossy();
        let relative = target.trim_matches('/');

        if !is_strict_subpath(relative) {
            return Err(CsiError::internal(format!(
                "invalid mount path {relative:?}"
            )));
        }

        Ok(self.working_mount_dir.join(relative))
    }

    /// Location of `sub_dir` inside the internal mount for `target_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] for an invalid target path and
    /// [`CsiError::InvalidArgument`] if `sub_dir` is not a strict sub-path.
    pub fn internal_volume_path(&self, target_path: &Path, sub_dir: &str) -> CsiResult<PathBuf> {
        let internal = self.internal_mount_path(target_path)?;

        if !is_strict_subpath(sub_dir) {
            return Err(CsiError::invalid_argument(format!(
                "sub-dir {sub_dir:?} must be strict subpath"
            )));
        }

        Ok(internal.join(clean_subpath(sub_dir)))
    }
}

impl Default for NodePaths {
    fn default() -> Self {
        Self {
            working_mount_dir: WORKING_MOUNT_DIR.clone(),
        }
    }
}
