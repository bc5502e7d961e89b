//! Mount collaborator: the calls that actually touch the kernel mount table.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

/// Errors returned by a [`Mounter`].
#[derive(Debug, Error)]
pub enum MountError {
    /// The mount helper ran and reported failure.
    #[error("mount helper exited with {status}: {output}")]
    HelperFailed {
        /// Exit status of the helper.
        status: String,
        /// Trimmed stderr of the helper.
        output: String,
    },

    /// The mount helper could not be started.
    #[error("failed to run mount helper: {0}")]
    Spawn(#[source] io::Error),

    /// A mount syscall failed.
    #[error("{operation} failed: {source}")]
    Syscall {
        /// Syscall name.
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Operations against the node's mount table.
///
/// Implementations do not retry and do not serialize; the
/// [`MountExecutor`](super::MountExecutor) holds the node mount lock around
/// every call.
pub trait Mounter: Send + Sync + fmt::Debug {
    /// Mount `source` on an existing directory `target`.
    fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError>;

    /// Unmount `target`.
    fn unmount(&self, target: &Path) -> Result<(), MountError>;

    /// Unmount `target`, forcing the unmount if a regular unmount has not
    /// returned within `timeout`. A regular unmount that fails is not forced.
    fn force_unmount(&self, target: &Path, timeout: Duration) -> Result<(), MountError>;

    /// Whether `path` is a mount point.
    ///
    /// Stat errors are returned unchanged so callers can tell a missing path
    /// from a corrupted mount.
    fn is_mount_point(&self, path: &Path) -> io::Result<bool>;
}

/// [`Mounter`] that mounts through `mount(8)` and unmounts with `umount2(2)`.
#[derive(Debug, Clone)]
pub struct SystemMounter {
    helper: PathBuf,
}

impl SystemMounter {
    /// Create a mounter that runs the `mount` helper from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            helper: PathBuf::from("mount"),
        }
    }

    /// Use a specific mount helper binary.
    #[must_use]
    pub fn with_helper(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    fn helper_args(source: &str, target: &Path, fs_type: &str, options: &[String]) -> Vec<String> {
        let mut args = Vec::with_capacity(7);
        if !fs_type.is_empty() {
            args.push("-t".to_string());
            args.push(fs_type.to_string());
        }
        if !options.is_empty() {
            args.push("-o".to_string());
            args.push(options.join(","));
        }
        args.push("--no-mtab".to_string());
        args.push(source.to_string());
        args.push(target.display().to_string());
        args
    }
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Mounter for SystemMounter {
    fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        let args = Self::helper_args(source, target, fs_type, options);
        tracing::debug!(helper = %self.helper.display(), ?args, "Running mount helper");

        let output = Command::new(&self.helper)
            .args(&args)
            .output()
            .map_err(MountError::Spawn)?;

        if !output.status.success() {
            return Err(MountError::HelperFailed {
                status: output.status.to_string(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        use rustix::mount::{UnmountFlags, unmount};

        tracing::debug!(target = %target.display(), "Unmounting filesystem");

        unmount(target, UnmountFlags::empty()).map_err(|e| MountError::Syscall {
            operation: "umount",
            source: e.into(),
        })
    }

    fn force_unmount(&self, target: &Path, timeout: Duration) -> Result<(), MountError> {
        use rustix::mount::{UnmountFlags, unmount};

        let (tx, rx) = crossbeam_channel::bounded(1);
        let path = target.to_path_buf();
        std::thread::spawn(move || {
            let _ = tx.send(unmount(&path, UnmountFlags::empty()));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                return result.map_err(|e| MountError::Syscall {
                    operation: "umount",
                    source: e.into(),
                });
            }
            Err(_) => {
                tracing::warn!(target = %target.display(), ?timeout, "Unmount timed out, forcing");
            }
        }

        unmount(target, UnmountFlags::FORCE).map_err(|e| MountError::Syscall {
            operation: "umount -f",
            source: e.into(),
        })
    }

    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let stat = rustix::fs::stat(path)?;
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let parent_stat = rustix::fs::stat(parent)?;

        if stat.st_dev != parent_stat.st_dev {
            return Ok(true);
        }

        // Bind mounts and sub-directory mounts can share the parent's device.
        let mountinfo = std::fs::read_to_string("/proc/self/mountinfo")?;
        Ok(mount_points(&mountinfo).iter().any(|m| m == path))
    }
}

/// Mount points listed in a `/proc/<pid>/mountinfo` document.
pub(crate) fn mount_points(mountinfo: &str) -> Vec<PathBuf> {
    mountinfo
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(|field| PathBuf::from(decode_mount_escape(field)))
        .collect()
}

/// Decode the octal escapes (`\040` for space) the kernel uses in mountinfo.
fn decode_mount_escape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let byte = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(byte) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// [`Mounter`] that never touches the kernel.
///
/// Mounts are only recorded in memory so that repeated publishes see the
/// target as mounted. A provisioned sub-directory is therefore created
/// directly under the working mount directory and left there. Only for
/// testing the agent on nodes without Lustre.
#[derive(Debug, Default)]
pub struct NoopMounter {
    mounted: Mutex<HashSet<PathBuf>>,
}

impl NoopMounter {
    /// Create an empty mock mounter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mounter for NoopMounter {
    fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        _options: &[String],
    ) -> Result<(), MountError> {
        tracing::warn!(
            source,
            target = %target.display(),
            fs_type,
            "Mock mount, this is only for TESTING"
        );
        self.mounted.lock().insert(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        self.mounted.lock().remove(target);
        Ok(())
    }

    fn force_unmount(&self, target: &Path, _timeout: Duration) -> Result<(), MountError> {
        self.unmount(target)
    }

    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        std::fs::metadata(path)?;
        Ok(self.mounted.lock().contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTINFO: &str = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
35 22 0:32 / /mnt/lustre rw,relatime shared:20 - lustre 10.0.0.1@tcp:/lustrefs rw,flock
36 22 0:32 /team /var/lib/kubelet/pods/p1/volumes/my\\040vol/mount rw - lustre 10.0.0.1@tcp:/lustrefs rw
";

    #[test]
    fn parses_mount_points() {
        let points = mount_points(MOUNTINFO);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], PathBuf::from("/mnt/lustre"));
        assert_eq!(
            points[2],
            PathBuf::from("/var/lib/kubelet/pods/p1/volumes/my vol/mount")
        );
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(decode_mount_escape("a\\040b"), "a b");
        assert_eq!(decode_mount_escape("tab\\011"), "tab\t");
        assert_eq!(decode_mount_escape("plain"), "plain");
        assert_eq!(decode_mount_escape("trailing\\"), "trailing\\");
    }

    #[test]
    fn helper_args_include_type_and_options() {
        let args = SystemMounter::helper_args(
            "10.0.0.1@tcp:/lustrefs",
            Path::new("/mnt/target"),
            "lustre",
            &["ro".to_string(), "flock".to_string()],
        );
        assert_eq!(
            args,
            vec![
                "-t",
                "lustre",
                "-o",
                "ro,flock",
                "--no-mtab",
                "10.0.0.1@tcp:/lustrefs",
                "/mnt/target"
            ]
        );
    }

    #[test]
    fn helper_args_skip_empty_fields() {
        let args = SystemMounter::helper_args("src", Path::new("/t"), "", &[]);
        assert_eq!(args, vec!["--no-mtab", "src", "/t"]);
    }

    #[test]
    fn noop_mounter_tracks_mounts() {
        let temp = tempfile::tempdir().unwrap();
        let mounter = NoopMounter::new();

        assert!(!mounter.is_mount_point(temp.path()).unwrap());
        mounter.mount("src", temp.path(), "lustre", &[]).unwrap();
        assert!(mounter.is_mount_point(temp.path()).unwrap());
        mounter
            .force_unmount(temp.path(), Duration::from_secs(1))
            .unwrap();
        assert!(!mounter.is_mount_point(temp.path()).unwrap());
    }

    #[test]
    fn noop_mounter_reports_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        let err = NoopMounter::new()
            .is_mount_point(&temp.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn system_mounter_sees_root_as_mount_point() {
        assert!(SystemMounter::new().is_mount_point(Path::new("/")).unwrap());
    }

    #[test]
    fn failed_unmount_is_not_forced() {
        let temp = tempfile::tempdir().unwrap();
        let err = SystemMounter::new()
            .force_unmount(temp.path(), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(
            err,
            MountError::Syscall {
                operation: "umount",
                ..
            }
        ));
    }

    #[test]
    fn system_mounter_reports_helper_failure() {
        let temp = tempfile::tempdir().unwrap();
        let err = SystemMounter::with_helper("false")
            .mount("src", temp.path(), "lustre", &[])
            .unwrap_err();
        assert!(matches!(err, MountError::HelperFailed { .. }));
    }
}
