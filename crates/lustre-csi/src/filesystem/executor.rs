//! Mount executor: serialized mount/unmount with forced cleanup.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lustre_csi_common::{CsiError, CsiResult};

use super::host::HostFs;
use super::lock::MountLock;
use super::mounter::Mounter;
use super::probe::{MountState, is_corrupted_mount, probe};

/// Timeout before a plain unmount of an unhealthy target is forced.
pub const FORCE_UNMOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the unmount inside a cleanup pass.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Permission bits for mount targets and created sub-directories.
pub const DIR_MODE: u32 = 0o775;

/// Replaces one mount source with another at mount time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRedirect {
    /// Source to replace, matched exactly.
    pub from: String,
    /// Replacement source.
    pub to: String,
    /// Filesystem type to mount the replacement with.
    pub fs_type: String,
}

/// Performs mount and unmount operations on behalf of the node service.
///
/// Every call into the [`Mounter`] that changes the mount table is made while
/// holding the shared [`MountLock`]; validation and directory handling happen
/// outside the lock.
#[derive(Debug)]
pub struct MountExecutor {
    mounter: Arc<dyn Mounter>,
    fs: Arc<dyn HostFs>,
    lock: Arc<MountLock>,
    redirect: Option<SourceRedirect>,
    force_unmount_timeout: Duration,
    cleanup_timeout: Duration,
}

impl MountExecutor {
    /// Create an executor over the given collaborators.
    pub fn new(mounter: Arc<dyn Mounter>, fs: Arc<dyn HostFs>, lock: Arc<MountLock>) -> Self {
        Self {
            mounter,
            fs,
            lock,
            redirect: None,
            force_unmount_timeout: FORCE_UNMOUNT_TIMEOUT,
            cleanup_timeout: CLEANUP_TIMEOUT,
        }
    }

    /// Set the source redirect applied to every mount.
    #[must_use]
    pub fn with_redirect(mut self, redirect: Option<SourceRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    /// Override the unmount timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, force_unmount: Duration, cleanup: Duration) -> Self {
        self.force_unmount_timeout = force_unmount;
        self.cleanup_timeout = cleanup;
        self
    }

    /// The host filesystem collaborator.
    #[must_use]
    pub fn host_fs(&self) -> &dyn HostFs {
        self.fs.as_ref()
    }

    /// Current [`MountState`] of `path`.
    ///
    /// # Errors
    ///
    /// See [`probe`].
    pub fn probe(&self, path: &Path) -> CsiResult<MountState> {
        probe(self.mounter.as_ref(), self.fs.as_ref(), path)
    }

    /// Prepare `target` for a mount.
    ///
    /// Returns `true` if `target` is already a healthy mount point. A
    /// corrupted mount is unmounted first; in every other case the directory
    /// is created and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] if probing, unmounting, or creating the
    /// directory fails.
    pub fn ensure_mount_point(&self, target: &Path) -> CsiResult<bool> {
        match self.probe(target)? {
            MountState::MountedHealthy => {
                tracing::debug!(target = %target.display(), "Already mounted");
                return Ok(true);
            }
            MountState::MountedCorrupted => {
                tracing::warn!(target = %target.display(), "Unmounting corrupted mount before remount");
                self.unmount(target)?;
            }
            MountState::NotMounted => {}
        }

        self.make_dir(target)?;
        Ok(false)
    }

    /// Mount `source` on `target`, creating `target` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] naming source and target if the
    /// directory cannot be created or the mount fails.
    pub fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> CsiResult<()> {
        self.make_dir(target)?;

        let (source, fs_type) = match &self.redirect {
            Some(redirect) if redirect.from == source => {
                tracing::warn!(
                    from = %redirect.from,
                    to = %redirect.to,
                    fs_type = %redirect.fs_type,
                    "Redirecting mount source"
                );
                (redirect.to.as_str(), redirect.fs_type.as_str())
            }
            _ => (source, fs_type),
        };

        tracing::debug!(
            source,
            target = %target.display(),
            fs_type,
            ?options,
            "Mounting filesystem"
        );

        let _guard = self.lock.acquire();
        self.mounter
            .mount(source, target, fs_type, options)
            .map_err(|e| {
                CsiError::internal(format!(
                    "Could not mount {source:?} at {:?}: {e}",
                    target.display()
                ))
            })
    }

    /// Mount like [`mount`](Self::mount), removing `target` if the mount
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the mount error, or, if removing `target` also fails, an error
    /// reporting the removal failure together with the mount failure.
    pub fn mount_or_remove_target(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> CsiResult<()> {
        let Err(mount_err) = self.mount(source, target, fs_type, options) else {
            return Ok(());
        };

        if let Err(remove_err) = self.fs.remove_dir(target) {
            return Err(CsiError::internal(format!(
                "Could not remove mount target {:?}: {remove_err} (after: {mount_err})",
                target.display()
            )));
        }

        Err(mount_err)
    }

    /// Unmount `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] if the unmount fails.
    pub fn unmount(&self, target: &Path) -> CsiResult<()> {
        let _guard = self.lock.acquire();
        self.mounter.unmount(target).map_err(|e| {
            CsiError::internal(format!("Unmount of {:?} failed: {e}", target.display()))
        })
    }

    /// Unmount `target`, forcing it after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] if even the forced unmount fails.
    pub fn force_unmount(&self, target: &Path, timeout: Duration) -> CsiResult<()> {
        let _guard = self.lock.acquire();
        self.mounter.force_unmount(target, timeout).map_err(|e| {
            CsiError::internal(format!(
                "Forced unmount of {:?} failed: {e}",
                target.display()
            ))
        })
    }

    /// Unmount `target` if it is a mount point, then remove the directory.
    ///
    /// A missing `target` is success.
    ///
    /// # Errors
    ///
    /// Returns [`CsiError::Internal`] if the path cannot be checked,
    /// unmounted, or removed, and [`CsiError::FailedPrecondition`] if it is
    /// still mounted after a successful unmount.
    pub fn cleanup_with_force(&self, target: &Path) -> CsiResult<()> {
        match self.fs.exists(target) {
            Ok(false) => {
                tracing::debug!(target = %target.display(), "Cleanup target already removed");
                return Ok(());
            }
            Ok(true) => {}
            Err(err) if is_corrupted_mount(&err) => {
                tracing::warn!(target = %target.display(), error = %err, "Cleaning up corrupted mount");
                self.force_unmount(target, self.cleanup_timeout)?;
                return self.remove_dir(target);
            }
            Err(err) => {
                return Err(CsiError::internal(format!(
                    "failed to stat {:?}: {err}",
                    target.display()
                )));
            }
        }

        if self.is_mount_point_for_cleanup(target)? {
            self.force_unmount(target, self.cleanup_timeout)?;
            if self.is_mount_point_for_cleanup(target)? {
                return Err(CsiError::failed_precondition(format!(
                    "{:?} is still mounted after unmount",
                    target.display()
                )));
            }
        }

        self.remove_dir(target)
    }

    /// Tear down a published target.
    ///
    /// If the target's entry in its parent directory cannot be listed or
    /// stat'ed, a plain cleanup would trip over the stale entry, so the path
    /// is force-unmounted first.
    ///
    /// # Errors
    ///
    /// Returns the error of the final [`cleanup_with_force`](Self::cleanup_with_force).
    pub fn unmount_and_cleanup(&self, target: &Path) -> CsiResult<()> {
        if !self.parent_entry_is_healthy(target) {
            tracing::debug!(target = %target.display(), "Unmounting bad mount before cleanup");
            if let Err(err) = self.force_unmount(target, self.force_unmount_timeout) {
                tracing::warn!(target = %target.display(), error = %err, "Couldn't unmount");
            }
        }

        self.cleanup_with_force(target)
    }

    fn parent_entry_is_healthy(&self, target: &Path) -> bool {
        let Some(parent) = target.parent() else {
            return true;
        };

        tracing::debug!(parent = %parent.display(), "Listing dir");
        let entries = match self.fs.read_dir(parent) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    parent = %parent.display(),
                    target = %target.display(),
                    error = %err,
                    "Could not list directory, will explicitly unmount path before cleanup"
                );
                return false;
            }
        };

        let Some(name) = target.file_name() else {
            return true;
        };
        if !entries.iter().any(|entry| entry == name) {
            return true;
        }

        if let Err(err) = self.fs.stat(target) {
            tracing::warn!(
                target = %target.display(),
                error = %err,
                "Could not get info for entry, will explicitly unmount path before cleanup"
            );
            return false;
        }

        true
    }

    fn is_mount_point_for_cleanup(&self, target: &Path) -> CsiResult<bool> {
        match self.mounter.is_mount_point(target) {
            Ok(mounted) => Ok(mounted),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) if is_corrupted_mount(&err) => Ok(true),
            Err(err) => Err(CsiError::internal(format!(
                "could not check mount point {:?}: {err}",
                target.display()
            ))),
        }
    }

    fn make_dir(&self, target: &Path) -> CsiResult<()> {
        self.fs.create_dir_all(target, DIR_MODE).map_err(|e| {
            tracing::error!(target = %target.display(), error = %e, "MakeDir failed on target");
            CsiError::internal(format!(
                "could not create mount target {:?}: {e}",
                target.display()
            ))
        })
    }

    fn remove_dir(&self, target: &Path) -> CsiResult<()> {
        match self.fs.remove_dir(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CsiError::internal(format!(
                "failed to remove {:?}: {err}",
                target.display()
            ))),
        }
    }
}
