//! Node-wide lock over the mount subsystem.

use parking_lot::{Mutex, MutexGuard};

/// Exclusive lock serializing mount and unmount calls on this node.
///
/// Concurrent mounts through the Lustre kernel module are unsafe, so each
/// call into the [`Mounter`](super::Mounter) holds this lock for exactly the
/// duration of that call. The lock is not re-entrant: never call back into
/// the executor while holding a guard.
#[derive(Debug)]
pub struct MountLock {
    name: &'static str,
    inner: Mutex<()>,
}

impl MountLock {
    /// Create a named lock.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(()),
        }
    }

    /// Block until the lock is available.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        tracing::trace!(lock = self.name, "Acquiring mount lock");
        self.inner.lock()
    }

    /// Whether some caller currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl Default for MountLock {
    fn default() -> Self {
        Self::new("lustre-kernel-module")
    }
}
