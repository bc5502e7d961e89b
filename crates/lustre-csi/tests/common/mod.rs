//! Shared fakes for the node agent integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lustre_csi::driver::{Driver, DriverOptions, PublishVolumeRequest};
use lustre_csi::filesystem::{
    HostFs, LocalFs, MountError, MountExecutor, MountLock, Mounter,
};
use parking_lot::Mutex;
use tempfile::TempDir;

/// One call made against the fake mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Mount {
        source: String,
        target: PathBuf,
        fs_type: String,
        options: Vec<String>,
    },
    Unmount(PathBuf),
    ForceUnmount(PathBuf),
}

impl Call {
    pub fn target(&self) -> &Path {
        match self {
            Self::Mount { target, .. } | Self::Unmount(target) | Self::ForceUnmount(target) => {
                target
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    mounted: HashSet<PathBuf>,
    corrupted: HashSet<PathBuf>,
    fail_mounts: bool,
    unlocked_calls: usize,
}

/// Mounter that records calls and keeps an in-memory mount table.
#[derive(Debug, Default)]
pub struct FakeMounter {
    state: Mutex<State>,
    lock: Option<Arc<MountLock>>,
    mount_delay: Option<Duration>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every call made while `lock` was not held.
    pub fn observing(lock: Arc<MountLock>) -> Self {
        Self {
            lock: Some(lock),
            ..Self::default()
        }
    }

    pub fn with_mount_delay(mut self, delay: Duration) -> Self {
        self.mount_delay = Some(delay);
        self
    }

    pub fn fail_mounts(&self) {
        self.state.lock().fail_mounts = true;
    }

    pub fn mark_mounted(&self, path: &Path) {
        self.state.lock().mounted.insert(path.to_path_buf());
    }

    /// Make mount point checks on `path` fail with a stale handle.
    pub fn mark_corrupted(&self, path: &Path) {
        let mut state = self.state.lock();
        state.mounted.insert(path.to_path_buf());
        state.corrupted.insert(path.to_path_buf());
    }

    pub fn is_mounted(&self, path: &Path) -> bool {
        self.state.lock().mounted.contains(path)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mount_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Mount { .. }))
            .collect()
    }

    pub fn unlocked_calls(&self) -> usize {
        self.state.lock().unlocked_calls
    }

    fn record(&self, call: Call) {
        let locked = self.lock.as_ref().is_none_or(|lock| lock.is_locked());
        let mut state = self.state.lock();
        if !locked {
            state.unlocked_calls += 1;
        }
        state.calls.push(call);
    }

    fn release(&self, target: &Path) {
        let mut state = self.state.lock();
        state.mounted.remove(target);
        state.corrupted.remove(target);
    }
}

impl Mounter for FakeMounter {
    fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        self.record(Call::Mount {
            source: source.to_string(),
            target: target.to_path_buf(),
            fs_type: fs_type.to_string(),
            options: options.to_vec(),
        });

        if let Some(delay) = self.mount_delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if state.fail_mounts {
            return Err(MountError::HelperFailed {
                status: "exit status: 32".to_string(),
                output: "mount.lustre: mount failed".to_string(),
            });
        }
        state.mounted.insert(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        self.record(Call::Unmount(target.to_path_buf()));
        self.release(target);
        Ok(())
    }

    fn force_unmount(&self, target: &Path, _timeout: Duration) -> Result<(), MountError> {
        self.record(Call::ForceUnmount(target.to_path_buf()));
        self.release(target);
        Ok(())
    }

    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let state = self.state.lock();
        if state.corrupted.contains(path) {
            return Err(io::Error::from_raw_os_error(libc::ESTALE));
        }
        std::fs::metadata(path)?;
        Ok(state.mounted.contains(path))
    }
}

/// Local filesystem with injectable failures.
#[derive(Debug, Default)]
pub struct FakeFs {
    failing_read_dir: Mutex<HashSet<PathBuf>>,
    failing_create: Mutex<HashSet<PathBuf>>,
    failing_stat: Mutex<HashMap<PathBuf, i32>>,
    failing_exists: Mutex<HashMap<PathBuf, i32>>,
}

impl FakeFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make listing `path` fail with a stale handle.
    pub fn fail_read_dir(&self, path: &Path) {
        self.failing_read_dir.lock().insert(path.to_path_buf());
    }

    pub fn fail_create(&self, path: &Path) {
        self.failing_create.lock().insert(path.to_path_buf());
    }

    /// Make stat'ing `path` fail with `errno`.
    pub fn fail_stat(&self, path: &Path, errno: i32) {
        self.failing_stat.lock().insert(path.to_path_buf(), errno);
    }

    /// Make existence checks on `path` fail with `errno`.
    pub fn fail_exists(&self, path: &Path, errno: i32) {
        self.failing_exists.lock().insert(path.to_path_buf(), errno);
    }
}

impl HostFs for FakeFs {
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        if self.failing_create.lock().contains(path) {
            return Err(io::Error::from_raw_os_error(libc::EROFS));
        }
        LocalFs.create_dir_all(path, mode)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        if self.failing_read_dir.lock().contains(path) {
            return Err(io::Error::from_raw_os_error(libc::ESTALE));
        }
        LocalFs.read_dir(path)
    }

    fn stat(&self, path: &Path) -> io::Result<()> {
        if let Some(errno) = self.failing_stat.lock().get(path) {
            return Err(io::Error::from_raw_os_error(*errno));
        }
        LocalFs.stat(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        if let Some(errno) = self.failing_exists.lock().get(path) {
            return Err(io::Error::from_raw_os_error(*errno));
        }
        LocalFs.exists(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        LocalFs.remove_dir(path)
    }
}

/// A driver over fakes, with its scratch directory.
pub struct Harness {
    pub temp: TempDir,
    pub driver: Driver,
    pub mounter: Arc<FakeMounter>,
    pub fs: Arc<FakeFs>,
    pub lock: Arc<MountLock>,
}

impl Harness {
    pub fn new() -> Self {
        let lock = Arc::new(MountLock::default());
        Self::with_mounter(FakeMounter::observing(Arc::clone(&lock)), lock)
    }

    pub fn with_mounter(mounter: FakeMounter, lock: Arc<MountLock>) -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");
        let mounter = Arc::new(mounter);
        let fs = Arc::new(FakeFs::new());

        let options = DriverOptions::new("node-1")
            .with_working_mount_dir(temp.path().join("work"))
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1));
        let executor = MountExecutor::new(
            Arc::clone(&mounter) as Arc<dyn Mounter>,
            Arc::clone(&fs) as Arc<dyn HostFs>,
            Arc::clone(&lock),
        );

        Self {
            driver: Driver::with_executor(options, executor),
            temp,
            mounter,
            fs,
            lock,
        }
    }

    /// Kubelet-style target path for a pod.
    pub fn target(&self, pod: &str) -> PathBuf {
        self.temp
            .path()
            .join("kubelet/pods")
            .join(pod)
            .join("volumes/kubernetes.io~csi/pv/mount")
    }

    /// Internal mount path the driver derives for `target`.
    pub fn internal(&self, target: &Path) -> PathBuf {
        self.driver
            .options()
            .paths
            .internal_mount_path(target)
            .expect("valid target")
    }

    pub fn request(&self, target: &Path, context: &[(&str, &str)]) -> PublishVolumeRequest {
        let mut volume_context: HashMap<String, String> =
            HashMap::from([("mgs-ip-address".to_string(), "10.0.0.1@tcp".to_string())]);
        for (k, v) in context {
            volume_context.insert((*k).to_string(), (*v).to_string());
        }

        PublishVolumeRequest {
            volume_id: "lustrefs".to_string(),
            target_path: target.to_path_buf(),
            volume_context: Some(volume_context),
            ..PublishVolumeRequest::default()
        }
    }
}
