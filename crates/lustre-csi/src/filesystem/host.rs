//! Host filesystem collaborator.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

/// Directory operations used while publishing and unpublishing volumes.
pub trait HostFs: Send + Sync + fmt::Debug {
    /// Create `path` and any missing parents with the given permission bits.
    /// Succeeds if the directory already exists.
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Names of a directory's entries. Entries are not stat'ed.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Read the metadata of `path` without following a final symlink.
    fn stat(&self, path: &Path) -> io::Result<()>;

    /// Whether `path` exists. Errors other than not-found are returned.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`HostFs`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl HostFs for LocalFs {
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::DirBuilder::new().recursive(true).mode(mode).create(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }

    fn stat(&self, path: &Path) -> io::Result<()> {
        fs::symlink_metadata(path).map(drop)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn create_dir_all_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a/b/c");

        LocalFs.create_dir_all(&nested, 0o775).unwrap();
        LocalFs.create_dir_all(&nested, 0o775).unwrap();

        let mode = fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o700);
    }

    #[test]
    fn read_dir_reports_entries() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("target")).unwrap();

        let entries = LocalFs.read_dir(temp.path()).unwrap();
        assert_eq!(entries, vec![OsString::from("target")]);
    }

    #[test]
    fn read_dir_does_not_stat_entries() {
        let temp = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("dangling"))
            .unwrap();

        let entries = LocalFs.read_dir(temp.path()).unwrap();
        assert_eq!(entries, vec![OsString::from("dangling")]);
    }

    #[test]
    fn stat_reports_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        LocalFs.stat(temp.path()).unwrap();

        let err = LocalFs.stat(&temp.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn exists_distinguishes_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        assert!(LocalFs.exists(temp.path()).unwrap());
        assert!(!LocalFs.exists(&temp.path().join("missing")).unwrap());
    }

    #[test]
    fn remove_dir_refuses_non_empty() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("dir");
        fs::create_dir_all(dir.join("child")).unwrap();

        assert!(LocalFs.remove_dir(&dir).is_err());
        fs::remove_dir(dir.join("child")).unwrap();
        LocalFs.remove_dir(&dir).unwrap();
        assert!(!dir.exists());
    }
}
