//! Advisory lock around list-writing runs.
//!
//! Two `resolve` runs against the same data directory would race on the
//! blacklist-specific file, so the second one fails fast instead.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".pangrosan.lock";

/// Holds an exclusive lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Take the lock for `data_dir`, creating the directory if needed.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        let path = data_dir.join(LOCK_FILE);

        // create without truncate: no window between creating and locking
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another pangrosan run holds {}.\n\
                 Wait for it to finish, or remove the file if no run is active.",
                path.display()
            )
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();

        let guard = LockGuard::acquire(dir.path()).unwrap();
        assert!(guard.path().exists());
        assert!(LockGuard::acquire(dir.path()).is_err());

        drop(guard);
        assert!(LockGuard::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let _guard = LockGuard::acquire(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
