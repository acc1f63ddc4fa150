//! # Named Locks
//!
//! `LocalNamedLock` excludes threads of one process. `FileNamedLock` excludes
//! every process sharing the lock directory, using `fs2` exclusive file locks
//! (flock on Unix, LockFile on Windows). Both block without a timeout.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{Condvar, Mutex};

use crate::domain::errors::ClusterError;
use crate::ports::outbound::{ClusterLockGuard, NamedLock};

fn lock_failed(name: &str, err: impl std::fmt::Display) -> ClusterError {
    ClusterError::LockFailed {
        name: name.to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// IN-PROCESS LOCK
// =============================================================================

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Named lock local to this process.
#[derive(Debug, Clone, Default)]
pub struct LocalNamedLock {
    table: Arc<LockTable>,
}

struct LocalHold {
    name: String,
    table: Arc<LockTable>,
}

impl Drop for LocalHold {
    fn drop(&mut self) {
        self.table.held.lock().remove(&self.name);
        self.table.released.notify_all();
    }
}

impl LocalNamedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.table.held.lock().contains(name)
    }

    fn guard(&self, name: &str) -> ClusterLockGuard {
        let hold = LocalHold {
            name: name.to_string(),
            table: Arc::clone(&self.table),
        };
        ClusterLockGuard::new(name, Box::new(hold))
    }
}

impl NamedLock for LocalNamedLock {
    fn lock(&self, name: &str) -> Result<ClusterLockGuard, ClusterError> {
        let mut held = self.table.held.lock();
        while held.contains(name) {
            self.table.released.wait(&mut held);
        }
        held.insert(name.to_string());
        drop(held);
        Ok(self.guard(name))
    }

    fn try_lock(&self, name: &str) -> Result<Option<ClusterLockGuard>, ClusterError> {
        let mut held = self.table.held.lock();
        if !held.insert(name.to_string()) {
            return Ok(None);
        }
        drop(held);
        Ok(Some(self.guard(name)))
    }
}

// =============================================================================
// FILE LOCK
// =============================================================================

/// Named lock shared by every process that uses the same lock directory.
///
/// Each name maps to `<dir>/<name>.lock`; the holder writes its PID into the
/// file for diagnostics.
#[derive(Debug, Clone)]
pub struct FileNamedLock {
    dir: PathBuf,
}

struct FileHold {
    file: File,
}

impl Drop for FileHold {
    fn drop(&mut self) {
        // The file stays: unlinking it would let a waiter on the old inode and
        // a newcomer on a fresh one hold the "same" lock.
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileNamedLock {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ClusterError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| lock_failed(&dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.lock", safe))
    }

    /// PID recorded by the current (or last) holder.
    pub fn holder_pid(&self, name: &str) -> Option<u32> {
        fs::read_to_string(self.path_for(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn open(&self, name: &str) -> Result<File, ClusterError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.path_for(name))
            .map_err(|e| lock_failed(name, e))
    }

    fn claim(&self, name: &str, mut file: File) -> Result<ClusterLockGuard, ClusterError> {
        let stamp = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .and_then(|()| file.sync_all());
        if let Err(e) = stamp {
            let _ = FileExt::unlock(&file);
            return Err(lock_failed(name, e));
        }
        Ok(ClusterLockGuard::new(name, Box::new(FileHold { file })))
    }
}

impl NamedLock for FileNamedLock {
    fn lock(&self, name: &str) -> Result<ClusterLockGuard, ClusterError> {
        let file = self.open(name)?;
        file.lock_exclusive().map_err(|e| lock_failed(name, e))?;
        self.claim(name, file)
    }

    fn try_lock(&self, name: &str) -> Result<Option<ClusterLockGuard>, ClusterError> {
        let file = self.open(name)?;
        match file.try_lock_exclusive() {
            Ok(()) => self.claim(name, file).map(Some),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                tracing::debug!(
                    "[mv-03] Lock {} held by pid {:?}",
                    name,
                    self.holder_pid(name)
                );
                Ok(None)
            }
            Err(e) => Err(lock_failed(name, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_local_lock_excludes_and_releases() {
        let locks = LocalNamedLock::new();
        let guard = locks.lock("mv.fs.update").unwrap();
        assert_eq!(guard.name(), "mv.fs.update");
        assert!(locks.is_locked("mv.fs.update"));
        assert!(locks.try_lock("mv.fs.update").unwrap().is_none());
        assert!(locks.try_lock("other").unwrap().is_some());

        drop(guard);
        assert!(!locks.is_locked("mv.fs.update"));
        assert!(locks.try_lock("mv.fs.update").unwrap().is_some());
    }

    #[test]
    fn test_local_lock_blocks_second_holder() {
        let locks = LocalNamedLock::new();
        let guard = locks.lock("k").unwrap();
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let _guard = locks.lock("k").unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter never acquired the lock");
        waiter.join().unwrap();
    }

    #[test]
    fn test_file_lock_records_pid() {
        let dir = TempDir::new().unwrap();
        let locks = FileNamedLock::new(dir.path().join("locks")).unwrap();

        let _guard = locks.lock("mv.fs.update").unwrap();
        assert!(locks.path_for("mv.fs.update").exists());
        assert_eq!(locks.holder_pid("mv.fs.update"), Some(std::process::id()));
    }

    #[test]
    fn test_file_lock_excludes_other_handles() {
        let dir = TempDir::new().unwrap();
        let first = FileNamedLock::new(dir.path()).unwrap();
        let second = FileNamedLock::new(dir.path()).unwrap();

        let guard = first.lock("mv.fs.update").unwrap();
        assert!(second.try_lock("mv.fs.update").unwrap().is_none());

        drop(guard);
        assert!(second.try_lock("mv.fs.update").unwrap().is_some());
    }

    #[test]
    fn test_unsafe_names_are_sanitised() {
        let dir = TempDir::new().unwrap();
        let locks = FileNamedLock::new(dir.path()).unwrap();
        let path = locks.path_for("../org:lock");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.file_name().unwrap(), ".._org_lock.lock");
    }
}
