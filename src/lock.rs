use std::{
    fs::{self, File, OpenOptions, TryLockError},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use log::debug;

use crate::{
    error::{Error, Result},
    format::format_path,
};

const LOCK_FILE_NAME: &str = "runlift.lock";

/// Exclusive advisory lock on `<log_dir>/runlift.lock`, held until dropped.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    _file: File,
}

impl ProcessLock {
    pub fn acquire(log_dir: &Path) -> Result<ProcessLock> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(Error::LockHeld(path)),
            Err(TryLockError::Error(err)) => return Err(err.into()),
        }

        file.set_len(0)?;
        writeln!(file, "{} {}", std::process::id(), Local::now().to_rfc3339())?;
        debug!("acquired lock {}", format_path(&path));

        Ok(ProcessLock { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::ProcessLock;
    use crate::error::Error;

    #[test]
    fn second_acquire_is_refused() {
        let dir = TempDir::new().unwrap();
        let lock = ProcessLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = ProcessLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, Error::LockHeld(path) if path == lock.path()));
    }

    #[test]
    fn released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(ProcessLock::acquire(dir.path()).unwrap());
        assert!(ProcessLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn creates_missing_log_dir() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let _lock = ProcessLock::acquire(&log_dir).unwrap();
        assert!(log_dir.join("runlift.lock").exists());
    }
}
