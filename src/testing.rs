use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    inventory::FileEntry,
    notify::{CycleReport, Notifier},
    storage::{Connector, LocalStorage, SharedStorage, Storage},
};

pub const BUCKET: &str = "test-bucket";

#[derive(Debug, Default)]
struct Faults {
    fail: BTreeSet<String>,
    panic: BTreeSet<String>,
    refuse_connect: bool,
}

/// Local storage that records every transfer attempt and fails or panics
/// on selected file names.
#[derive(Debug, Clone)]
pub struct FaultyStorage {
    inner: LocalStorage,
    faults: Arc<Mutex<Faults>>,
    attempts: Arc<Mutex<Vec<PathBuf>>>,
}

impl FaultyStorage {
    pub fn new(root: &Path) -> Self {
        fs::create_dir_all(root.join(BUCKET)).unwrap();
        FaultyStorage {
            inner: LocalStorage::new(root),
            faults: Arc::default(),
            attempts: Arc::default(),
        }
    }

    pub fn fail_on(&self, name: &str) {
        self.faults.lock().unwrap().fail.insert(name.to_owned());
    }

    pub fn panic_on(&self, name: &str) {
        self.faults.lock().unwrap().panic.insert(name.to_owned());
    }

    pub fn refuse_connect(&self) {
        self.faults.lock().unwrap().refuse_connect = true;
    }

    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn take_attempts(&self) -> BTreeSet<PathBuf> {
        let attempts = std::mem::take(&mut *self.attempts.lock().unwrap());
        attempts.into_iter().collect()
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.inner.object_path(BUCKET, key)
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        self.attempts.lock().unwrap().push(path.to_owned());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        let (fail, panic) = {
            let faults = self.faults.lock().unwrap();
            (faults.fail.contains(&name), faults.panic.contains(&name))
        };

        if panic {
            panic!("injected panic for {name}");
        }

        if fail {
            return Err(Error::other(io::Error::other(format!(
                "injected failure for {name}"
            ))));
        }

        self.inner.put_file(bucket, key, path).await
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<String> {
        self.inner.head(bucket, key).await
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.inner.bucket_exists(bucket).await
    }
}

impl Connector for FaultyStorage {
    fn connect(&self) -> Result<SharedStorage> {
        if self.faults.lock().unwrap().refuse_connect {
            return Err(Error::WorkerFailed("connection refused".to_owned()));
        }

        Ok(Arc::new(self.clone()))
    }
}

/// Writes `files` (relative path, size) below `dir` and returns them as
/// inventory entries, largest first.
pub fn write_files(dir: &Path, files: &[(&str, usize)]) -> Vec<FileEntry> {
    let mut entries = files
        .iter()
        .map(|(relative, size)| {
            let path = dir.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, vec![b'x'; *size]).unwrap();
            FileEntry {
                path,
                size: *size as u64,
            }
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| b.size.cmp(&a.size));
    entries
}

/// Keeps every report and alert instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub reports: Mutex<Vec<CycleReport>>,
    pub alerts: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn report(&self, report: &CycleReport) {
        self.reports.lock().unwrap().push(report.clone());
    }

    async fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_owned());
    }
}
