mod store;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub use self::store::StateStore;

/// Persisted resumability record for one run.
///
/// `uploaded_files` accumulates across attempts while the failure fields
/// only describe the most recent attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadState {
    pub run_id: String,
    pub run_path: PathBuf,
    pub completed: bool,
    pub total_local_files: usize,
    pub total_uploaded_files: usize,
    pub total_failed_upload: usize,
    pub failed_upload_files: Vec<PathBuf>,
    pub uploaded_files: BTreeMap<PathBuf, String>,
}

impl UploadState {
    pub fn new(run_id: &str, run_path: &Path, total_local_files: usize) -> Self {
        UploadState {
            run_id: run_id.to_owned(),
            run_path: run_path.to_owned(),
            completed: false,
            total_local_files,
            total_uploaded_files: 0,
            total_failed_upload: 0,
            failed_upload_files: vec![],
            uploaded_files: BTreeMap::new(),
        }
    }

    /// Folds one upload attempt into the record. Re-merging the same
    /// successes is a no-op because the uploaded count is taken from the
    /// merged map rather than incremented.
    pub fn merge(
        &mut self,
        total_local_files: usize,
        uploaded: &BTreeMap<PathBuf, String>,
        failed: &[PathBuf],
    ) {
        for (path, object_id) in uploaded {
            self.uploaded_files.insert(path.clone(), object_id.clone());
        }

        let failed = failed.iter().cloned().collect::<BTreeSet<_>>();

        self.total_local_files = total_local_files;
        self.total_uploaded_files = self.uploaded_files.len();
        self.failed_upload_files = failed.into_iter().collect();
        self.total_failed_upload = self.failed_upload_files.len();
        self.completed = self.is_complete();
    }

    pub fn is_complete(&self) -> bool {
        self.total_failed_upload == 0 && self.total_local_files == self.total_uploaded_files
    }

    pub fn uploaded_paths(&self) -> BTreeSet<PathBuf> {
        self.uploaded_files.keys().cloned().collect()
    }
}
