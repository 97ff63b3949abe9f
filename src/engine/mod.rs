//! Two-tier upload engine.
//!
//! The outer tier runs one worker per partition, at most `workers` at a
//! time. Each worker connects its own blob-store client and drains its
//! partition with up to `tasks_per_worker` concurrent transfers sharing that
//! client. A file moves from pending (queued in the worker) to in flight
//! (being transferred and confirmed) to either succeeded or failed.
//!
//! Results are collected in completion order and merged into maps and sets,
//! so nothing depends on the order in which transfers finish.

mod worker;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use log::{error, info};
use tokio::task::JoinError;

use crate::{
    error::Error,
    format::{format_object, format_path},
    inventory::FileEntry,
    storage::SharedConnector,
    task::BoundedJoinSet,
};

/// Where a run's files go.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    pub remote_prefix: String,
    /// Stripped from local paths to form object keys.
    pub parent_path: PathBuf,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Succeeded { path: PathBuf, object_id: String },
    Failed { path: PathBuf, error: Error },
}

/// Aggregated outcome of an upload: successes keyed by local path and the
/// paths that failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub uploaded: BTreeMap<PathBuf, String>,
    pub failed: Vec<PathBuf>,
}

impl UploadResult {
    pub fn all_failed(paths: Vec<PathBuf>) -> Self {
        UploadResult {
            uploaded: BTreeMap::new(),
            failed: paths,
        }
    }

    pub fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Succeeded { path, object_id } => {
                self.uploaded.insert(path, object_id);
            }
            UploadOutcome::Failed { path, error } => {
                error!("error uploading {}: {error}", format_path(&path));
                self.failed.push(path);
            }
        }
    }

    pub fn absorb(&mut self, other: UploadResult) {
        self.uploaded.extend(other.uploaded);
        self.failed.extend(other.failed);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Marks every expected path that has no outcome as failed.
    fn reconcile(&mut self, expected: &[PathBuf]) {
        let failed = self.failed.iter().cloned().collect::<BTreeSet<_>>();
        for path in expected {
            if !self.uploaded.contains_key(path) && !failed.contains(path) {
                error!("no upload outcome for {}, marking as failed", format_path(path));
                self.failed.push(path.clone());
            }
        }
    }
}

/// Uploads every partition and returns once all workers have finished.
/// Per-file errors and whole-worker failures both end up in `failed`.
pub async fn upload(
    connector: SharedConnector,
    partitions: Vec<Vec<FileEntry>>,
    target: UploadTarget,
    workers: usize,
    tasks_per_worker: usize,
) -> UploadResult {
    let target = Arc::new(target);
    let expected = partitions
        .iter()
        .flatten()
        .map(|file| file.path.clone())
        .collect::<Vec<_>>();

    info!(
        "uploading {} files with {} workers to {}",
        expected.len(),
        workers.min(partitions.len()),
        format_object(&target.bucket, &target.remote_prefix)
    );

    let mut pool = BoundedJoinSet::new(workers);
    let mut result = UploadResult::default();

    for (index, partition) in partitions.into_iter().enumerate() {
        let paths = partition
            .iter()
            .map(|file| file.path.clone())
            .collect::<Vec<_>>();
        let recover_paths = paths.clone();
        let connector = connector.clone();
        let target = target.clone();

        let task = async move {
            match worker::run(index, connector, target, partition, tasks_per_worker).await {
                Ok(result) => result,
                Err(err) => {
                    error!("worker {index} failed uploading {} files: {err}", paths.len());
                    UploadResult::all_failed(paths)
                }
            }
        };

        let recover = move |err: JoinError| {
            error!(
                "worker {index} failed uploading {} files due to an unhandled error: {err}",
                recover_paths.len()
            );
            UploadResult::all_failed(recover_paths)
        };

        if let Err(err) = pool.spawn_or_recover(task, recover).await {
            error!("could not start worker {index}: {err}");
        }
    }

    while let Some(joined) = pool.join_next().await {
        match joined {
            Ok(worker_result) => result.absorb(worker_result),
            Err(err) => error!("lost an upload worker: {err}"),
        }
    }

    result.reconcile(&expected);

    info!(
        "successfully uploaded {} files to {}",
        result.uploaded.len(),
        format_object(&target.bucket, &target.remote_prefix)
    );
    if result.has_failures() {
        error!(
            "{} files failed to upload and will be logged for retrying",
            result.failed.len()
        );
    }

    result
}
