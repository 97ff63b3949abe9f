use std::{path::Path, sync::Arc};

use clap::builder::styling::AnsiColor;
use log::{debug, info};
use tokio::task::JoinSet;

use crate::{
    error::{Error, Result},
    format::{format_object, format_path, format_size},
    inventory::FileEntry,
    keys::remote_key,
    storage::{SharedConnector, SharedStorage},
};

use super::{UploadOutcome, UploadResult, UploadTarget};

/// Drains one partition with up to `tasks` concurrent transfers sharing a
/// single client. An error here means the worker itself broke, not that a
/// file failed.
pub async fn run(
    index: usize,
    connector: SharedConnector,
    target: Arc<UploadTarget>,
    files: Vec<FileEntry>,
    tasks: usize,
) -> Result<UploadResult> {
    let storage = connector.connect()?;
    let task_count = tasks.clamp(1, files.len().max(1));
    info!("worker {index}: uploading {} files with {task_count} tasks", files.len());

    let (sender, receiver) = async_channel::bounded::<FileEntry>(task_count);
    let mut join_set = JoinSet::new();

    for _ in 0..task_count {
        let receiver = receiver.clone();
        let storage = storage.clone();
        let target = target.clone();

        join_set.spawn(async move {
            let mut result = UploadResult::default();
            while let Ok(file) = receiver.recv().await {
                let outcome = upload_file(&storage, &target, &file).await;
                result.record(outcome);
            }

            result
        });
    }

    drop(receiver);
    for file in files {
        sender.send(file).await?;
    }
    sender.close();

    let mut result = UploadResult::default();
    while let Some(joined) = join_set.join_next().await {
        let task_result = joined.map_err(|err| Error::WorkerFailed(err.to_string()))?;
        result.absorb(task_result);
    }

    debug!(
        "worker {index}: {} uploaded, {} failed",
        result.uploaded.len(),
        result.failed.len()
    );
    Ok(result)
}

async fn upload_file(storage: &SharedStorage, target: &UploadTarget, file: &FileEntry) -> UploadOutcome {
    let path = file.path.clone();
    match transfer(storage, target, &file.path).await {
        Ok(object_id) => {
            let formatted_path = format_path(&path);
            let formatted_size = format_size(file.size);
            let msg_style = AnsiColor::Blue.on_default();
            let size_style = AnsiColor::BrightBlack.on_default();
            debug!("{msg_style}uploaded file{msg_style:#} {formatted_path} {size_style}({formatted_size}){size_style:#} as {object_id}");
            UploadOutcome::Succeeded { path, object_id }
        }
        Err(error) => UploadOutcome::Failed { path, error },
    }
}

/// Puts the file and confirms it by reading back its object id.
async fn transfer(storage: &SharedStorage, target: &UploadTarget, path: &Path) -> Result<String> {
    let key = remote_key(path, &target.parent_path, &target.remote_prefix)?;
    debug!(
        "uploading {} to {}",
        format_path(path),
        format_object(&target.bucket, &key)
    );

    storage.put_file(&target.bucket, &key, path).await?;
    storage.head(&target.bucket, &key).await
}
