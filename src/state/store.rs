use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use clap::builder::styling::AnsiColor;
use log::{debug, info};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    task::spawn_blocking,
};

use crate::{
    error::{Error, Result},
    format::format_path,
    inventory::FileEntry,
};

use super::UploadState;

const UPLOADS_DIR: &str = "uploads";
const STATE_SUFFIX: &str = ".upload.log.json";
const TEMP_SUFFIX: &str = ".tmp";

/// Keeps one JSON record per run under `<log_dir>/uploads/`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(log_dir: &Path) -> Self {
        StateStore {
            dir: log_dir.join(UPLOADS_DIR),
        }
    }

    pub fn path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}{STATE_SUFFIX}"))
    }

    pub async fn read(&self, run_id: &str) -> Result<Option<UploadState>> {
        let path = self.path(run_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        debug!("reading upload state from {}", format_path(&path));
        let state: UploadState = spawn_blocking(move || serde_json::from_slice(&bytes))
            .await?
            .map_err(|err| Error::MalformedState {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        if !state.completed {
            debug!(
                "state of {run_id}: incomplete upload | total local files: {} | \
                 total uploaded files: {} | total failed upload: {}",
                state.total_local_files, state.total_uploaded_files, state.total_failed_upload,
            );
        }

        Ok(Some(state))
    }

    /// Loads the existing record (or starts a new one), folds in the latest
    /// attempt and persists the result.
    pub async fn merge_and_write(
        &self,
        run_id: &str,
        run_path: &Path,
        observed_local_files: &[FileEntry],
        uploaded: &BTreeMap<PathBuf, String>,
        failed: &[PathBuf],
    ) -> Result<UploadState> {
        let total_local_files = observed_local_files.len();
        let mut state = match self.read(run_id).await? {
            Some(state) => {
                debug!("updating existing upload state for {run_id}");
                state
            }
            None => UploadState::new(run_id, run_path, total_local_files),
        };

        state.merge(total_local_files, uploaded, failed);

        info!(
            "upload state of {run_id}: total local files: {} | total uploaded files: {} | total failed upload: {}",
            state.total_local_files, state.total_uploaded_files, state.total_failed_upload,
        );

        if state.completed {
            let style = AnsiColor::Green.on_default();
            info!("{style}all local files uploaded{style:#}, {run_id} completed uploading");
        }

        self.write(&state).await?;
        Ok(state)
    }

    /// Writes next to the target and renames over it, so readers only ever
    /// see a complete record.
    async fn write(&self, state: &UploadState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(&state.run_id);
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_path);

        let state = state.clone();
        let bytes = spawn_blocking(move || serde_json::to_vec_pretty(&state)).await??;

        let mut file = File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;
        debug!("wrote upload state to {}", format_path(&path));
        Ok(())
    }
}
