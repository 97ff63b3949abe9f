use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;

use crate::{error::Result, format::format_path, state::StateStore};

/// Present in every run directory.
pub const RUN_MARKER: &str = "RunInfo.xml";

/// Written once acquisition has finished; any one of them is enough.
pub const COMPLETION_MARKERS: [&str; 3] = ["CopyComplete.txt", "RTAComplete.txt", "RTAComplete.xml"];

static SAMPLESHEET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sample[-_ ]?sheet.*\.csv$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    New,
    Partial(BTreeSet<PathBuf>),
    Uploaded,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiscoveredRuns {
    pub new: Vec<PathBuf>,
    /// Partially uploaded runs and the files they have already uploaded.
    pub partial: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DiscoveredRuns {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.partial.is_empty()
    }
}

/// Optional narrowing of which runs are picked up.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Matched against the run directory name.
    pub run_name: Option<Regex>,
    /// Matched against each line of the run's samplesheet.
    pub sample: Option<Regex>,
}

impl RunFilter {
    pub fn new(run_regex: Option<&str>, sample_regex: Option<&str>) -> Result<Self> {
        Ok(RunFilter {
            run_name: run_regex.map(Regex::new).transpose()?,
            sample: sample_regex.map(Regex::new).transpose()?,
        })
    }

    async fn accepts(&self, run_dir: &Path) -> Result<bool> {
        if let Some(run_name) = &self.run_name {
            if !run_name.is_match(&run_id(run_dir)) {
                info!("{} does not match the run filter", format_path(run_dir));
                return Ok(false);
            }
        }

        if let Some(sample) = &self.sample {
            let Some(lines) = read_samplesheet(run_dir).await? else {
                return Ok(false);
            };

            if !lines.iter().any(|line| sample.is_match(line)) {
                info!(
                    "samplesheet of {} has no samples matching `{sample}`",
                    format_path(run_dir)
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// The run id is the run directory's name.
pub fn run_id(run_dir: &Path) -> String {
    run_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub async fn is_run_dir(dir: &Path) -> Result<bool> {
    let exists = fs::try_exists(dir.join(RUN_MARKER)).await?;
    Ok(exists)
}

pub async fn is_run_complete(dir: &Path) -> Result<bool> {
    for marker in COMPLETION_MARKERS {
        if fs::try_exists(dir.join(marker)).await? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Scans the immediate subdirectories of each root for completed runs that
/// still need uploading. A bad subdirectory is logged and skipped; an
/// unreadable root is an error.
pub async fn discover_runs<P: AsRef<Path>>(
    roots: &[P],
    filter: &RunFilter,
    store: &StateStore,
) -> Result<DiscoveredRuns> {
    let mut runs = DiscoveredRuns::default();

    for root in roots {
        let root = root.as_ref();
        info!("checking {} for completed runs", format_path(root));

        let mut entries = fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => continue,
                Err(err) => {
                    warn!("skipped {} ({err})", format_path(&path));
                    continue;
                }
            }

            match classify_run(&path, filter, store).await {
                Ok(Some(UploadStatus::New)) => runs.new.push(path),
                Ok(Some(UploadStatus::Partial(uploaded))) => {
                    runs.partial.insert(path, uploaded);
                }
                Ok(Some(UploadStatus::Uploaded) | None) => {}
                Err(err) => error!("skipped {} ({err})", format_path(&path)),
            }
        }
    }

    runs.new.sort();
    Ok(runs)
}

/// Returns `None` when `dir` is not a completed run or is filtered out.
pub async fn classify_run(
    dir: &Path,
    filter: &RunFilter,
    store: &StateStore,
) -> Result<Option<UploadStatus>> {
    let formatted_path = format_path(dir);

    if !is_run_dir(dir).await? {
        info!("{formatted_path} is not a run and will not be uploaded");
        return Ok(None);
    }

    if !is_run_complete(dir).await? {
        debug!("{formatted_path} has not completed and will not be uploaded");
        return Ok(None);
    }

    if !filter.accepts(dir).await? {
        return Ok(None);
    }

    let status = match store.read(&run_id(dir)).await? {
        None => {
            info!("{formatted_path} has not started uploading, will be uploaded");
            UploadStatus::New
        }
        Some(state) if state.completed => {
            info!("{formatted_path} has completed uploading and will be skipped");
            UploadStatus::Uploaded
        }
        Some(state) => {
            info!(
                "{formatted_path} has partially uploaded ({} files), will continue uploading",
                state.uploaded_files.len()
            );
            UploadStatus::Partial(state.uploaded_paths())
        }
    };

    Ok(Some(status))
}

/// Reads the samplesheet in the root of `run_dir`. Several samplesheets are
/// accepted only when their contents are identical.
pub async fn read_samplesheet(run_dir: &Path) -> Result<Option<Vec<String>>> {
    let mut names = vec![];
    let mut entries = fs::read_dir(run_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if SAMPLESHEET_REGEX.is_match(&name) {
            names.push(name);
        }
    }

    names.sort();
    let formatted_path = format_path(run_dir);
    if names.is_empty() {
        error!("no samplesheet found in {formatted_path}");
        return Ok(None);
    }

    let mut contents: Option<Vec<String>> = None;
    for name in &names {
        let text = match fs::read_to_string(run_dir.join(name)).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                error!("samplesheet {name} in {formatted_path} is not valid UTF-8");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let lines = text.lines().map(ToOwned::to_owned).collect::<Vec<_>>();
        match &contents {
            Some(previous) if *previous != lines => {
                error!(
                    "samplesheets in {formatted_path} differ, can not tell which one to use"
                );
                return Ok(None);
            }
            Some(_) => {}
            None => contents = Some(lines),
        }
    }

    debug!("using samplesheet {} in {formatted_path}", names[0]);
    Ok(contents)
}
