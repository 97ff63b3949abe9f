
use std::{collections::BTreeSet, path::PathBuf, time::Instant};

use itertools::Itertools;
use log::{error, info};

use crate::{
    config::{Config, MonitorSection},
    discovery::{discover_runs, run_id, DiscoveredRuns, RunFilter},
    engine::{self, UploadTarget},
    error::Result,
    format::{format_elapsed, format_path, format_size},
    inventory::{filter_uploaded, list_files},
    keys::parent_path,
    notify::{CycleReport, SharedNotifier},
    partition::partition,
    state::StateStore,
    storage::SharedConnector,
};

/// A run picked up by discovery, with the section it was found under.
#[derive(Debug)]
struct PendingRun<'a> {
    path: PathBuf,
    uploaded: BTreeSet<PathBuf>,
    section: &'a MonitorSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Partial,
    Skipped,
}

#[derive(Debug)]
pub struct Monitor {
    config: Config,
    store: StateStore,
    connector: SharedConnector,
    notifier: SharedNotifier,
}

impl Monitor {
    pub fn new(config: Config, connector: SharedConnector, notifier: SharedNotifier) -> Self {
        let store = StateStore::new(config.log_dir());
        Monitor {
            config,
            store,
            connector,
            notifier,
        }
    }

    /// Discovers runs, uploads what each one is still missing and persists
    /// the outcome. Partial runs go before new ones. Runs are handled one
    /// at a time, so each state record has a single writer.
    pub async fn run_cycle(&self, dry_run: bool) -> Result<CycleReport> {
        let runs = self.discover().await?;
        let mut report = CycleReport::default();

        if runs.is_empty() {
            info!("no runs found to upload");
            return Ok(report);
        }

        for run in &runs {
            let id = run_id(&run.path);
            match self.upload_run(run, dry_run).await {
                Ok(RunOutcome::Completed) => report.completed.push(id),
                Ok(RunOutcome::Partial) => report.failed.push(id),
                Ok(RunOutcome::Skipped) => {}
                Err(err) => {
                    error!("failed uploading {}: {err}", format_path(&run.path));
                    report.failed.push(id);
                }
            }
        }

        info!(
            "cycle finished: {} runs completed, {} runs partially uploaded",
            report.completed.len(),
            report.failed.len()
        );

        self.notifier.report(&report).await;
        Ok(report)
    }

    async fn discover(&self) -> Result<Vec<PendingRun<'_>>> {
        let mut partial = vec![];
        let mut new = vec![];

        for section in &self.config.monitor {
            let filter = RunFilter::new(section.run_regex.as_deref(), section.sample_regex.as_deref())?;
            let mut runs = DiscoveredRuns::default();
            for root in &section.monitored_directories {
                match discover_runs(&[root], &filter, &self.store).await {
                    Ok(found) => {
                        runs.new.extend(found.new);
                        runs.partial.extend(found.partial);
                    }
                    Err(err) => error!("could not check {} for runs: {err}", format_path(root)),
                }
            }

            new.extend(runs.new.into_iter().map(|path| PendingRun {
                path,
                uploaded: BTreeSet::new(),
                section,
            }));
            partial.extend(runs.partial.into_iter().map(|(path, uploaded)| PendingRun {
                path,
                uploaded,
                section,
            }));
        }

        if !new.is_empty() {
            info!("found {} new runs to upload: {}", new.len(), run_names(&new));
        }
        if !partial.is_empty() {
            info!(
                "found {} partially uploaded runs to continue uploading: {}",
                partial.len(),
                run_names(&partial)
            );
        }

        partial.extend(new);
        Ok(partial)
    }

    async fn upload_run(&self, run: &PendingRun<'_>, dry_run: bool) -> Result<RunOutcome> {
        let start = Instant::now();
        let id = run_id(&run.path);
        let section = run.section;

        let files = list_files(&run.path, &section.exclude_patterns).await?;
        let remaining = filter_uploaded(files.clone(), &run.uploaded);
        let remaining_size = remaining.iter().map(|file| file.size).sum::<u64>();

        if dry_run {
            info!(
                "dry run: would upload {} files ({}) of {id} to {}",
                remaining.len(),
                format_size(remaining_size),
                section.bucket
            );
            return Ok(RunOutcome::Skipped);
        }

        info!(
            "uploading {} files ({}) of {id}",
            remaining.len(),
            format_size(remaining_size)
        );

        let workers = self.config.workers();
        let target = UploadTarget {
            bucket: section.bucket.clone(),
            remote_prefix: section.remote_path.clone(),
            parent_path: parent_path(&run.path),
        };
        let result = engine::upload(
            self.connector.clone(),
            partition(remaining, workers),
            target,
            workers,
            self.config.tasks_per_worker(),
        )
        .await;

        let state = self
            .store
            .merge_and_write(&id, &run.path, &files, &result.uploaded, &result.failed)
            .await?;

        info!("finished {id} in {}", format_elapsed(start.elapsed()));

        if state.completed {
            Ok(RunOutcome::Completed)
        } else {
            Ok(RunOutcome::Partial)
        }
    }
}

fn run_names(runs: &[PendingRun<'_>]) -> String {
    runs.iter().map(|run| run_id(&run.path)).join(", ")
}
