mod monitor;
mod upload;

use std::{ops::RangeInclusive, path::PathBuf, process::ExitCode, sync::Arc};

use clap::{
    builder::{styling::AnsiColor, Styles},
    ArgAction, Args, Parser, Subcommand,
};
use log::info;

use crate::{
    config::{default_workers, get_env_var, Credentials},
    error::Result,
    format::format_path,
    storage::{LocalStorage, S3Connector, SharedConnector},
};

const ENV_VAR_LOCAL_STORAGE: &str = "RUNLIFT_LOCAL_STORAGE";

const TASK_COUNT_RANGE: RangeInclusive<usize> = 1..=1024;
const DEFAULT_THREADS: usize = 8;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, propagate_version = true, styles = cli_styles())]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a single completed run directory
    Upload(UploadArgs),
    /// Upload every completed run found in the configured directories
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Run directory to upload
    #[arg(long, value_name = "DIR")]
    pub local_path: PathBuf,

    /// Bucket to upload to
    #[arg(long)]
    pub bucket: String,

    /// Path in the bucket to upload the run directory into
    #[arg(long, value_name = "PATH", default_value = "/")]
    pub remote_path: String,

    /// Number of parallel upload workers
    #[arg(
        long,
        value_name = "NUM",
        default_value_t = default_workers(),
        value_parser = parse_task_count,
    )]
    pub cores: usize,

    /// Number of concurrent transfers per worker
    #[arg(
        long,
        value_name = "NUM",
        default_value_t = DEFAULT_THREADS,
        value_parser = parse_task_count,
    )]
    pub threads: usize,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// JSON config listing the directories to monitor
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Show runs that would be uploaded without uploading them
    #[arg(short = 'n', long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(short, long, action = ArgAction::Count, group = "verbosity")]
    pub verbose: u8,

    #[arg(short, long, action = ArgAction::Count, group = "verbosity")]
    pub quiet: u8,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Upload(args) => upload::main(args).await,
        Command::Monitor(args) => monitor::main(args).await,
    }
}

/// Objects go to S3 unless `RUNLIFT_LOCAL_STORAGE` names a directory to
/// keep them in, one subdirectory per bucket.
async fn create_connector() -> Result<SharedConnector> {
    let local = get_env_var(ENV_VAR_LOCAL_STORAGE)?.map(PathBuf::from);
    connector_for(local).await
}

async fn connector_for(local: Option<PathBuf>) -> Result<SharedConnector> {
    match local {
        Some(root) => {
            info!("storing objects under {} instead of S3", format_path(&root));
            Ok(Arc::new(LocalStorage::new(root)))
        }
        None => {
            let credentials = Credentials::from_env()?;
            Ok(Arc::new(S3Connector::new(&credentials).await))
        }
    }
}

fn parse_task_count(s: &str) -> std::result::Result<usize, String> {
    let value: usize = s.parse().map_err(|_| "invalid numeric value")?;
    if TASK_COUNT_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "{value} is not in range {}-{}",
            TASK_COUNT_RANGE.start(),
            TASK_COUNT_RANGE.end()
        ))
    }
}

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightMagenta.on_default())
        .usage(AnsiColor::BrightMagenta.on_default())
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightCyan.on_default())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::{CommandFactory, Parser};
    use tempfile::TempDir;

    use super::{connector_for, Cli, Command};

    #[test]
    fn cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn upload_defaults() {
        let cli = Cli::try_parse_from([
            "runlift",
            "upload",
            "--local-path",
            "/seq/run1",
            "--bucket",
            "bucket",
        ])
        .unwrap();

        let Command::Upload(args) = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(args.remote_path, "/");
        assert_eq!(args.threads, 8);
        assert!(args.cores >= 1);
    }

    #[test]
    fn monitor_dry_run() {
        let cli =
            Cli::try_parse_from(["runlift", "monitor", "--config", "c.json", "-n", "-v"]).unwrap();

        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert!(args.dry_run);
        assert_eq!(args.global.verbose, 1);
    }

    #[test]
    fn zero_cores_rejected() {
        let result = Cli::try_parse_from([
            "runlift",
            "upload",
            "--local-path",
            "/seq/run1",
            "--bucket",
            "bucket",
            "--cores",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn local_storage_connector() {
        let dir = TempDir::new().unwrap();
        let storage = connector_for(Some(dir.path().to_owned()))
            .await
            .unwrap()
            .connect()
            .unwrap();

        assert!(!storage.bucket_exists("runs").await.unwrap());
        fs::create_dir(dir.path().join("runs")).unwrap();
        assert!(storage.bucket_exists("runs").await.unwrap());
    }
}
