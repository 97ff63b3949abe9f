use std::{path, process::ExitCode, time::Instant};

use log::{error, info};

use crate::{
    discovery::{is_run_complete, is_run_dir},
    engine::{self, UploadResult, UploadTarget},
    error::{Error, Result},
    format::{format_elapsed, format_path},
    inventory::list_files,
    keys::parent_path,
    logger,
    partition::partition,
    storage::check_buckets,
};

use super::{create_connector, UploadArgs};

const NO_EXCLUSIONS: &[&str] = &[];

pub async fn main(args: UploadArgs) -> ExitCode {
    let level = logger::log_level_from_args(args.global.verbose, args.global.quiet);
    if let Err(err) = logger::init(level) {
        eprintln!("could not set up logging: {err}");
    }

    match upload(args).await {
        Ok(result) if !result.has_failures() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn upload(args: UploadArgs) -> Result<UploadResult> {
    let start = Instant::now();
    let connector = create_connector().await?;
    check_buckets(&connector.connect()?, [&args.bucket]).await?;

    let run_path = path::absolute(&args.local_path)?;
    if !is_run_dir(&run_path).await? || !is_run_complete(&run_path).await? {
        return Err(Error::NotCompletedRun(run_path));
    }

    let files = list_files(&run_path, NO_EXCLUSIONS).await?;
    let target = UploadTarget {
        bucket: args.bucket,
        remote_prefix: args.remote_path,
        parent_path: parent_path(&run_path),
    };

    let result = engine::upload(
        connector,
        partition(files, args.cores),
        target,
        args.cores,
        args.threads,
    )
    .await;

    info!(
        "finished uploading {} in {}",
        format_path(&run_path),
        format_elapsed(start.elapsed())
    );
    Ok(result)
}
