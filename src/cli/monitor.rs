use std::{process::ExitCode, sync::Arc};

use log::{debug, error, info, warn, LevelFilter};

use crate::{
    config::{get_env_var, Config, ENV_VAR_ALERT_WEBHOOK},
    error::{Error, Result},
    format::format_path,
    lock::ProcessLock,
    logger,
    monitor::Monitor,
    notify::{Notifier, SlackNotifier},
    storage::check_buckets,
};

use super::{create_connector, MonitorArgs};

/// Exits non-zero only for setup failures. Runs that fail to upload are
/// reported and retried on the next invocation.
pub async fn main(args: MonitorArgs) -> ExitCode {
    let level = logger::log_level_from_args(args.global.verbose, args.global.quiet);

    let config = match Config::load(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            init_console_logger(level);
            error!("{err}");
            alert_from_env(&err).await;
            return ExitCode::FAILURE;
        }
    };

    match logger::init_with_file(level, config.log_dir()) {
        Ok(path) => debug!("logging to {}", format_path(&path)),
        Err(err) => {
            init_console_logger(level);
            warn!("could not log to {}: {err}", format_path(config.log_dir()));
        }
    }

    let notifier = match SlackNotifier::new(
        config.slack_log_webhook.clone(),
        config.slack_alert_webhook.clone(),
    ) {
        Ok(notifier) => Arc::new(notifier),
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let _lock = match ProcessLock::acquire(config.log_dir()) {
        Ok(lock) => {
            debug!("holding {}", format_path(lock.path()));
            lock
        }
        Err(Error::LockHeld(path)) => {
            info!(
                "another upload holds {}, nothing to do",
                format_path(&path)
            );
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match monitor(config, notifier.clone(), args.dry_run).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            notifier.alert(&err.to_string()).await;
            ExitCode::FAILURE
        }
    }
}

async fn monitor(config: Config, notifier: Arc<SlackNotifier>, dry_run: bool) -> Result<()> {
    info!("beginning monitoring directories for runs to upload");

    let connector = create_connector().await?;
    check_buckets(&connector.connect()?, config.buckets()).await?;

    let monitor = Monitor::new(config, connector, notifier);
    monitor.run_cycle(dry_run).await?;
    Ok(())
}

fn init_console_logger(level: LevelFilter) {
    if let Err(err) = logger::init(level) {
        eprintln!("could not set up logging: {err}");
    }
}

/// The config could not be read, so only the environment can name a webhook.
async fn alert_from_env(err: &Error) {
    let webhook = get_env_var(ENV_VAR_ALERT_WEBHOOK).ok().flatten();
    if webhook.is_none() {
        return;
    }

    match SlackNotifier::new(None, webhook) {
        Ok(notifier) => notifier.alert(&err.to_string()).await,
        Err(err) => error!("could not send alert: {err}"),
    }
}
