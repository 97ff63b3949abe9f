use std::{
    env::{self, VarError},
    ffi::OsStr,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    thread::available_parallelism,
};

use log::{debug, info};
use regex::Regex;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    format::format_path,
};

pub const ENV_VAR_PROFILE: &str = "AWS_DEFAULT_PROFILE";
pub const ENV_VAR_ACCESS_KEY: &str = "AWS_ACCESS_KEY";
pub const ENV_VAR_SECRET_KEY: &str = "AWS_SECRET_KEY";
pub const ENV_VAR_LOG_WEBHOOK: &str = "SLACK_LOG_WEBHOOK";
pub const ENV_VAR_ALERT_WEBHOOK: &str = "SLACK_ALERT_WEBHOOK";

pub const DEFAULT_MAX_THREADS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub max_cores: Option<usize>,
    pub max_threads: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub slack_log_webhook: Option<String>,
    pub slack_alert_webhook: Option<String>,
    #[serde(default)]
    pub monitor: Vec<MonitorSection>,
}

/// One group of monitored directories sharing an upload destination.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    #[serde(default)]
    pub monitored_directories: Vec<PathBuf>,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub remote_path: String,
    pub run_regex: Option<String>,
    pub sample_regex: Option<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Config {
    pub async fn load(path: &Path) -> Result<Config> {
        info!("loading config from {}", format_path(path));
        let bytes = tokio::fs::read(path).await?;
        let mut config: Config = serde_json::from_slice(&bytes)?;
        config.fill_webhooks_from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Collects every problem in the config rather than stopping at the first.
    pub fn validate(&self) -> Result<()> {
        let mut errors = vec![];

        if self.max_cores == Some(0) {
            errors.push("max_cores must be a positive integer".to_owned());
        }

        if self.max_threads == Some(0) {
            errors.push("max_threads must be a positive integer".to_owned());
        }

        if self.log_dir.as_ref().map_or(true, |dir| dir.as_os_str().is_empty()) {
            errors.push("required parameter log_dir not defined".to_owned());
        }

        if self.monitor.is_empty() {
            errors.push("required parameter monitor not defined".to_owned());
        }

        for (idx, section) in self.monitor.iter().enumerate() {
            section.validate(idx, &mut errors);
        }

        if errors.is_empty() {
            debug!("config valid");
            Ok(())
        } else {
            Err(Error::InvalidConfig(errors))
        }
    }

    pub fn workers(&self) -> usize {
        self.max_cores.unwrap_or_else(default_workers)
    }

    pub fn tasks_per_worker(&self) -> usize {
        self.max_threads.unwrap_or(DEFAULT_MAX_THREADS)
    }

    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_deref().unwrap_or(Path::new("."))
    }

    pub fn buckets(&self) -> Vec<String> {
        let mut buckets = self
            .monitor
            .iter()
            .map(|section| section.bucket.clone())
            .collect::<Vec<_>>();
        buckets.sort();
        buckets.dedup();
        buckets
    }

    fn fill_webhooks_from_env(&mut self) -> Result<()> {
        if self.slack_log_webhook.is_none() {
            self.slack_log_webhook = get_env_var(ENV_VAR_LOG_WEBHOOK)?;
        }

        if self.slack_alert_webhook.is_none() {
            self.slack_alert_webhook = get_env_var(ENV_VAR_ALERT_WEBHOOK)?;
        }

        Ok(())
    }
}

impl MonitorSection {
    fn validate(&self, idx: usize, errors: &mut Vec<String>) {
        if self.monitored_directories.is_empty() {
            errors.push(format!(
                "required parameter monitored_directories missing from monitor section {idx}"
            ));
        }

        if self.bucket.is_empty() {
            errors.push(format!(
                "required parameter bucket missing from monitor section {idx}"
            ));
        }

        if self.remote_path.is_empty() {
            errors.push(format!(
                "required parameter remote_path missing from monitor section {idx}"
            ));
        }

        let patterns = self
            .run_regex
            .iter()
            .chain(self.sample_regex.iter())
            .chain(self.exclude_patterns.iter());

        for pattern in patterns {
            if let Err(err) = Regex::new(pattern) {
                errors.push(format!(
                    "invalid pattern `{pattern}` in monitor section {idx}: {err}"
                ));
            }
        }
    }
}

/// How the blob-store client authenticates. Exactly one method may be configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Profile(String),
    Keys { access_key: String, secret_key: String },
}

impl Credentials {
    pub fn from_env() -> Result<Credentials> {
        Credentials::resolve(
            get_env_var(ENV_VAR_PROFILE)?,
            get_env_var(ENV_VAR_ACCESS_KEY)?,
            get_env_var(ENV_VAR_SECRET_KEY)?,
        )
    }

    pub fn resolve(
        profile: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Credentials> {
        match (profile, access_key, secret_key) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::Credentials(format!(
                "both `{ENV_VAR_PROFILE}` and `{ENV_VAR_ACCESS_KEY}` and/or `{ENV_VAR_SECRET_KEY}` \
                 are set, only one authentication method may be used"
            ))),
            (Some(profile), None, None) => {
                info!("`{ENV_VAR_PROFILE}` is set and will be used for authentication");
                Ok(Credentials::Profile(profile))
            }
            (None, Some(access_key), Some(secret_key)) => {
                info!(
                    "`{ENV_VAR_ACCESS_KEY}` and `{ENV_VAR_SECRET_KEY}` are set and will be used for authentication"
                );
                Ok(Credentials::Keys {
                    access_key,
                    secret_key,
                })
            }
            _ => Err(Error::Credentials(format!(
                "either `{ENV_VAR_PROFILE}` or both `{ENV_VAR_ACCESS_KEY}` and `{ENV_VAR_SECRET_KEY}` must be set"
            ))),
        }
    }
}

pub fn default_workers() -> usize {
    available_parallelism().map_or(1, NonZeroUsize::get)
}

pub fn get_env_var<T: AsRef<OsStr>>(name: T) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
