use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{error, info};
use serde_json::json;

use crate::error::{Error, Result};

const POST_TIMEOUT: Duration = Duration::from_secs(30);
const TITLE: &str = "*S3 Upload*";

/// Run ids reported at the end of a monitor cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }
}

/// Delivers cycle reports and setup alerts. Delivery problems are logged,
/// never returned.
#[async_trait]
pub trait Notifier: Debug + Send + Sync {
    async fn report(&self, report: &CycleReport);
    async fn alert(&self, message: &str);
}

pub type SharedNotifier = Arc<dyn Notifier + 'static>;

#[derive(Debug)]
pub struct SlackNotifier {
    http: reqwest::Client,
    log_webhook: Option<String>,
    alert_webhook: Option<String>,
}

impl SlackNotifier {
    pub fn new(log_webhook: Option<String>, alert_webhook: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
        Ok(SlackNotifier::with_client(http, log_webhook, alert_webhook))
    }

    pub fn with_client(
        http: reqwest::Client,
        log_webhook: Option<String>,
        alert_webhook: Option<String>,
    ) -> Self {
        SlackNotifier {
            http,
            log_webhook,
            alert_webhook,
        }
    }

    async fn post(&self, url: &str, message: &str) {
        info!("posting message to Slack");
        if let Err(err) = self.try_post(url, message).await {
            error!("error in post request to Slack: {err}");
        }
    }

    async fn try_post(&self, url: &str, message: &str) -> Result<()> {
        let response = self
            .http
            .post(url)
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::from(anyhow::anyhow!("status {status}: {body}")))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn report(&self, report: &CycleReport) {
        if report.is_empty() {
            return;
        }

        if report.failed.is_empty() {
            if let Some(url) = &self.log_webhook {
                self.post(url, &format_message(&report.completed, &[])).await;
            }
        } else if let Some(url) = self.alert_webhook.as_ref().or(self.log_webhook.as_ref()) {
            self.post(url, &format_message(&report.completed, &report.failed))
                .await;
        }
    }

    async fn alert(&self, message: &str) {
        if let Some(url) = &self.alert_webhook {
            let message = format!(":warning:  {TITLE}: {message}");
            self.post(url, &message).await;
        }
    }
}

pub fn format_message<S: AsRef<str>>(completed: &[S], failed: &[S]) -> String {
    let mut message = String::new();

    if !completed.is_empty() {
        message.push_str(&format!(
            ":white_check_mark:  {TITLE}: Successfully uploaded {}",
            count_runs(completed.len())
        ));
        push_run_list(&mut message, completed);
    }

    if !failed.is_empty() {
        if !message.is_empty() {
            message.push_str("\n\n");
        }

        message.push_str(&format!(
            ":x:  {TITLE}: Failed uploading {}",
            count_runs(failed.len())
        ));
        push_run_list(&mut message, failed);
    }

    message
}

fn count_runs(count: usize) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} run{suffix}")
}

fn push_run_list<S: AsRef<str>>(message: &mut String, runs: &[S]) {
    for run in runs {
        message.push_str("\n\t\t• ");
        message.push_str(run.as_ref());
    }
}
