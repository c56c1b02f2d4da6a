// Result reporting - best effort, swallowed at this boundary

use crate::coordination::traits::ResultReporter;
use crate::coordination::types::{RunId, StepOutcome, WorkerId};
use crate::observability::CoordinatorMetrics;
use crate::sink::LogEntry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Render the report text for one roster step. Always names the worker and a
/// human-readable status.
pub fn render_step_report(worker: &WorkerId, outcome: &StepOutcome, completion_timeout: Duration) -> String {
    match outcome {
        StepOutcome::Completed(text) => {
            format!("Agent: {worker}\nTask Status: {}\n{text}", outcome.status_label())
        }
        StepOutcome::TimedOut => format!(
            "Task Status: {}\nAgent: {worker}\nTimeout: >{}",
            outcome.status_label(),
            render_timeout(completion_timeout)
        ),
        StepOutcome::DelegationFailed => {
            format!("Task Status: {}\nAgent: {worker}", outcome.status_label())
        }
        StepOutcome::Errored(detail) => format!(
            "Task Status: {}\nAgent: {worker}\nException: {detail}",
            outcome.status_label()
        ),
    }
}

fn render_timeout(timeout: Duration) -> String {
    if timeout < Duration::from_secs(1) {
        format!("{}ms", timeout.as_millis())
    } else {
        format!("{}s", timeout.as_secs())
    }
}

/// Report text for a run that could not be enriched
pub fn render_system_failure(detail: &str) -> String {
    format!("System Error: {detail}")
}

pub fn tag_with_run(run_id: &RunId, text: &str) -> String {
    format!("[run {run_id}]\n{text}")
}

/// Posts reports to the log sink as `{agent, content}`
pub struct HttpSinkReporter {
    client: reqwest::Client,
    endpoint: String,
    metrics: Arc<CoordinatorMetrics>,
}

impl HttpSinkReporter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, metrics: Arc<CoordinatorMetrics>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            metrics,
        })
    }

    async fn send(&self, source_label: &str, text: &str) -> Result<(), String> {
        let entry = LogEntry::new(source_label, text);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&entry)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    "Connection refused: is the log sink running?".to_string()
                } else {
                    format!("Failed to send: {e}")
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("Sink responded with status {}", status.as_u16()))
        }
    }
}

#[async_trait]
impl ResultReporter for HttpSinkReporter {
    async fn report(&self, source_label: &str, text: &str) {
        match self.send(source_label, text).await {
            Ok(()) => {
                self.metrics.record_report(true);
                info!(source = %source_label, endpoint = %self.endpoint, "Report delivered to sink");
            }
            Err(reason) => {
                self.metrics.record_report(false);
                warn!(source = %source_label, endpoint = %self.endpoint, %reason, "Report not delivered");
            }
        }
    }
}

/// Reporter used when no sink endpoint is configured: reports only reach the log
pub struct LogOnlyReporter {
    metrics: Arc<CoordinatorMetrics>,
}

impl LogOnlyReporter {
    pub fn new(metrics: Arc<CoordinatorMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl ResultReporter for LogOnlyReporter {
    async fn report(&self, source_label: &str, text: &str) {
        self.metrics.record_report(true);
        info!(source = %source_label, report = %text, "Report");
    }
}
