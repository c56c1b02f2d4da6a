// Core types for the delegation coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifier of one accepted trigger (`manual-<subject>-<millis>-<seq>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Mint a run id for `subject`. The process-wide sequence keeps ids unique
    /// even when two triggers for the same subject land in the same millisecond.
    pub fn generate(subject: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let slug: String = subject
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();
        Self(format!("manual-{slug}-{millis}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id handed out by the dispatch substrate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Worker identity as it appears in the roster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal result recorded for one roster step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// A matching completion event arrived, carrying the flattened result text
    Completed(String),
    /// The completion wait elapsed without a match
    TimedOut,
    /// The substrate never handed back a task id
    DelegationFailed,
    /// The wait itself failed
    Errored(String),
}

impl StepOutcome {
    /// Human-readable status line used in reports
    pub fn status_label(&self) -> &'static str {
        match self {
            StepOutcome::Completed(_) => "Completed",
            StepOutcome::TimedOut => "Failed (Timeout)",
            StepOutcome::DelegationFailed => "Failed (Delegation)",
            StepOutcome::Errored(_) => "Failed (Error)",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }

    /// Short metric/log key
    pub fn kind(&self) -> &'static str {
        match self {
            StepOutcome::Completed(_) => "completed",
            StepOutcome::TimedOut => "timed_out",
            StepOutcome::DelegationFailed => "delegation_failed",
            StepOutcome::Errored(_) => "errored",
        }
    }
}

/// What a completion wait can resolve to without an infrastructure fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed(String),
    TimedOut,
}

impl From<Completion> for StepOutcome {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Completed(text) => StepOutcome::Completed(text),
            Completion::TimedOut => StepOutcome::TimedOut,
        }
    }
}

/// One accepted delegation. Lives only for the duration of a roster step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub task_id: TaskId,
    pub assignee: WorkerId,
    /// Observability only; completion timeouts are measured from the wait call
    pub dispatched_at: DateTime<Utc>,
}

impl Delegation {
    pub fn new(task_id: TaskId, assignee: WorkerId) -> Self {
        Self {
            task_id,
            assignee,
            dispatched_at: Utc::now(),
        }
    }
}

/// Event as delivered on the completion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub event_name: String,
    pub payload: CompletionPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub result: Value,
}

impl CompletionEvent {
    pub fn new(event_name: impl Into<String>, task_id: TaskId, result: Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload: CompletionPayload { task_id, result },
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.payload.task_id
    }

    /// Flatten the result into report text: structured results yield their
    /// `value` field, everything else its string form.
    pub fn result_text(&self) -> String {
        flatten_result(&self.payload.result)
    }
}

fn flatten_result(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        Value::Object(fields) => match fields.get("value") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => result.to_string(),
        },
        other => other.to_string(),
    }
}

/// Terminal event names accepted as "task finished". Several protocol versions
/// label the same event differently, so this is a set rather than one literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEvents(BTreeSet<String>);

pub const DEFAULT_COMPLETION_EVENTS: [&str; 2] = ["task.notification.completed", "task.complete"];

impl AcceptedEvents {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, event_name: &str) -> bool {
        self.0.contains(event_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AcceptedEvents {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_EVENTS)
    }
}
