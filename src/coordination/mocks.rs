// Recording fakes for sequencer tests - no network, no clocks beyond tokio's

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::coordination::errors::{DelegationFailure, EnrichmentError, WatchError};
use crate::coordination::traits::*;
use crate::coordination::types::*;

/// Reporter that keeps every report in arrival order
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sources(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }
}

#[async_trait]
impl ResultReporter for RecordingReporter {
    async fn report(&self, source_label: &str, text: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((source_label.to_string(), text.to_string()));
    }
}

/// Enricher that always answers the same way
pub struct StaticEnricher(pub Result<String, EnrichmentError>);

impl StaticEnricher {
    pub fn ok(text: &str) -> Self {
        Self(Ok(text.to_string()))
    }
}

#[async_trait]
impl Enricher for StaticEnricher {
    async fn enrich(&self, _subject: &str, _date_hint: Option<&str>) -> Result<String, EnrichmentError> {
        self.0.clone()
    }
}

/// Delegator that hands out `task-<worker>` ids unless told a worker fails
#[derive(Debug, Default)]
pub struct ScriptedDelegator {
    pub failing: Mutex<Vec<WorkerId>>,
    pub calls: Mutex<Vec<(WorkerId, String, Value)>>,
}

impl ScriptedDelegator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, worker: &str) {
        self.failing.lock().unwrap().push(WorkerId::from(worker));
    }

    pub fn called_workers(&self) -> Vec<WorkerId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(worker, _, _)| worker.clone())
            .collect()
    }
}

pub fn task_for(worker: &str) -> TaskId {
    TaskId::new(format!("task-{worker}"))
}

#[async_trait]
impl Delegator for ScriptedDelegator {
    async fn delegate(
        &self,
        assignee: &WorkerId,
        description: &str,
        payload: Value,
    ) -> Result<Delegation, DelegationFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((assignee.clone(), description.to_string(), payload));

        if self.failing.lock().unwrap().contains(assignee) {
            return Err(DelegationFailure::Rejected {
                assignee: assignee.clone(),
                message: "scripted rejection".to_string(),
            });
        }
        Ok(Delegation::new(task_for(assignee.as_str()), assignee.clone()))
    }
}

/// Watcher that answers per task id. Unscripted ids sleep out the timeout.
#[derive(Debug, Default)]
pub struct ScriptedWatcher {
    pub answers: Mutex<HashMap<TaskId, Result<Completion, WatchError>>>,
    pub waited: Mutex<Vec<TaskId>>,
}

impl ScriptedWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self, task_id: TaskId, text: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(task_id, Ok(Completion::Completed(text.to_string())));
    }

    pub fn fail(&self, task_id: TaskId, err: WatchError) {
        self.answers.lock().unwrap().insert(task_id, Err(err));
    }
}

#[async_trait]
impl CompletionWatcher for ScriptedWatcher {
    async fn wait_for_completion(
        &self,
        task_id: &TaskId,
        _accepted: &AcceptedEvents,
        timeout: Duration,
    ) -> Result<Completion, WatchError> {
        self.waited.lock().unwrap().push(task_id.clone());
        let answer = self.answers.lock().unwrap().get(task_id).cloned();
        match answer {
            Some(answer) => answer,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Completion::TimedOut)
            }
        }
    }
}
