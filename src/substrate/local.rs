//! In-process dispatch substrate.
//!
//! Each registered `Worker` runs on its own tokio task; when it finishes, its
//! result is published to the `EventHub` the sequencer's waits listen on.

use crate::coordination::delegation::{DispatchClient, DispatchRequest, DispatchResponse};
use crate::coordination::errors::DispatchError;
use crate::coordination::types::{CompletionEvent, TaskId, WorkerId};
use crate::coordination::watcher::EventHub;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub const LOCAL_COMPLETION_EVENT: &str = "task.complete";
pub const LOCAL_FAILURE_EVENT: &str = "task.failed";

/// Unit of work as seen by a worker
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedTask {
    pub task_id: TaskId,
    pub assignee: WorkerId,
    pub description: String,
    pub payload: Value,
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn perform(&self, task: &AssignedTask) -> anyhow::Result<Value>;
}

pub struct LocalDispatcher {
    workers: HashMap<WorkerId, Arc<dyn Worker>>,
    hub: EventHub,
    completion_event: String,
}

impl LocalDispatcher {
    pub fn new(hub: EventHub) -> Self {
        Self {
            workers: HashMap::new(),
            hub,
            completion_event: LOCAL_COMPLETION_EVENT.to_string(),
        }
    }

    pub fn with_worker(mut self, id: WorkerId, worker: Arc<dyn Worker>) -> Self {
        self.register(id, worker);
        self
    }

    /// Publish completions under a different event name
    pub fn with_completion_event(mut self, event_name: impl Into<String>) -> Self {
        self.completion_event = event_name.into();
        self
    }

    pub fn register(&mut self, id: WorkerId, worker: Arc<dyn Worker>) {
        self.workers.insert(id, worker);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

#[async_trait]
impl DispatchClient for LocalDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        let Some(worker) = self.workers.get(&request.assignee_id).cloned() else {
            return Ok(DispatchResponse::rejected(format!(
                "Unknown worker: {}",
                request.assignee_id
            )));
        };

        let task = AssignedTask {
            task_id: TaskId::new(Uuid::new_v4().to_string()),
            assignee: request.assignee_id.clone(),
            description: request.description.clone(),
            payload: request.payload.clone(),
        };
        let task_id = task.task_id.clone();
        let hub = self.hub.clone();
        let completion_event = self.completion_event.clone();
        let span = tracing::info_span!("local_worker", worker = %task.assignee, task_id = %task.task_id);

        tokio::spawn(
            async move {
                let event = match worker.perform(&task).await {
                    Ok(result) => {
                        info!("Local worker finished");
                        CompletionEvent::new(completion_event, task.task_id.clone(), result)
                    }
                    Err(err) => {
                        warn!(error = %err, "Local worker failed");
                        CompletionEvent::new(
                            LOCAL_FAILURE_EVENT,
                            task.task_id.clone(),
                            json!({ "error": err.to_string() }),
                        )
                    }
                };
                hub.publish(event).await;
            }
            .instrument(span),
        );

        Ok(DispatchResponse::accepted(task_id))
    }
}

/// Demonstration worker: answers with advice derived from the task description
pub struct EchoWorker {
    delay: Duration,
}

impl EchoWorker {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Worker for EchoWorker {
    async fn perform(&self, task: &AssignedTask) -> anyhow::Result<Value> {
        tokio::time::sleep(self.delay).await;

        let weather = task
            .description
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or(task.description.as_str());
        let headline = weather.lines().find(|l| l.starts_with("Weather:")).unwrap_or("Weather: unknown");

        Ok(json!({
            "value": format!(
                "{} suggests planning around it. {}",
                task.assignee,
                headline
            )
        }))
    }
}
