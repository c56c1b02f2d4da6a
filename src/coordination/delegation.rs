//! Delegation adapter over an opaque dispatch substrate.
//!
//! The substrate is a request/response call (`DispatchClient`). Whatever it
//! does wrong - malformed acknowledgement, explicit rejection, transport
//! error, or simply not answering in time - comes back to the sequencer as a
//! `DelegationFailure` value.

use crate::coordination::errors::{DelegationFailure, DispatchError};
use crate::coordination::traits::Delegator;
use crate::coordination::types::{Delegation, TaskId, WorkerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Body of a delegate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub assignee_id: WorkerId,
    pub description: String,
    pub payload: Value,
}

/// Structured acknowledgement. Older substrates nest the task id under `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DispatchData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl DispatchResponse {
    pub fn accepted(task_id: TaskId) -> Self {
        Self {
            success: true,
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id
            .as_ref()
            .or_else(|| self.data.as_ref().and_then(|d| d.task_id.as_ref()))
    }
}

/// Raw substrate call
#[async_trait]
pub trait DispatchClient: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse, DispatchError>;
}

pub struct DelegationAdapter {
    client: Arc<dyn DispatchClient>,
    request_timeout: Duration,
}

impl DelegationAdapter {
    pub fn new(client: Arc<dyn DispatchClient>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn normalize(
        assignee: &WorkerId,
        response: DispatchResponse,
    ) -> Result<TaskId, DelegationFailure> {
        if !response.success {
            return Err(DelegationFailure::Rejected {
                assignee: assignee.clone(),
                message: response
                    .message
                    .unwrap_or_else(|| "substrate reported failure".to_string()),
            });
        }

        response
            .task_id()
            .cloned()
            .ok_or_else(|| DelegationFailure::MissingTaskId {
                assignee: assignee.clone(),
            })
    }
}

#[async_trait]
impl Delegator for DelegationAdapter {
    async fn delegate(
        &self,
        assignee: &WorkerId,
        description: &str,
        payload: Value,
    ) -> Result<Delegation, DelegationFailure> {
        let request = DispatchRequest {
            assignee_id: assignee.clone(),
            description: description.to_string(),
            payload,
        };

        let result = match tokio::time::timeout(self.request_timeout, self.client.dispatch(&request)).await {
            Ok(Ok(response)) => Self::normalize(assignee, response),
            Ok(Err(DispatchError::Malformed { message })) => Err(DelegationFailure::Rejected {
                assignee: assignee.clone(),
                message: format!("malformed acknowledgement: {message}"),
            }),
            Ok(Err(err)) => Err(DelegationFailure::Transport {
                assignee: assignee.clone(),
                message: err.to_string(),
            }),
            Err(_) => Err(DelegationFailure::Timeout {
                assignee: assignee.clone(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(task_id) => {
                info!(task_id = %task_id, assignee = %assignee, "Task delegated");
                Ok(Delegation::new(task_id, assignee.clone()))
            }
            Err(failure) => {
                error!(assignee = %assignee, error = %failure, "Failed to delegate");
                Err(failure)
            }
        }
    }
}
