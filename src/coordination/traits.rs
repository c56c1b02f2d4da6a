// Collaborator seams injected into the sequencer

use crate::coordination::errors::{DelegationFailure, EnrichmentError, WatchError};
use crate::coordination::types::{AcceptedEvents, Completion, Delegation, TaskId, WorkerId};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Produces the enrichment text a run hands to every worker
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, subject: &str, date_hint: Option<&str>) -> Result<String, EnrichmentError>;
}

/// Hands a unit of work to a named worker.
///
/// Implementations must never let a dispatch-layer error escape as anything
/// other than a `DelegationFailure`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Delegator: Send + Sync {
    async fn delegate(
        &self,
        assignee: &WorkerId,
        description: &str,
        payload: Value,
    ) -> Result<Delegation, DelegationFailure>;
}

/// Blocks the calling step until a matching completion event or the deadline
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionWatcher: Send + Sync {
    async fn wait_for_completion(
        &self,
        task_id: &TaskId,
        accepted: &AcceptedEvents,
        timeout: Duration,
    ) -> Result<Completion, WatchError>;
}

/// Best-effort sink for human-readable reports. Never fails from the caller's
/// point of view.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, source_label: &str, text: &str);
}
