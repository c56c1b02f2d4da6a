// Run record - exclusively owned by the task executing the run

use crate::coordination::errors::RunError;
use crate::coordination::types::{RunId, StepOutcome, WorkerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// One outcome, pinned to the worker whose step produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedOutcome {
    pub worker: WorkerId,
    pub outcome: StepOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// State of one run after enrichment succeeded.
///
/// The roster position is the length of the outcome list, so
/// `len(outcomes) == roster_position` holds structurally. Outcomes are only
/// ever appended, in roster order.
#[derive(Debug, Clone)]
pub struct Run {
    run_id: RunId,
    subject: String,
    enrichment_text: String,
    roster: Arc<[WorkerId]>,
    outcomes: Vec<RecordedOutcome>,
}

impl Run {
    pub fn new(run_id: RunId, subject: String, enrichment_text: String, roster: Arc<[WorkerId]>) -> Self {
        let capacity = roster.len();
        Self {
            run_id,
            subject,
            enrichment_text,
            roster,
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn enrichment_text(&self) -> &str {
        &self.enrichment_text
    }

    pub fn roster_position(&self) -> usize {
        self.outcomes.len()
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    pub fn outcomes(&self) -> &[RecordedOutcome] {
        &self.outcomes
    }

    /// Worker whose step is due next, `None` once terminal
    pub fn next_worker(&self) -> Option<&WorkerId> {
        self.roster.get(self.roster_position())
    }

    pub fn is_terminal(&self) -> bool {
        self.roster_position() == self.roster.len()
    }

    /// Append the outcome for the current roster position.
    pub fn record(&mut self, worker: &WorkerId, outcome: StepOutcome) -> Result<&RecordedOutcome, RunError> {
        let position = self.roster_position();
        let expected = self
            .roster
            .get(position)
            .ok_or(RunError::AlreadyTerminal { position })?;

        if expected != worker {
            return Err(RunError::OutOfOrder {
                expected: expected.clone(),
                actual: worker.clone(),
            });
        }

        self.outcomes.push(RecordedOutcome {
            worker: worker.clone(),
            outcome,
            recorded_at: Utc::now(),
        });
        Ok(&self.outcomes[position])
    }

    pub fn into_summary(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            subject: self.subject,
            status: RunStatus::Finished,
            outcomes: self.outcomes,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every roster step recorded an outcome
    Finished,
    /// Enrichment failed; the roster loop never started
    Aborted { reason: String },
}

/// Final view of a run, handed back once the run task completes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub subject: String,
    pub status: RunStatus,
    pub outcomes: Vec<RecordedOutcome>,
}

impl RunSummary {
    pub fn aborted(run_id: RunId, subject: String, reason: String) -> Self {
        Self {
            run_id,
            subject,
            status: RunStatus::Aborted { reason },
            outcomes: Vec::new(),
        }
    }

    pub fn outcome_list(&self) -> Vec<StepOutcome> {
        self.outcomes.iter().map(|r| r.outcome.clone()).collect()
    }
}
