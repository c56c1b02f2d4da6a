//! Error taxonomy for the coordinator.
//!
//! Only `TriggerError` is ever surfaced to a caller. Everything else is caught
//! at the sequencer loop boundary and turned into a recorded outcome plus a
//! report.

use crate::coordination::types::WorkerId;
use thiserror::Error;

/// Rejection of a trigger at the ingress, before any run exists
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Invalid trigger: {reason}")]
    InvalidTrigger { reason: String },
}

/// Failure to produce the enrichment text. Aborts the whole run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },
    #[error("City not found: {city}")]
    CityNotFound { city: String },
    #[error("Weather data not available for {date}")]
    ForecastUnavailable { date: String },
    #[error("Enrichment request failed: {message}")]
    Http { message: String },
    #[error("Enrichment response could not be decoded: {message}")]
    Decode { message: String },
}

/// Normalised result of a dispatch that did not yield a task id
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DelegationFailure {
    #[error("Delegation to {assignee} rejected: {message}")]
    Rejected { assignee: WorkerId, message: String },
    #[error("Delegation to {assignee} acknowledged without a task id")]
    MissingTaskId { assignee: WorkerId },
    #[error("Delegation to {assignee} failed in transport: {message}")]
    Transport { assignee: WorkerId, message: String },
    #[error("Delegation to {assignee} timed out after {timeout_ms}ms")]
    Timeout { assignee: WorkerId, timeout_ms: u64 },
}

/// Infrastructure fault while waiting on the completion stream
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Completion event stream closed")]
    StreamClosed,
}

/// Guards on the run record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Run is already terminal at position {position}")]
    AlreadyTerminal { position: usize },
    #[error("Out-of-order outcome: expected {expected}, got {actual}")]
    OutOfOrder { expected: WorkerId, actual: WorkerId },
}

/// Transport-level failure of the raw dispatch substrate call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatch endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("Dispatch request failed: {message}")]
    Transport { message: String },
    #[error("Dispatch response malformed: {message}")]
    Malformed { message: String },
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DispatchError::Malformed {
                message: err.to_string(),
            }
        } else {
            DispatchError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EnrichmentError::Decode {
                message: err.to_string(),
            }
        } else {
            EnrichmentError::Http {
                message: err.to_string(),
            }
        }
    }
}
