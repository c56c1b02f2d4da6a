// Coordination Module - sequential delegation across a fixed worker roster
//
// Collaborators are injected as async traits so the sequencer can be driven
// entirely by fakes in tests.

pub mod types;
pub mod errors;
pub mod traits;
pub mod run;
pub mod watcher;
pub mod delegation;
pub mod reporter;
pub mod sequencer;

#[cfg(test)]
pub mod mocks;


pub use delegation::{DelegationAdapter, DispatchClient, DispatchRequest, DispatchResponse};
pub use errors::{DelegationFailure, DispatchError, EnrichmentError, RunError, TriggerError, WatchError};
pub use reporter::{HttpSinkReporter, LogOnlyReporter};
pub use run::{RecordedOutcome, Run, RunStatus, RunSummary};
pub use sequencer::{Collaborators, RunHandle, Sequencer, SequencerSettings};
pub use traits::{CompletionWatcher, Delegator, Enricher, ResultReporter};
pub use types::{AcceptedEvents, Completion, CompletionEvent, Delegation, RunId, StepOutcome, TaskId, WorkerId};
pub use watcher::EventHub;
