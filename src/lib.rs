// Weather Coordinator Library - sequential delegation across a worker roster
// This exposes the core components for testing and integration

pub mod coordination;
pub mod enrichment;
pub mod substrate;
pub mod ingress;
pub mod sink;
pub mod telemetry;
pub mod observability;
pub mod config;
pub mod shutdown;

// Re-export key types for easy access
pub use coordination::{
    AcceptedEvents, Collaborators, Completion, CompletionEvent, CompletionWatcher, DelegationAdapter,
    DelegationFailure, Delegator, Enricher, EnrichmentError, EventHub, HttpSinkReporter, LogOnlyReporter,
    ResultReporter, RunHandle, RunId, RunStatus, RunSummary, Sequencer, SequencerSettings, StepOutcome, TaskId,
    TriggerError, WatchError, WorkerId,
};
pub use config::CoordinatorConfig;
pub use enrichment::ForecastEnricher;
pub use ingress::{AppState, TriggerClient};
pub use observability::{CoordinatorMetrics, MetricsSnapshot, OperationTimer};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use sink::{LogEntry, LogStore};
pub use substrate::{EchoWorker, HttpDispatchClient, LocalDispatcher, Worker};
pub use telemetry::{create_run_span, create_step_span, init_telemetry, shutdown_telemetry};
