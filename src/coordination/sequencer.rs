//! The sequencer drives one run at a time per spawned task: enrichment, then
//! delegate -> wait -> report for every worker in roster order.
//!
//! Runs share nothing mutable with each other. Each run owns its `Run` record
//! on its own tokio task; the collaborators are only referenced.

use crate::config::CoordinatorConfig;
use crate::coordination::errors::TriggerError;
use crate::coordination::reporter::{render_step_report, render_system_failure, tag_with_run};
use crate::coordination::run::{Run, RunSummary};
use crate::coordination::traits::{CompletionWatcher, Delegator, Enricher, ResultReporter};
use crate::coordination::types::{AcceptedEvents, Completion, RunId, StepOutcome, WorkerId};
use crate::observability::{CoordinatorMetrics, OperationTimer};
use crate::shutdown::ShutdownSignal;
use crate::telemetry::{create_run_span, create_step_span};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

/// Everything about a run that comes from configuration
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub roster: Arc<[WorkerId]>,
    pub step_delay: Duration,
    pub completion_timeout: Duration,
    pub completion_events: AcceptedEvents,
    pub report_source: String,
    pub tag_reports_with_run_id: bool,
}

impl SequencerSettings {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            roster: config.roster.worker_ids().into(),
            step_delay: config.roster.step_delay(),
            completion_timeout: config.roster.completion_timeout(),
            completion_events: config.roster.accepted_events(),
            report_source: config.sink.source_label.clone(),
            tag_reports_with_run_id: config.sink.tag_reports_with_run_id,
        }
    }
}

/// Collaborators bound at construction; there is no global registry
#[derive(Clone)]
pub struct Collaborators {
    pub enricher: Arc<dyn Enricher>,
    pub delegator: Arc<dyn Delegator>,
    pub watcher: Arc<dyn CompletionWatcher>,
    pub reporter: Arc<dyn ResultReporter>,
}

/// A spawned run. Awaiting `join` yields the summary, or `None` if the run
/// was cancelled by shutdown.
pub struct RunHandle {
    pub run_id: RunId,
    pub join: JoinHandle<Option<RunSummary>>,
}

#[derive(Default)]
struct ActiveRuns {
    count: AtomicUsize,
    idle: Notify,
}

struct ActiveRunGuard(Arc<ActiveRuns>);

impl ActiveRuns {
    fn enter(self: &Arc<Self>) -> ActiveRunGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ActiveRunGuard(self.clone())
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

struct SequencerInner {
    settings: SequencerSettings,
    collaborators: Collaborators,
    metrics: Arc<CoordinatorMetrics>,
    shutdown: ShutdownSignal,
    active: Arc<ActiveRuns>,
}

#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<SequencerInner>,
}

/// Task description handed to every worker of a run
pub fn task_description(enrichment_text: &str) -> String {
    format!("Generate travel advice based on this weather:\n{enrichment_text}")
}

impl Sequencer {
    pub fn new(
        settings: SequencerSettings,
        collaborators: Collaborators,
        metrics: Arc<CoordinatorMetrics>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            inner: Arc::new(SequencerInner {
                settings,
                collaborators,
                metrics,
                shutdown,
                active: Arc::new(ActiveRuns::default()),
            }),
        }
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.inner.settings
    }

    pub fn metrics(&self) -> &Arc<CoordinatorMetrics> {
        &self.inner.metrics
    }

    /// Accept a trigger and run it in the background. Returns as soon as the
    /// run is spawned.
    pub fn start_run(&self, subject: &str, date_hint: Option<String>) -> Result<RunId, TriggerError> {
        self.spawn_run(subject, date_hint).map(|handle| handle.run_id)
    }

    /// Like `start_run`, but hands back the join handle
    pub fn spawn_run(&self, subject: &str, date_hint: Option<String>) -> Result<RunHandle, TriggerError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(TriggerError::InvalidTrigger {
                reason: "subject must not be empty".to_string(),
            });
        }

        let run_id = RunId::generate(subject);
        let guard = self.inner.active.enter();
        self.inner.metrics.record_run_started();

        let span = create_run_span(&run_id, subject);
        let sequencer = self.clone();
        let mut shutdown = self.inner.shutdown.clone();
        let task_run_id = run_id.clone();
        let subject = subject.to_string();

        let join = tokio::spawn(
            async move {
                let _guard = guard;
                tokio::select! {
                    summary = sequencer.execute_run(task_run_id.clone(), subject, date_hint) => Some(summary),
                    _ = shutdown.recv() => {
                        // Dropping execute_run drops any in-flight wait and its subscription
                        warn!(run_id = %task_run_id, "Run cancelled by shutdown");
                        sequencer.inner.metrics.record_run_cancelled();
                        None
                    }
                }
            }
            .instrument(span),
        );

        info!(run_id = %run_id, "Run accepted");
        Ok(RunHandle { run_id, join })
    }

    /// Execute one run to its terminal state on the current task.
    pub async fn execute_run(&self, run_id: RunId, subject: String, date_hint: Option<String>) -> RunSummary {
        let timer = OperationTimer::new("coordination_run");
        let inner = &self.inner;

        let enrichment_text = match inner
            .collaborators
            .enricher
            .enrich(&subject, date_hint.as_deref())
            .await
        {
            Ok(text) => text,
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Enrichment failed, aborting run");
                self.report(&run_id, &render_system_failure(&err.to_string())).await;
                inner.metrics.record_run_aborted();
                timer.finish();
                return RunSummary::aborted(run_id, subject, err.to_string());
            }
        };

        self.report(&run_id, &enrichment_text).await;

        let mut run = Run::new(run_id, subject, enrichment_text, inner.settings.roster.clone());
        while let Some(worker) = run.next_worker().cloned() {
            let position = run.roster_position();
            let span = create_step_span(run.run_id(), &worker, position);

            let outcome = self.execute_step(&run, &worker).instrument(span.clone()).await;
            inner.metrics.record_outcome(&outcome);
            let report = render_step_report(&worker, &outcome, inner.settings.completion_timeout);

            if let Err(err) = run.record(&worker, outcome) {
                error!(run_id = %run.run_id(), error = %err, "Run record rejected outcome");
                break;
            }

            self.report(run.run_id(), &report).instrument(span).await;
        }

        info!(
            run_id = %run.run_id(),
            steps = run.outcomes().len(),
            completed = run.outcomes().iter().filter(|o| o.outcome.is_completed()).count(),
            "Run finished"
        );
        inner.metrics.record_run_finished();
        timer.finish();
        run.into_summary()
    }

    /// One delegate/wait cycle. Every branch yields exactly one outcome.
    async fn execute_step(&self, run: &Run, worker: &WorkerId) -> StepOutcome {
        let inner = &self.inner;
        tokio::time::sleep(inner.settings.step_delay).await;

        let description = task_description(run.enrichment_text());
        let payload = json!({ "project_id": run.run_id().as_str() });

        let delegation = match inner
            .collaborators
            .delegator
            .delegate(worker, &description, payload)
            .await
        {
            Ok(delegation) => delegation,
            Err(failure) => {
                warn!(worker = %worker, error = %failure, "Delegation failed, moving to next worker");
                return StepOutcome::DelegationFailed;
            }
        };

        match inner
            .collaborators
            .watcher
            .wait_for_completion(
                &delegation.task_id,
                &inner.settings.completion_events,
                inner.settings.completion_timeout,
            )
            .await
        {
            Ok(Completion::TimedOut) => {
                warn!(
                    worker = %worker,
                    task_id = %delegation.task_id,
                    timeout_secs = inner.settings.completion_timeout.as_secs(),
                    "Task timed out"
                );
                StepOutcome::TimedOut
            }
            Ok(completion) => completion.into(),
            Err(err) => {
                error!(worker = %worker, task_id = %delegation.task_id, error = %err, "Completion wait failed");
                StepOutcome::Errored(err.to_string())
            }
        }
    }

    // Awaited so one run's reports reach the sink in roster order. The wait is
    // bounded by the reporter's own request timeout.
    async fn report(&self, run_id: &RunId, text: &str) {
        let settings = &self.inner.settings;
        let reporter = &self.inner.collaborators.reporter;
        if settings.tag_reports_with_run_id {
            reporter
                .report(&settings.report_source, &tag_with_run(run_id, text))
                .await;
        } else {
            reporter.report(&settings.report_source, text).await;
        }
    }

    /// Runs currently spawned and not yet finished or cancelled
    pub fn active_runs(&self) -> usize {
        self.inner.active.count.load(Ordering::SeqCst)
    }

    /// Resolve once no run is active
    pub async fn wait_for_idle(&self) {
        loop {
            let idle = self.inner.active.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.active_runs() == 0 {
                return;
            }
            idle.await;
        }
    }
}
