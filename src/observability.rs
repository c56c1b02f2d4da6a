use crate::coordination::types::StepOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Coordinator counters, shared by the sequencer, reporters and HTTP surface
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    pub runs_started: AtomicU64,
    pub runs_finished: AtomicU64,
    pub runs_aborted: AtomicU64,
    pub runs_cancelled: AtomicU64,
    pub steps_completed: AtomicU64,
    pub steps_timed_out: AtomicU64,
    pub steps_delegation_failed: AtomicU64,
    pub steps_errored: AtomicU64,
    pub reports_sent: AtomicU64,
    pub reports_failed: AtomicU64,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_finished(&self) {
        self.runs_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &StepOutcome) {
        let counter = match outcome {
            StepOutcome::Completed(_) => &self.steps_completed,
            StepOutcome::TimedOut => &self.steps_timed_out,
            StepOutcome::DelegationFailed => &self.steps_delegation_failed,
            StepOutcome::Errored(_) => &self.steps_errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report(&self, delivered: bool) {
        if delivered {
            self.reports_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reports_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_finished: self.runs_finished.load(Ordering::Relaxed),
            runs_aborted: self.runs_aborted.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            steps_completed: self.steps_completed.load(Ordering::Relaxed),
            steps_timed_out: self.steps_timed_out.load(Ordering::Relaxed),
            steps_delegation_failed: self.steps_delegation_failed.load(Ordering::Relaxed),
            steps_errored: self.steps_errored.load(Ordering::Relaxed),
            reports_sent: self.reports_sent.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Coordinator metrics: runs={} finished={} aborted={} cancelled={} completed={} timed_out={} delegation_failed={} errored={} reports_sent={} reports_failed={}",
            stats.runs_started,
            stats.runs_finished,
            stats.runs_aborted,
            stats.runs_cancelled,
            stats.steps_completed,
            stats.steps_timed_out,
            stats.steps_delegation_failed,
            stats.steps_errored,
            stats.reports_sent,
            stats.reports_failed
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_finished: u64,
    pub runs_aborted: u64,
    pub runs_cancelled: u64,
    pub steps_completed: u64,
    pub steps_timed_out: u64,
    pub steps_delegation_failed: u64,
    pub steps_errored: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_land_in_their_own_counter() {
        let metrics = CoordinatorMetrics::new();
        metrics.record_outcome(&StepOutcome::Completed("ok".into()));
        metrics.record_outcome(&StepOutcome::TimedOut);
        metrics.record_outcome(&StepOutcome::TimedOut);
        metrics.record_outcome(&StepOutcome::DelegationFailed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.steps_completed, 1);
        assert_eq!(snapshot.steps_timed_out, 2);
        assert_eq!(snapshot.steps_delegation_failed, 1);
        assert_eq!(snapshot.steps_errored, 0);
    }
}
