use crate::config::ObservabilityConfig;
use crate::coordination::types::{RunId, WorkerId};
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over the configured level. JSON output carries
/// the current span and span list so interleaved runs stay attributable.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(filter)
            .try_init()?;
    }

    tracing::info!("Weather coordinator telemetry initialized");
    Ok(())
}

/// Span covering one run from enrichment to its last roster step
pub fn create_run_span(run_id: &RunId, subject: &str) -> tracing::Span {
    tracing::info_span!(
        "coordination_run",
        run.id = %run_id,
        run.subject = subject,
        otel.kind = "internal"
    )
}

/// Span covering one delegate/wait/report cycle
pub fn create_step_span(run_id: &RunId, worker: &WorkerId, position: usize) -> tracing::Span {
    tracing::info_span!(
        "roster_step",
        run.id = %run_id,
        worker = %worker,
        position = position,
        otel.kind = "internal"
    )
}

pub fn shutdown_telemetry() {
    tracing::info!("Weather coordinator telemetry shutdown complete");
}
