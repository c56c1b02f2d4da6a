use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Graceful shutdown coordinator for the weather coordinator.
///
/// Owns the shutdown flag; every spawned run holds a `ShutdownSignal` and
/// unwinds (dropping its event subscription) once the flag flips.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Handle for a component that must stop on shutdown
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Flip the shutdown flag
    pub fn trigger(&self) {
        info!("Initiating graceful shutdown of all runs...");
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Block until SIGINT/SIGTERM, then flip the shutdown flag
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        info!("Shutdown coordinator ready - will shutdown gracefully on SIGINT/SIGTERM");
        wait_for_os_signal().await?;
        self.trigger();
        Ok(())
    }
}

/// Receiving side of the shutdown flag
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Resolve once shutdown has been triggered. If the coordinator is gone
    /// without ever triggering, this never resolves.
    pub async fn recv(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

async fn wait_for_os_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c => {
                result?;
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate.recv() => {
                info!("Received terminate signal, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}

/// Run `drain` with an upper bound, logging instead of failing when it overruns
pub async fn drain_with_timeout<F>(what: &str, limit: Duration, drain: F)
where
    F: std::future::Future<Output = ()>,
{
    match tokio::time::timeout(limit, drain).await {
        Ok(()) => info!("{what} drained"),
        Err(_) => warn!("Timeout waiting for {what} to drain after {}s", limit.as_secs()),
    }
}
