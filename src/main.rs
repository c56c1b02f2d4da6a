use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use weather_coordinator::config::{CoordinatorConfig, ObservabilityConfig, DEFAULT_CONFIG_FILE};
use weather_coordinator::coordination::{
    Collaborators, DelegationAdapter, DispatchClient, EventHub, HttpSinkReporter, LogOnlyReporter, ResultReporter,
    Sequencer, SequencerSettings,
};
use weather_coordinator::enrichment::ForecastEnricher;
use weather_coordinator::ingress::{self, AppState, TriggerClient};
use weather_coordinator::observability::CoordinatorMetrics;
use weather_coordinator::shutdown::{drain_with_timeout, ShutdownCoordinator};
use weather_coordinator::sink::{self, LogStore};
use weather_coordinator::substrate::{EchoWorker, HttpDispatchClient, LocalDispatcher};
use weather_coordinator::telemetry::{init_telemetry, shutdown_telemetry};

/// How long the demonstration workers take to "think"
const LOCAL_WORKER_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "weather-coordinator")]
#[command(about = "Sequential delegation of weather-based travel advice across a worker roster")]
#[command(long_about = "Accepts city/date triggers over HTTP, fetches the forecast, then delegates a travel-advice \
                       task to each worker in the roster one at a time, forwarding every result to a log sink.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator: HTTP ingress plus the run sequencer
    Serve {
        /// Configuration file (defaults to weather-coordinator.toml when present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// Serve the roster with in-process demonstration workers
        #[arg(long, help = "Use in-process echo workers instead of the remote dispatch substrate")]
        local_workers: bool,
    },
    /// Send one trigger to a running coordinator
    Trigger {
        /// City to fetch the forecast for
        city: String,
        /// Day offset (e.g. 0, 1, -1) or date (YYYY-MM-DD)
        date: Option<String>,
        #[arg(long, default_value = "http://localhost:8888/generate")]
        url: String,
    },
    /// Run a log sink that prints every report it receives
    LogServer {
        #[arg(long, default_value = "0.0.0.0:9999")]
        addr: SocketAddr,
    },
    /// Write the default configuration to a file
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, local_workers } => tokio::runtime::Runtime::new()?.block_on(async {
            serve_command(config.as_deref(), local_workers).await
        }),
        Commands::Trigger { city, date, url } => {
            tokio::runtime::Runtime::new()?.block_on(async { trigger_command(&city, date.as_deref(), &url).await })
        }
        Commands::LogServer { addr } => {
            tokio::runtime::Runtime::new()?.block_on(async { log_server_command(addr).await })
        }
        Commands::InitConfig { path, force } => init_config_command(&path, force),
    }
}

async fn serve_command(config_path: Option<&Path>, local_workers: bool) -> Result<()> {
    CoordinatorConfig::load_env_file()?;
    let mut config = CoordinatorConfig::load(config_path)?;
    if local_workers {
        config.dispatch.local_workers = true;
    }
    init_telemetry(&config.observability)?;

    let metrics = Arc::new(CoordinatorMetrics::new());
    let shutdown = ShutdownCoordinator::new();
    let events = EventHub::new(config.events.channel_capacity, config.events.retention());

    let dispatch: Arc<dyn DispatchClient> = if config.dispatch.local_workers {
        let mut local = LocalDispatcher::new(events.clone());
        for worker in config.roster.worker_ids() {
            local.register(worker, Arc::new(EchoWorker::new(LOCAL_WORKER_DELAY)));
        }
        info!(workers = local.worker_count(), "Using in-process workers");
        Arc::new(local)
    } else {
        info!(endpoint = %config.dispatch.endpoint, "Using remote dispatch substrate");
        Arc::new(HttpDispatchClient::new(
            config.dispatch.endpoint.clone(),
            Duration::from_secs(config.dispatch.request_timeout_seconds),
        )?)
    };

    let reporter: Arc<dyn ResultReporter> = match &config.sink.endpoint {
        Some(endpoint) => Arc::new(HttpSinkReporter::new(
            endpoint.clone(),
            Duration::from_secs(config.sink.request_timeout_seconds),
            metrics.clone(),
        )?),
        None => {
            warn!("No sink endpoint configured; reports will only be logged");
            Arc::new(LogOnlyReporter::new(metrics.clone()))
        }
    };

    let collaborators = Collaborators {
        enricher: Arc::new(ForecastEnricher::new(&config.enrichment)?),
        delegator: Arc::new(DelegationAdapter::new(
            dispatch,
            Duration::from_secs(config.dispatch.request_timeout_seconds),
        )),
        watcher: Arc::new(events.clone()),
        reporter,
    };

    let sequencer = Sequencer::new(
        SequencerSettings::from_config(&config),
        collaborators,
        metrics.clone(),
        shutdown.signal(),
    );
    info!(roster = ?config.roster.workers, "Roster loaded");

    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.server.listen_addr))?;

    let mut http_shutdown = shutdown.signal();
    let mut server = tokio::spawn(ingress::serve(
        addr,
        AppState::new(sequencer.clone(), events),
        async move { http_shutdown.recv().await },
    ));

    let early_exit = tokio::select! {
        result = &mut server => Some(result),
        signal = shutdown.wait_for_shutdown() => {
            signal?;
            None
        }
    };

    shutdown.trigger();
    drain_with_timeout(
        "runs",
        Duration::from_secs(config.server.shutdown_drain_seconds),
        sequencer.wait_for_idle(),
    )
    .await;

    let server_result = match early_exit {
        Some(result) => result,
        None => server.await,
    };
    server_result??;

    metrics.log_stats();
    shutdown_telemetry();
    Ok(())
}

async fn trigger_command(city: &str, date: Option<&str>, url: &str) -> Result<()> {
    if city.trim().is_empty() {
        bail!("City name must not be empty");
    }

    println!("Sending request to {url}...");
    println!("City: {city}, date: {}", date.unwrap_or("(today)"));

    let client = TriggerClient::new(url, Duration::from_secs(10))?;
    let (status, body) = client.send(city, date).await?;

    println!("HTTP status: {status}");
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn log_server_command(addr: SocketAddr) -> Result<()> {
    init_telemetry(&ObservabilityConfig {
        log_level: "info".to_string(),
        json: false,
    })?;

    let shutdown = ShutdownCoordinator::new();
    let mut signal = shutdown.signal();
    let mut server = tokio::spawn(sink::serve(addr, LogStore::default(), async move { signal.recv().await }));

    println!("Log sink running on http://{addr}/log");
    println!("Waiting for reports...\n");

    tokio::select! {
        result = &mut server => return result?,
        signal = shutdown.wait_for_shutdown() => signal?,
    }
    server.await??;
    Ok(())
}

fn init_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    CoordinatorConfig::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
