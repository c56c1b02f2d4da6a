use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::coordination::types::{AcceptedEvents, WorkerId, DEFAULT_COMPLETION_EVENTS};

pub const DEFAULT_CONFIG_FILE: &str = "weather-coordinator.toml";
pub const ENV_PREFIX: &str = "WEATHER_COORDINATOR";

/// Furthest day ahead (or behind) the forecast provider serves
pub const MAX_FORECAST_DAYS: i64 = 16;

/// Main configuration structure for the weather coordinator
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// HTTP ingress settings
    pub server: ServerConfig,
    /// Ordered worker roster and per-step timing
    pub roster: RosterConfig,
    /// Dispatch substrate settings
    pub dispatch: DispatchConfig,
    /// Completion event stream settings
    pub events: EventsConfig,
    /// Report sink settings
    pub sink: SinkConfig,
    /// Forecast lookup settings
    pub enrichment: EnrichmentConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the ingress listens on
    pub listen_addr: String,
    /// How long to wait for in-flight runs on shutdown
    pub shutdown_drain_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RosterConfig {
    /// Workers in the order every run visits them
    pub workers: Vec<String>,
    /// Pause before each delegation
    pub step_delay_ms: u64,
    /// Bound on each completion wait
    pub completion_timeout_seconds: u64,
    /// Event names accepted as "task finished"
    pub completion_events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Remote delegate endpoint
    pub endpoint: String,
    /// Bound on the delegate call itself
    pub request_timeout_seconds: u64,
    /// Run the roster in-process instead of against the remote substrate
    pub local_workers: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventsConfig {
    pub channel_capacity: usize,
    /// How long published events stay visible to waits that start late
    pub retention_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Log sink endpoint; reports only reach the log when unset
    pub endpoint: Option<String>,
    /// `agent` label attached to every report
    pub source_label: String,
    pub request_timeout_seconds: u64,
    /// Prefix every report with its run id
    pub tag_reports_with_run_id: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub language: String,
    pub request_timeout_seconds: u64,
    /// Largest accepted day offset for relative dates
    pub max_forecast_days: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (overridden by RUST_LOG)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8888".to_string(),
                shutdown_drain_seconds: 30,
            },
            roster: RosterConfig {
                workers: vec![
                    "gryffindor-student".to_string(),
                    "slytherin-student".to_string(),
                    "ravenclaw-student".to_string(),
                    "hufflepuff-student".to_string(),
                ],
                step_delay_ms: 1000,
                completion_timeout_seconds: 120,
                completion_events: DEFAULT_COMPLETION_EVENTS.iter().map(|s| s.to_string()).collect(),
            },
            dispatch: DispatchConfig {
                endpoint: "http://localhost:8700/tasks/delegate".to_string(),
                request_timeout_seconds: 10,
                local_workers: false,
            },
            events: EventsConfig {
                channel_capacity: 1024,
                retention_seconds: 600,
            },
            sink: SinkConfig {
                endpoint: Some("http://localhost:9999/log".to_string()),
                source_label: "weather-connector".to_string(),
                request_timeout_seconds: 5,
                tag_reports_with_run_id: false,
            },
            enrichment: EnrichmentConfig {
                geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
                forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
                language: "en".to_string(),
                request_timeout_seconds: 5,
                max_forecast_days: 15,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path` if given and then required, else
    ///    `weather-coordinator.toml` if present)
    /// 3. Environment variables (prefixed with `WEATHER_COORDINATOR__`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Configuration file not found: {}", path.display());
                }
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("roster.workers")
                .with_list_parse_key("roster.completion_events")
                .try_parsing(true),
        );

        let config: CoordinatorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could execute under
    pub fn validate(&self) -> Result<()> {
        if self.roster.workers.is_empty() {
            bail!("roster.workers must name at least one worker");
        }

        let mut seen = HashSet::new();
        for worker in &self.roster.workers {
            if worker.trim().is_empty() {
                bail!("roster.workers contains a blank worker id");
            }
            if !seen.insert(worker.as_str()) {
                bail!("roster.workers lists '{worker}' more than once");
            }
        }

        if self.roster.completion_events.is_empty() {
            bail!("roster.completion_events must name at least one event");
        }
        if self.roster.completion_timeout_seconds == 0 {
            bail!("roster.completion_timeout_seconds must be greater than zero");
        }
        if self.dispatch.request_timeout_seconds == 0 {
            bail!("dispatch.request_timeout_seconds must be greater than zero");
        }
        if self.sink.request_timeout_seconds == 0 {
            bail!("sink.request_timeout_seconds must be greater than zero");
        }
        if self.enrichment.request_timeout_seconds == 0 {
            bail!("enrichment.request_timeout_seconds must be greater than zero");
        }
        if self.events.channel_capacity == 0 {
            bail!("events.channel_capacity must be greater than zero");
        }
        if !(0..=MAX_FORECAST_DAYS).contains(&self.enrichment.max_forecast_days) {
            bail!(
                "enrichment.max_forecast_days must be between 0 and {MAX_FORECAST_DAYS}, got {}",
                self.enrichment.max_forecast_days
            );
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

impl RosterConfig {
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|w| WorkerId::new(w.trim())).collect()
    }

    pub fn accepted_events(&self) -> AcceptedEvents {
        AcceptedEvents::new(self.completion_events.iter().cloned())
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_seconds)
    }
}

impl EventsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}
