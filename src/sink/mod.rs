//! Log sink server: receives human-readable reports, prints them, keeps the
//! most recent ones and streams new ones to SSE subscribers.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const DEFAULT_RETAINED_ENTRIES: usize = 500;

/// One report as posted to `/log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default = "unknown_agent")]
    pub agent: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

fn unknown_agent() -> String {
    "Unknown".to_string()
}

impl LogEntry {
    pub fn new(agent: &str, content: &str) -> Self {
        Self {
            agent: agent.to_string(),
            content: content.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Bounded in-memory history plus a live feed
#[derive(Clone)]
pub struct LogStore {
    entries: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    feed: broadcast::Sender<LogEntry>,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            feed,
        }
    }

    pub async fn push(&self, entry: LogEntry) {
        {
            let mut entries = self.entries.write().await;
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        let _ = self.feed.send(entry);
    }

    /// Most recent `limit` entries, oldest first
    pub async fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.feed.subscribe()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_ENTRIES)
    }
}

pub fn create_router(store: LogStore) -> Router {
    Router::new()
        .route("/log", post(receive_log).get(list_logs))
        .route("/log/stream", get(stream_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Bind and serve the sink until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, store: LogStore, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("Log sink listening on http://{}/log", addr);

    axum::serve(listener, create_router(store))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Log sink stopped");
    Ok(())
}

fn print_banner(entry: &LogEntry) {
    let rule = "=".repeat(70);
    println!("\n{rule}");
    println!(
        "[{}] Report from '{}':",
        Local::now().format("%H:%M:%S"),
        entry.agent
    );
    println!("{rule}");
    println!("{}", entry.content);
    println!("{rule}\n");
}

async fn receive_log(State(store): State<LogStore>, body: Bytes) -> Response {
    let mut entry: LogEntry = match serde_json::from_slice(&body) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(error = %err, "Ignoring report with invalid JSON");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid JSON"}))).into_response();
        }
    };

    if entry.timestamp.is_empty() {
        entry.timestamp = Utc::now().to_rfc3339();
    }

    print_banner(&entry);
    store.push(entry).await;

    (StatusCode::OK, Json(json!({"status": "received"}))).into_response()
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn list_logs(State(store): State<LogStore>, Query(query): Query<ListQuery>) -> Json<Vec<LogEntry>> {
    Json(store.recent(query.limit).await)
}

async fn stream_logs(State(store): State<LogStore>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = store.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(entry) => {
                let json = serde_json::to_string(&entry).unwrap_or_default();
                Some((Ok(Event::default().event("log").data(json)), rx))
            }
            Err(broadcast::error::RecvError::Lagged(_)) => Some((Ok(Event::default().comment("lagged")), rx)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
