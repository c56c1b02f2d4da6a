//! HTTP ingress: triggers in, completion events in, health and metrics out.

pub mod client;
pub mod error;
pub mod handlers;

use crate::coordination::sequencer::Sequencer;
use crate::coordination::watcher::EventHub;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use client::TriggerClient;
pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub sequencer: Sequencer,
    pub events: EventHub,
}

impl AppState {
    pub fn new(sequencer: Sequencer, events: EventHub) -> Self {
        Self { sequencer, events }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate))
        .route("/events", post(handlers::publish_event))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the ingress until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Ingress listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Ingress stopped accepting requests");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::mocks::{RecordingReporter, ScriptedDelegator, StaticEnricher};
    use crate::coordination::sequencer::{Collaborators, SequencerSettings};
    use crate::coordination::types::{AcceptedEvents, CompletionEvent, TaskId, WorkerId};
    use crate::coordination::CompletionWatcher;
    use crate::observability::CoordinatorMetrics;
    use crate::shutdown::ShutdownSignal;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let events = EventHub::new(16, Duration::from_secs(600));
        let settings = SequencerSettings {
            roster: vec![WorkerId::from("A")].into(),
            step_delay: Duration::from_secs(1),
            completion_timeout: Duration::from_secs(120),
            completion_events: AcceptedEvents::default(),
            report_source: "weather-connector".to_string(),
            tag_reports_with_run_id: false,
        };
        let sequencer = Sequencer::new(
            settings,
            Collaborators {
                enricher: Arc::new(StaticEnricher::ok("sunny")),
                delegator: Arc::new(ScriptedDelegator::new()),
                watcher: Arc::new(events.clone()),
                reporter: Arc::new(RecordingReporter::new()),
            },
            Arc::new(CoordinatorMetrics::new()),
            ShutdownSignal::never(),
        );
        AppState::new(sequencer, events)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_trigger_returns_before_the_run_finishes() {
        let state = state();
        let response = create_router(state.clone())
            .oneshot(post("/generate", r#"{"city": "Beijing", "date": 1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Request accepted, processing...");
        assert!(body["run_id"].as_str().unwrap().starts_with("manual-Beijing-"));
        assert_eq!(state.sequencer.active_runs(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let response = create_router(state())
            .oneshot(post("/generate", "{city:"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"status": "error", "message": "Invalid JSON"})
        );
    }

    #[tokio::test]
    async fn missing_or_blank_city_is_rejected() {
        for body in [r#"{"date": "0"}"#, r#"{"city": "   "}"#, r#"{"city": 7}"#] {
            let state = state();
            let response = create_router(state.clone()).oneshot(post("/generate", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await,
                json!({"status": "error", "message": "Missing 'city'"})
            );
            assert_eq!(state.sequencer.active_runs(), 0);
        }
    }

    #[tokio::test]
    async fn posted_event_resolves_a_waiting_task() {
        let state = state();
        let events = state.events.clone();
        let waiter = tokio::spawn(async move {
            events
                .wait_for_completion(&TaskId::new("t-42"), &AcceptedEvents::default(), Duration::from_secs(30))
                .await
        });
        tokio::task::yield_now().await;

        let event = serde_json::to_string(&CompletionEvent::new(
            "task.notification.completed",
            TaskId::new("t-42"),
            json!({"value": "Bring sunscreen"}),
        ))
        .unwrap();
        let response = create_router(state).oneshot(post("/events", &event)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let completion = waiter.await.unwrap().unwrap();
        assert_eq!(
            completion,
            crate::coordination::types::Completion::Completed("Bring sunscreen".to_string())
        );
    }

    #[tokio::test]
    async fn malformed_event_is_rejected() {
        let response = create_router(state())
            .oneshot(post("/events", r#"{"event_name": "task.complete"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_agent_and_active_runs() {
        let response = create_router(state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "agent": "weather-coordinator", "active_runs": 0})
        );
    }

    #[tokio::test]
    async fn metrics_expose_counters() {
        let response = create_router(state())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["runs_started"], 0);
        assert_eq!(body["reports_failed"], 0);
    }
}
