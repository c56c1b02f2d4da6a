// Sequencer Scenario Tests
// Drives whole runs through the real event hub and in-process substrate

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weather_coordinator::coordination::{
    AcceptedEvents, Collaborators, CompletionEvent, DelegationAdapter, EnrichmentError, Enricher, EventHub,
    ResultReporter, RunId, RunStatus, Sequencer, SequencerSettings, StepOutcome, TaskId, WorkerId,
};
use weather_coordinator::observability::CoordinatorMetrics;
use weather_coordinator::shutdown::ShutdownSignal;
use weather_coordinator::substrate::{AssignedTask, LocalDispatcher, Worker};

const WEATHER: &str = "[Beijing weather report]\nDate: 2026-10-16\nWeather: Overcast";

struct FixedEnricher(Result<String, EnrichmentError>);

#[async_trait]
impl Enricher for FixedEnricher {
    async fn enrich(&self, _subject: &str, _date_hint: Option<&str>) -> Result<String, EnrichmentError> {
        self.0.clone()
    }
}

#[derive(Default)]
struct CollectingReporter {
    texts: Mutex<Vec<String>>,
}

impl CollectingReporter {
    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultReporter for CollectingReporter {
    async fn report(&self, _source_label: &str, text: &str) {
        self.texts.lock().unwrap().push(text.to_string());
    }
}

/// Accepts work and never reports back
struct SilentWorker;

#[async_trait]
impl Worker for SilentWorker {
    async fn perform(&self, _task: &AssignedTask) -> anyhow::Result<Value> {
        std::future::pending().await
    }
}

/// Answers with a fixed result after a short pause
struct AnsweringWorker(&'static str);

#[async_trait]
impl Worker for AnsweringWorker {
    async fn perform(&self, _task: &AssignedTask) -> anyhow::Result<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!({ "value": self.0 }))
    }
}

struct Harness {
    hub: EventHub,
    reporter: Arc<CollectingReporter>,
    sequencer: Sequencer,
}

fn harness(roster: &[&str], enrichment: Result<String, EnrichmentError>, dispatcher: LocalDispatcher, hub: EventHub) -> Harness {
    let reporter = Arc::new(CollectingReporter::default());
    let settings = SequencerSettings {
        roster: roster.iter().map(|w| WorkerId::from(*w)).collect::<Vec<_>>().into(),
        step_delay: Duration::from_secs(1),
        completion_timeout: Duration::from_secs(120),
        completion_events: AcceptedEvents::default(),
        report_source: "weather-connector".to_string(),
        tag_reports_with_run_id: false,
    };
    let sequencer = Sequencer::new(
        settings,
        Collaborators {
            enricher: Arc::new(FixedEnricher(enrichment)),
            delegator: Arc::new(DelegationAdapter::new(Arc::new(dispatcher), Duration::from_secs(10))),
            watcher: Arc::new(hub.clone()),
            reporter: reporter.clone(),
        },
        Arc::new(CoordinatorMetrics::new()),
        ShutdownSignal::never(),
    );
    Harness {
        hub,
        reporter,
        sequencer,
    }
}

fn new_hub() -> EventHub {
    EventHub::new(64, Duration::from_secs(600))
}

#[tokio::test(start_paused = true)]
async fn timed_out_worker_does_not_stop_the_next_one() {
    let hub = new_hub();
    let dispatcher = LocalDispatcher::new(hub.clone())
        .with_worker(WorkerId::from("A"), Arc::new(SilentWorker))
        .with_worker(WorkerId::from("B"), Arc::new(AnsweringWorker("ok")));
    let h = harness(&["A", "B"], Ok(WEATHER.to_string()), dispatcher, hub);

    let summary = h
        .sequencer
        .execute_run(RunId::from("manual-Beijing-1-0"), "Beijing".into(), None)
        .await;

    assert_eq!(summary.status, RunStatus::Finished);
    assert_eq!(
        summary.outcome_list(),
        vec![StepOutcome::TimedOut, StepOutcome::Completed("ok".to_string())]
    );
    assert_eq!(
        h.reporter.texts(),
        vec![
            WEATHER.to_string(),
            "Task Status: Failed (Timeout)\nAgent: A\nTimeout: >120s".to_string(),
            "Agent: B\nTask Status: Completed\nok".to_string(),
        ]
    );
    // Every wait has released its subscription
    assert_eq!(h.hub.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn enrichment_failure_records_nothing_and_reports_once() {
    let hub = new_hub();
    let dispatcher = LocalDispatcher::new(hub.clone()).with_worker(WorkerId::from("A"), Arc::new(AnsweringWorker("ok")));
    let h = harness(
        &["A"],
        Err(EnrichmentError::ForecastUnavailable {
            date: "2026-10-16".to_string(),
        }),
        dispatcher,
        hub,
    );

    let summary = h.sequencer.execute_run(RunId::from("run-x"), "Beijing".into(), None).await;

    assert!(summary.outcomes.is_empty());
    assert_eq!(
        h.reporter.texts(),
        vec!["System Error: Weather data not available for 2026-10-16".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_worker_fails_delegation_and_the_roster_continues() {
    let hub = new_hub();
    let dispatcher = LocalDispatcher::new(hub.clone()).with_worker(WorkerId::from("B"), Arc::new(AnsweringWorker("fine")));
    let h = harness(&["ghost", "B"], Ok(WEATHER.to_string()), dispatcher, hub);

    let summary = h.sequencer.execute_run(RunId::from("run-g"), "Beijing".into(), None).await;

    assert_eq!(
        summary.outcome_list(),
        vec![StepOutcome::DelegationFailed, StepOutcome::Completed("fine".to_string())]
    );
    assert_eq!(summary.outcomes[0].worker, WorkerId::from("ghost"));
}

#[tokio::test(start_paused = true)]
async fn foreign_completion_events_never_resolve_a_wait() {
    let hub = new_hub();
    let dispatcher = LocalDispatcher::new(hub.clone()).with_worker(WorkerId::from("A"), Arc::new(SilentWorker));
    let h = harness(&["A"], Ok(WEATHER.to_string()), dispatcher, hub.clone());

    let noise = tokio::spawn(async move {
        for i in 0..10 {
            tokio::time::sleep(Duration::from_secs(5)).await;
            hub.publish(CompletionEvent::new(
                "task.complete",
                TaskId::new(format!("someone-else-{i}")),
                json!("not yours"),
            ))
            .await;
        }
    });

    let summary = h.sequencer.execute_run(RunId::from("run-n"), "Beijing".into(), None).await;
    noise.await.unwrap();

    assert_eq!(summary.outcome_list(), vec![StepOutcome::TimedOut]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_for_the_same_city_stay_independent() {
    let hub = new_hub();
    let dispatcher = LocalDispatcher::new(hub.clone())
        .with_worker(WorkerId::from("A"), Arc::new(AnsweringWorker("a-done")))
        .with_worker(WorkerId::from("B"), Arc::new(AnsweringWorker("b-done")));
    let h = harness(&["A", "B"], Ok(WEATHER.to_string()), dispatcher, hub);

    let first = h.sequencer.spawn_run("Beijing", None).unwrap();
    let second = h.sequencer.spawn_run("Beijing", None).unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(h.sequencer.active_runs(), 2);

    let first = first.join.await.unwrap().unwrap();
    let second = second.join.await.unwrap().unwrap();

    let expected = vec![
        StepOutcome::Completed("a-done".to_string()),
        StepOutcome::Completed("b-done".to_string()),
    ];
    assert_eq!(first.outcome_list(), expected);
    assert_eq!(second.outcome_list(), expected);

    // Two enrichment reports plus two step reports per run
    assert_eq!(h.reporter.texts().len(), 6);
    h.sequencer.wait_for_idle().await;
    assert_eq!(h.sequencer.metrics().snapshot().runs_finished, 2);
}
