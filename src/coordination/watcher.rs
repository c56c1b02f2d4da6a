//! Completion event stream and the watcher that waits on it.
//!
//! `EventHub` fans events out over a tokio broadcast channel and also retains
//! recently published events in a moka cache keyed by `(task_id, event_name)`.
//! A wait subscribes first and then consults the cache, so an event published
//! between delegation and the start of the wait still resolves it. Each wait
//! owns its own receiver: dropping or cancelling the wait drops the
//! subscription with it.

use crate::coordination::errors::WatchError;
use crate::coordination::traits::CompletionWatcher;
use crate::coordination::types::{AcceptedEvents, Completion, CompletionEvent, TaskId};
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

type RetentionKey = (TaskId, String);

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<CompletionEvent>,
    retained: Cache<RetentionKey, CompletionEvent>,
}

impl EventHub {
    pub fn new(channel_capacity: usize, retention: Duration) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        let retained = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(retention)
            .build();
        Self { sender, retained }
    }

    /// Publish an event to every live wait. Returns how many subscribers saw it.
    pub async fn publish(&self, event: CompletionEvent) -> usize {
        let key = (event.task_id().clone(), event.event_name.clone());
        // First delivery wins; a re-delivered event never replaces what a
        // later wait would observe.
        self.retained
            .get_with(key, async { event.clone() })
            .await;

        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        debug!(
            task_id = %event.task_id(),
            event_name = %event.event_name,
            receivers,
            "Published completion event"
        );
        receivers
    }

    /// Number of waits currently subscribed
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    async fn retained_match(&self, task_id: &TaskId, accepted: &AcceptedEvents) -> Option<CompletionEvent> {
        for name in accepted.iter() {
            let key = (task_id.clone(), name.to_string());
            if let Some(event) = self.retained.get(&key).await {
                return Some(event);
            }
        }
        None
    }

    async fn next_match(
        &self,
        receiver: &mut broadcast::Receiver<CompletionEvent>,
        task_id: &TaskId,
        accepted: &AcceptedEvents,
    ) -> Result<CompletionEvent, WatchError> {
        if let Some(event) = self.retained_match(task_id, accepted).await {
            return Ok(event);
        }

        loop {
            match receiver.recv().await {
                Ok(event) if event.task_id() == task_id && accepted.matches(&event.event_name) => {
                    return Ok(event);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(task_id = %task_id, skipped, "Completion watcher lagged behind the event stream");
                    if let Some(event) = self.retained_match(task_id, accepted).await {
                        return Ok(event);
                    }
                }
                Err(RecvError::Closed) => return Err(WatchError::StreamClosed),
            }
        }
    }
}

#[async_trait]
impl CompletionWatcher for EventHub {
    async fn wait_for_completion(
        &self,
        task_id: &TaskId,
        accepted: &AcceptedEvents,
        timeout: Duration,
    ) -> Result<Completion, WatchError> {
        // Subscribe before looking at retained events so nothing slips between.
        let mut receiver = self.sender.subscribe();
        info!(task_id = %task_id, timeout_secs = timeout.as_secs(), "Watching task");

        match tokio::time::timeout(timeout, self.next_match(&mut receiver, task_id, accepted)).await {
            Ok(Ok(event)) => {
                info!(task_id = %task_id, event_name = %event.event_name, "Task completed");
                Ok(Completion::Completed(event.result_text()))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Ok(Completion::TimedOut),
        }
    }
}
