//! Registration event dispatch.
//!
//! Registration hands events to a bounded queue drained by a single
//! background task. Delivery is at-most-once and best-effort: a full queue
//! or a failing sink never fails the registration, it only shows up in the
//! logs and the `dropped`/`failed` counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserRegisteredEvent {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum EventError {
    Serialization(String),
    Publish(String),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Serialization(msg) => write!(f, "event serialization failed: {}", msg),
            EventError::Publish(msg) => write!(f, "event publish failed: {}", msg),
        }
    }
}

impl std::error::Error for EventError {}

/// Destination for registration events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), EventError>;
}

/// Publishes each event as JSON on a Redis pub/sub channel
pub struct RedisEventSink {
    pool: Pool,
    channel: String,
}

impl RedisEventSink {
    pub fn new(pool: Pool, channel: String) -> Self {
        Self { pool, channel }
    }
}

#[async_trait]
impl EventSink for RedisEventSink {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), EventError> {
        let message =
            serde_json::to_string(event).map_err(|e| EventError::Serialization(e.to_string()))?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| EventError::Publish(e.to_string()))?;

        let _: () = conn
            .publish(&self.channel, &message)
            .await
            .map_err(|e| EventError::Publish(e.to_string()))?;

        tracing::debug!(channel = %self.channel, user_id = %event.user_id, "Published user.registered event");
        Ok(())
    }
}

/// Writes events to the structured log, for deployments without a broker
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), EventError> {
        tracing::info!(
            user_id = %event.user_id,
            username = %event.username,
            "user.registered"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct EventStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<UserRegisteredEvent>,
    stats: Arc<EventStats>,
}

impl EventPublisher {
    /// Spawn the dispatch task on the current runtime.
    ///
    /// The task ends once every publisher clone has been dropped.
    pub fn start(sink: Arc<dyn EventSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(EventStats::default());
        let handle = tokio::spawn(dispatch(receiver, sink, stats.clone()));

        (Self { sender, stats }, handle)
    }

    /// Queue an event without waiting.
    pub fn publish_user_registered(&self, event: UserRegisteredEvent) {
        if let Err(e) = self.sender.try_send(event) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
            };
            tracing::warn!(reason, "Dropped user.registered event");
        }
    }

    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<UserRegisteredEvent>,
    sink: Arc<dyn EventSink>,
    stats: Arc<EventStats>,
) {
    while let Some(event) = receiver.recv().await {
        match tokio::time::timeout(PUBLISH_TIMEOUT, sink.publish(&event)).await {
            Ok(Ok(())) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(user_id = %event.user_id, error = %e, "Failed to publish user registered event");
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(user_id = %event.user_id, "Timed out publishing user registered event");
            }
        }
    }
    tracing::debug!("Event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<UserRegisteredEvent>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn publish(&self, _event: &UserRegisteredEvent) -> Result<(), EventError> {
            Err(EventError::Publish("broker unreachable".to_string()))
        }
    }

    fn event(n: u32) -> UserRegisteredEvent {
        UserRegisteredEvent {
            user_id: format!("user-{}", n),
            email: format!("user{}@example.com", n),
            username: format!("user{}", n),
            created_at: Utc::now(),
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_events_reach_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (publisher, _handle) = EventPublisher::start(sink.clone(), 8);

        publisher.publish_user_registered(event(1));
        publisher.publish_user_registered(event(2));

        wait_until(|| publisher.delivered() == 2).await;
        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].user_id, "user-1");
        assert_eq!(events[1].user_id, "user-2");
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let sink = Arc::new(RecordingSink::default());
        let (publisher, _handle) = EventPublisher::start(sink.clone(), 2);

        // The current-thread runtime cannot drain the queue before we yield
        for n in 0..5 {
            publisher.publish_user_registered(event(n));
        }
        assert_eq!(publisher.dropped(), 3);

        wait_until(|| publisher.delivered() == 2).await;
        assert_eq!(sink.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sink_failures_are_counted() {
        let (publisher, _handle) = EventPublisher::start(Arc::new(FailingSink), 8);

        publisher.publish_user_registered(event(1));

        wait_until(|| publisher.failed() == 1).await;
        assert_eq!(publisher.delivered(), 0);
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_publishers_are_gone() {
        let (publisher, handle) = EventPublisher::start(Arc::new(LogEventSink), 8);
        drop(publisher);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
    }
}
