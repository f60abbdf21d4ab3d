//! Event types for the CubeTriggers event system
//!
//! Provides shared event definitions and the EventBus used by the import
//! orchestrator and the aggregate engine. The bus is an explicitly
//! constructed instance passed in as a dependency; there is no
//! module-level singleton.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// CubeTriggers event types
///
/// Events are broadcast via EventBus and can be serialized for SSE or
/// websocket transmission by an outer query surface. All payloads carry a
/// UTC timestamp so listeners never have to guess at ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TriggerEvent {
    /// Periodic progress update while an import run is processing
    ///
    /// Emitted on entry to PROCESSING and then batched (every N processed
    /// algorithms, N from config). Percentage is in [0, 100]:
    /// parsing/setup occupy the first 5%, processing maps onto the
    /// remaining 90% as `floor(processed/total * 90) + 5`.
    ImportProgress {
        /// Import run this progress belongs to
        import_run_id: Uuid,
        /// Total algorithms parsed from the import text
        total_algorithms: usize,
        /// Algorithms persisted so far
        processed_algorithms: usize,
        /// Original (pre-normalization) text of the most recent algorithm
        current_algorithm: Option<String>,
        /// Human-readable status line
        status: String,
        /// Percentage complete (0 - 100)
        percentage: u8,
        /// When this update was produced
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Import run reached COMPLETED
    ImportCompleted {
        import_run_id: Uuid,
        total_algorithms: usize,
        processed_algorithms: usize,
        /// Canonical Ngram rows created for the first time by this run
        new_triggers_count: usize,
        /// Wall-clock duration of the run in milliseconds
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Import run reached FAILED
    ImportFailed {
        import_run_id: Uuid,
        /// Error message recorded on the ImportRun
        message: String,
        processed_algorithms: usize,
        total_algorithms: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Aggregate recomputation finished; trigger statistics changed
    TriggersUpdated {
        /// Source whose import caused the recomputation, if known
        source_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TriggerEvent {
    /// Event type name for logging and wire framing
    pub fn event_type(&self) -> &'static str {
        match self {
            TriggerEvent::ImportProgress { .. } => "ImportProgress",
            TriggerEvent::ImportCompleted { .. } => "ImportCompleted",
            TriggerEvent::ImportFailed { .. } => "ImportFailed",
            TriggerEvent::TriggersUpdated { .. } => "TriggersUpdated",
        }
    }
}

/// Central event distribution bus for core events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// Delivery to zero listeners is acceptable; publishers use `emit_lossy`
/// for all progress traffic.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TriggerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow
    /// subscribers start lagging. 100-1000 is reasonable for a worker
    /// process; tests use 10-100.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TriggerEvent,
    ) -> Result<usize, broadcast::error::SendError<TriggerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress/completion/failure publications are fire-and-forget; the
    /// orchestrator never blocks or fails on delivery.
    pub fn emit_lossy(&self, event: TriggerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_event() -> TriggerEvent {
        TriggerEvent::ImportProgress {
            import_run_id: Uuid::new_v4(),
            total_algorithms: 40,
            processed_algorithms: 10,
            current_algorithm: Some("R U R' U'".to_string()),
            status: "Processing algorithm 10/40".to_string(),
            percentage: 27,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(progress_event()).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "ImportProgress");
    }

    #[test]
    fn emit_lossy_with_no_subscribers_is_silent() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        // Must not panic or block
        bus.emit_lossy(progress_event());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_events() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let subscribers = bus.emit(progress_event()).unwrap();
        assert_eq!(subscribers, 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "ImportProgress");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "ImportProgress");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(progress_event()).unwrap();
        assert_eq!(json["type"], "ImportProgress");
        assert_eq!(json["total_algorithms"], 40);
    }
}
