// file: src/pipeline/progress.rs
// description: per-batch progress broadcasting and cooperative stop flags

use crate::models::BatchId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Severity attached to live log events, mirroring what the UI renders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the orchestrator reports while a batch runs. Closed set so
/// every subscriber has to handle the full vocabulary; payload field names
/// serialize in the wire shape transports expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BatchEvent {
    Log {
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: String,
    },
    Progress {
        current: usize,
        total: usize,
        current_process: String,
        success_count: u32,
        error_count: u32,
        warning_count: u32,
    },
    Complete {
        success_count: u32,
        error_count: u32,
        warning_count: u32,
    },
    Stopped {
        message: String,
    },
    Error {
        message: String,
    },
}

#[derive(Clone)]
struct BatchChannel {
    sender: broadcast::Sender<BatchEvent>,
    stop: Arc<AtomicBool>,
}

/// Fan-out hub decoupling the orchestrator from transport delivery, plus
/// the per-batch cooperative stop flag. One instance is injected wherever
/// it is needed; there is no process-wide singleton, so tests get isolated
/// buses.
///
/// Delivery is best-effort: a subscriber that lags past the channel
/// capacity loses the oldest events, and a batch with no subscribers
/// publishes into the void. Neither situation affects the batch. For one
/// batch, events arrive in exactly the order the orchestrator emits them
/// (single producer).
pub struct ProgressBus {
    capacity: usize,
    channels: Mutex<HashMap<BatchId, BatchChannel>>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channel(&self, batch_id: BatchId) -> BatchChannel {
        let mut channels = self.channels.lock().expect("progress bus lock poisoned");
        channels
            .entry(batch_id)
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(self.capacity);
                BatchChannel {
                    sender,
                    stop: Arc::new(AtomicBool::new(false)),
                }
            })
            .clone()
    }

    /// Registers a delivery sink for a batch. The receiver owns its own
    /// lifecycle; dropping it is all the cleanup a subscriber needs.
    pub fn subscribe(&self, batch_id: BatchId) -> broadcast::Receiver<BatchEvent> {
        self.channel(batch_id).sender.subscribe()
    }

    /// Fans an event out to every current subscriber of the batch.
    pub fn publish(&self, batch_id: BatchId, event: BatchEvent) {
        let channel = self.channel(batch_id);
        if channel.sender.send(event).is_err() {
            debug!("no subscribers for batch {}, event dropped", batch_id);
        }
    }

    /// Convenience for the most common event kind.
    pub fn log(&self, batch_id: BatchId, level: LogLevel, message: impl Into<String>) {
        self.publish(
            batch_id,
            BatchEvent::Log {
                timestamp: Utc::now(),
                level,
                message: message.into(),
            },
        );
    }

    /// Asks the batch to stop after the process currently executing.
    pub fn request_stop(&self, batch_id: BatchId) {
        self.channel(batch_id).stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self, batch_id: BatchId) -> bool {
        let channels = self.channels.lock().expect("progress bus lock poisoned");
        channels
            .get(&batch_id)
            .map(|channel| channel.stop.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Tears down the batch's channel: current subscribers observe a
    /// closed stream and the stop flag is cleared.
    pub fn close(&self, batch_id: BatchId) {
        let mut channels = self.channels.lock().expect("progress bus lock poisoned");
        channels.remove(&batch_id);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let bus = ProgressBus::default();
        let mut first = bus.subscribe(1);
        let mut second = bus.subscribe(1);

        bus.log(1, LogLevel::Info, "starting");
        bus.publish(
            1,
            BatchEvent::Progress {
                current: 1,
                total: 3,
                current_process: "0005757-95.2025.8.09.0051".to_string(),
                success_count: 0,
                error_count: 0,
                warning_count: 0,
            },
        );

        for rx in [&mut first, &mut second] {
            assert!(matches!(rx.try_recv().unwrap(), BatchEvent::Log { .. }));
            assert!(matches!(rx.try_recv().unwrap(), BatchEvent::Progress { .. }));
        }
    }

    #[test]
    fn test_batches_are_isolated() {
        let bus = ProgressBus::default();
        let mut other = bus.subscribe(2);

        bus.log(1, LogLevel::Info, "only for batch 1");

        assert!(matches!(other.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = ProgressBus::default();
        bus.log(99, LogLevel::Error, "nobody listening");
    }

    #[test]
    fn test_stop_flag_roundtrip() {
        let bus = ProgressBus::default();
        assert!(!bus.should_stop(5));

        bus.request_stop(5);
        assert!(bus.should_stop(5));

        bus.close(5);
        assert!(!bus.should_stop(5));
    }

    #[test]
    fn test_close_terminates_subscribers() {
        let bus = ProgressBus::default();
        let mut rx = bus.subscribe(3);

        bus.close(3);

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = BatchEvent::Progress {
            current: 2,
            total: 5,
            current_process: "0005757-95.2025.8.09.0051".to_string(),
            success_count: 1,
            error_count: 0,
            warning_count: 0,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["currentProcess"], "0005757-95.2025.8.09.0051");
        assert_eq!(json["successCount"], 1);
    }
}
