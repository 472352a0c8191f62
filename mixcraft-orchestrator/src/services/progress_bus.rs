//! Progress Bus (C11)
//!
//! Per-session `tokio::broadcast` registry so SSE clients can subscribe to
//! one session's progress without seeing any other session's events.
//! Delivery is best-effort: a client that isn't subscribed when an event
//! fires simply misses it and must rely on the status endpoint (§4.11).

use mixcraft_common::events::ProgressEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// Registry of per-session broadcast channels.
pub struct ProgressBus {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Publish an event for `session_id`, creating its channel on first use.
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let sender = self.sender_for(event.session_id);
        match sender.send(event) {
            Ok(n) => n,
            Err(_) => {
                debug!("Progress event published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to one session's progress stream.
    pub fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<ProgressEvent> {
        self.sender_for(session_id).subscribe()
    }

    /// Drop the channel for a finished session so memory doesn't grow
    /// unbounded across the orchestrator's lifetime.
    pub fn retire(&self, session_id: Uuid) {
        self.channels.lock().unwrap().remove(&session_id);
    }

    fn sender_for(&self, session_id: Uuid) -> broadcast::Sender<ProgressEvent> {
        self.channels
            .lock()
            .unwrap()
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixcraft_common::models::SessionPhase;

    #[test]
    fn subscriber_receives_published_event() {
        let bus = ProgressBus::new();
        let session_id = Uuid::new_v4();
        let mut rx = bus.subscribe(session_id);

        let sent = bus.publish(ProgressEvent::new(session_id, SessionPhase::Analyzing, "starting"));
        assert_eq!(sent, 1);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.session_id, session_id);
    }

    #[test]
    fn publish_with_no_subscribers_returns_zero() {
        let bus = ProgressBus::new();
        let session_id = Uuid::new_v4();
        let sent = bus.publish(ProgressEvent::new(session_id, SessionPhase::Rendering, "x"));
        assert_eq!(sent, 0);
    }

    #[test]
    fn sessions_are_isolated() {
        let bus = ProgressBus::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = bus.subscribe(a);
        let _rx_b = bus.subscribe(b);

        bus.publish(ProgressEvent::new(b, SessionPhase::Sequencing, "for b"));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn retire_drops_the_channel() {
        let bus = ProgressBus::new();
        let session_id = Uuid::new_v4();
        let _rx = bus.subscribe(session_id);
        bus.retire(session_id);
        assert_eq!(bus.channels.lock().unwrap().len(), 0);
    }
}
