//! A broadcast bus of worker lifecycle events.
//!
//! Presentation code, a future supervisory layer, or just a CLI status
//! line can subscribe without coupling to worker internals; a lagging
//! subscriber simply misses older events rather than blocking a worker —
//! the standard trade-off of a `tokio::sync::broadcast` channel.

use tokio::sync::broadcast;

use crate::core::grabber::GrabberStatus;

/// Default channel capacity; generous enough that a subscriber doing a
/// bit of I/O (e.g. printing a status line) won't lag under normal load.
const CHANNEL_CAPACITY: usize = 256;

/// A worker lifecycle or frame-arrival transition, identified by the
/// source's configured name.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Connecting { source: String },
    Connected { source: String },
    Disconnected { source: String, reason: String },
    /// Coarse frame arrival notice for UI counters — never the frame
    /// bytes themselves, which stay inside the worker's own callback.
    FrameReceived {
        source: String,
        frame_id: u64,
        len: usize,
    },
    Stopped { source: String, status: GrabberStatus },
}

/// Thin wrapper around a `tokio::sync::broadcast` channel.
pub struct EventBus {
    sender: broadcast::Sender<WorkerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Returns the number of active subscribers that
    /// received it; `0` if nobody is currently listening.
    pub fn publish(&self, event: WorkerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(WorkerEvent::Connecting {
            source: "front-door".to_string(),
        });
        match rx.recv().await.unwrap() {
            WorkerEvent::Connecting { source } => assert_eq!(source, "front-door"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        assert_eq!(
            bus.publish(WorkerEvent::Connected { source: "x".into() }),
            0
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_their_own_copy() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(WorkerEvent::Stopped {
            source: "cam".to_string(),
            status: GrabberStatus::Success,
        });
        assert!(matches!(a.recv().await.unwrap(), WorkerEvent::Stopped { .. }));
        assert!(matches!(b.recv().await.unwrap(), WorkerEvent::Stopped { .. }));
    }
}
