//! In-process fan-out of sync events
//!
//! Subscribers only see events published after they subscribe. There is no
//! replay; clients recover gaps with a full refresh.

use thiserror::Error;
use tokio::sync::broadcast;

use super::events::SyncEvent;

/// Default number of events buffered per subscriber
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("no subscribers are listening")]
    NoSubscribers,
}

/// Receiving half handed to each subscriber
pub type EventReceiver = broadcast::Receiver<SyncEvent>;

/// Publish/subscribe topic for [`SyncEvent`]s
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl Broadcaster {
    /// Create a topic that buffers up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver an event to every current subscriber without blocking.
    ///
    /// Returns how many subscribers the event was queued for.
    pub fn publish(&self, event: SyncEvent) -> Result<usize, PublishError> {
        self.tx
            .send(event)
            .map_err(|_| PublishError::NoSubscribers)
    }

    /// Start receiving events published from now on
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
