//! Server-side synchronization: validation, persistence and fan-out.

mod channel;
mod events;
mod service;

pub use channel::{Broadcaster, EventReceiver, PublishError, DEFAULT_BROADCAST_CAPACITY};
pub use events::SyncEvent;
pub use service::{SyncService, DEFAULT_STORE_TIMEOUT};
