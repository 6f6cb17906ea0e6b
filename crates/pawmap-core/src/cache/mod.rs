//! Client-side cache and reconciliation.

mod persistence;
mod reconciler;

pub use persistence::{CachePersistence, FileCacheStore, MemoryCacheStore, CACHE_KEY};
pub use reconciler::{ApplyOutcome, ClientCache, SessionState};
