//! Synchronization service
//!
//! The single place where persistence and broadcast meet. A record is only
//! broadcast after the store has committed it, and a broadcast failure never
//! undoes a committed write.

use std::future::Future;
use std::time::Duration;

use super::channel::{Broadcaster, EventReceiver};
use super::events::SyncEvent;
use crate::db::IncidentStore;
use crate::error::{Error, Result};
use crate::models::{IncidentCandidate, IncidentRecord, Validator};

/// Default bound on a single store operation
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinates the incident store and the broadcast channel
#[derive(Clone)]
pub struct SyncService<S> {
    store: S,
    broadcaster: Broadcaster,
    validator: Validator,
    store_timeout: Duration,
}

impl<S: IncidentStore> SyncService<S> {
    pub fn new(store: S, broadcaster: Broadcaster) -> Self {
        Self {
            store,
            broadcaster,
            validator: Validator::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate, persist and announce a new incident.
    ///
    /// Validation and store failures are returned without publishing.
    pub async fn submit(&self, candidate: &IncidentCandidate) -> Result<IncidentRecord> {
        let incident = self.validator.validate(candidate)?;
        let record = self
            .bounded("insert", self.store.insert(incident))
            .await?;

        self.publish(SyncEvent::IncidentAdded {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Remove every incident and announce it. Returns the number removed.
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.bounded("clear_all", self.store.clear_all()).await?;
        self.publish(SyncEvent::AllCleared);
        Ok(removed)
    }

    /// Authoritative snapshot, newest first
    pub async fn list_all(&self) -> Result<Vec<IncidentRecord>> {
        self.bounded("list_all", self.store.list_all()).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.bounded("count", self.store.count()).await
    }

    /// Receive events published after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.broadcaster.subscribe()
    }

    fn publish(&self, event: SyncEvent) {
        let kind = event.kind();
        match self.broadcaster.publish(event) {
            Ok(receivers) => tracing::debug!(kind, receivers, "Published sync event"),
            Err(error) => tracing::debug!(kind, %error, "Sync event not delivered"),
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.store_timeout, future).await {
            Ok(result) => {
                if let Err(error) = &result {
                    tracing::warn!(operation, %error, "Store operation failed");
                }
                result
            }
            Err(_) => {
                let message = format!(
                    "{operation} timed out after {}ms",
                    self.store_timeout.as_millis()
                );
                tracing::warn!("Store operation {}", message);
                Err(Error::StoreUnavailable(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LibSqlIncidentStore;
    use crate::models::{IncidentCategory, NewIncident, ValidationError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn candidate() -> IncidentCandidate {
        IncidentCandidate {
            location_name: Some("Victoria Park".to_string()),
            position: Some(json!([22.2820, 114.1902])),
            reporter_name: Some("runner".to_string()),
            description: Some("Poison in a corner of the park".to_string()),
            category: Some("poisoning-alert".to_string()),
            contact_info: Some("runner@example.com".to_string()),
            image_data: None,
        }
    }

    async fn setup() -> (SyncService<LibSqlIncidentStore>, EventReceiver) {
        let store = LibSqlIncidentStore::open_in_memory().await.unwrap();
        let service = SyncService::new(store, Broadcaster::new(16));
        let rx = service.subscribe();
        (service, rx)
    }

    /// Store whose every operation fails as if the backend were down
    struct UnreachableStore;

    impl IncidentStore for UnreachableStore {
        async fn list_all(&self) -> Result<Vec<IncidentRecord>> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn insert(&self, _incident: NewIncident) -> Result<IncidentRecord> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn clear_all(&self) -> Result<u64> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn count(&self) -> Result<u64> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }
    }

    /// Store that never answers within any reasonable time
    struct StalledStore;

    impl IncidentStore for StalledStore {
        async fn list_all(&self) -> Result<Vec<IncidentRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn insert(&self, incident: NewIncident) -> Result<IncidentRecord> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(incident.into_record(crate::models::IncidentId::new(), 0))
        }

        async fn clear_all(&self) -> Result<u64> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0)
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_persists_then_publishes_once() {
        let (service, mut rx) = setup().await;

        let record = service.submit(&candidate()).await.unwrap();
        assert_eq!(record.location_name, "Victoria Park");
        assert_eq!(record.category, IncidentCategory::PoisoningAlert);
        assert_eq!(record.contact_info.as_deref(), Some("runner@example.com"));
        assert!(record.created_at > 0);
        assert_eq!(service.count().await.unwrap(), 1);

        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::IncidentAdded {
                record: record.clone()
            }
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_field_touches_nothing() {
        let (service, mut rx) = setup().await;
        let mut input = candidate();
        input.description = None;

        let error = service.submit(&input).await.unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::MissingField("description"))
        ));
        assert_eq!(service.count().await.unwrap(), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_bounds_touches_nothing() {
        let (service, mut rx) = setup().await;
        let mut input = candidate();
        input.position = Some(json!([25.0, 114.1]));

        let error = service.submit(&input).await.unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::InvalidCoordinate(_))
        ));
        assert_eq!(service.count().await.unwrap(), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_without_listeners_still_succeeds() {
        let store = LibSqlIncidentStore::open_in_memory().await.unwrap();
        let service = SyncService::new(store, Broadcaster::default());

        service.submit(&candidate()).await.unwrap();
        assert_eq!(service.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_empties_store_and_publishes_each_time() {
        let (service, mut rx) = setup().await;
        service.submit(&candidate()).await.unwrap();
        service.submit(&candidate()).await.unwrap();
        while rx.try_recv().is_ok() {}

        assert_eq!(service.clear().await.unwrap(), 2);
        assert_eq!(service.count().await.unwrap(), 0);
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::AllCleared);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        assert_eq!(service.clear().await.unwrap(), 0);
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::AllCleared);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_failure_publishes_nothing() {
        let service = SyncService::new(UnreachableStore, Broadcaster::new(4));
        let mut rx = service.subscribe();

        let error = service.submit(&candidate()).await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));

        let error = service.clear().await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stalled_store_times_out_as_unavailable() {
        let service = SyncService::new(StalledStore, Broadcaster::new(4))
            .with_store_timeout(Duration::from_millis(50));
        let mut rx = service.subscribe();

        let error = service.submit(&candidate()).await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));
        assert!(error.is_retryable());
        assert!(service.list_all().await.is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_rejection_is_surfaced_and_not_published() {
        let store = LibSqlIncidentStore::open_in_memory().await.unwrap();
        // Lenient bounds let an impossible latitude reach the store's CHECK constraint.
        let validator = Validator::new(
            crate::models::RegionBounds {
                lat_min: -1000.0,
                lat_max: 1000.0,
                lng_min: -1000.0,
                lng_max: 1000.0,
            },
            1024,
        );
        let service = SyncService::new(store, Broadcaster::new(4)).with_validator(validator);
        let mut rx = service.subscribe();

        let mut input = candidate();
        input.position = Some(json!([95.0, 114.1]));
        let error = service.submit(&input).await.unwrap_err();
        assert!(matches!(error, Error::ValidationRejected(_)));
        assert_eq!(service.count().await.unwrap(), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
