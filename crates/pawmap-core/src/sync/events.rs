//! Change notifications fanned out to clients

use serde::{Deserialize, Serialize};

use crate::models::IncidentRecord;

/// A delta on the shared incident set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// A record was durably persisted
    IncidentAdded { record: IncidentRecord },
    /// Every record was removed
    AllCleared,
}

impl SyncEvent {
    pub const INCIDENT_ADDED: &'static str = "incident-added";
    pub const ALL_CLEARED: &'static str = "all-cleared";

    /// Wire name of this event kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::IncidentAdded { .. } => Self::INCIDENT_ADDED,
            Self::AllCleared => Self::ALL_CLEARED,
        }
    }
}
