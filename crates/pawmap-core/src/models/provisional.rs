//! Client-side optimistic records
//!
//! A report shows up locally before the server confirms it. Until then it is
//! a [`LocalIncident::Provisional`] keyed by a [`TempId`] that can never be
//! confused with a server-assigned [`IncidentId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::incident::{IncidentId, IncidentRecord, NewIncident};

const TEMP_ID_PREFIX: &str = "tmp-";

/// Locally generated identifier for a not-yet-confirmed incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TempId(Uuid);

impl TempId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TEMP_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for TempId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(TEMP_ID_PREFIX)
            .ok_or_else(|| format!("temporary id must start with '{TEMP_ID_PREFIX}'"))?;
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|error| error.to_string())
    }
}

impl TryFrom<String> for TempId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TempId> for String {
    fn from(id: TempId) -> Self {
        id.to_string()
    }
}

/// An incident created locally and awaiting server confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalIncident {
    pub temp_id: TempId,
    #[serde(flatten)]
    pub incident: NewIncident,
    /// Local creation time (Unix ms)
    pub created_at: i64,
}

impl ProvisionalIncident {
    #[must_use]
    pub fn new(incident: NewIncident) -> Self {
        Self {
            temp_id: TempId::new(),
            incident,
            created_at: crate::util::unix_millis_now(),
        }
    }
}

/// One entry of a client's local mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum LocalIncident {
    Provisional(ProvisionalIncident),
    Confirmed(IncidentRecord),
}

impl LocalIncident {
    /// Server identifier, when confirmed
    #[must_use]
    pub const fn id(&self) -> Option<IncidentId> {
        match self {
            Self::Provisional(_) => None,
            Self::Confirmed(record) => Some(record.id),
        }
    }

    /// Temporary identifier, when provisional
    #[must_use]
    pub const fn temp_id(&self) -> Option<TempId> {
        match self {
            Self::Provisional(provisional) => Some(provisional.temp_id),
            Self::Confirmed(_) => None,
        }
    }

    #[must_use]
    pub const fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    #[must_use]
    pub const fn as_confirmed(&self) -> Option<&IncidentRecord> {
        match self {
            Self::Provisional(_) => None,
            Self::Confirmed(record) => Some(record),
        }
    }

    /// Location label regardless of status
    #[must_use]
    pub fn location_name(&self) -> &str {
        match self {
            Self::Provisional(provisional) => &provisional.incident.location_name,
            Self::Confirmed(record) => &record.location_name,
        }
    }
}
