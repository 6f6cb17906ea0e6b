//! Incident record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a persisted incident, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentId(Uuid);

impl IncidentId {
    /// Create a new unique incident ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IncidentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Closed set of incident kinds, keyed by neutral codes.
///
/// Display labels and decorations belong to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IncidentCategory {
    /// Sighting or general welfare concern
    #[default]
    GeneralReport,
    /// Suspected poison or bait targeting animals
    PoisoningAlert,
    /// Witnessed abuse or cruelty
    AbuseReport,
}

impl IncidentCategory {
    /// Every category, in presentation order
    pub const ALL: [Self; 3] = [Self::GeneralReport, Self::PoisoningAlert, Self::AbuseReport];

    /// Stable wire/storage code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeneralReport => "general-report",
            Self::PoisoningAlert => "poisoning-alert",
            Self::AbuseReport => "abuse-report",
        }
    }
}

impl fmt::Display for IncidentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown incident category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for IncidentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| UnknownCategory(code.to_string()))
    }
}

/// A latitude/longitude pair, serialized as a two-element array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl Position {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<[f64; 2]> for Position {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.latitude, position.longitude]
    }
}

/// A validated incident that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub location_name: String,
    pub position: Position,
    pub reporter_name: String,
    pub description: String,
    pub category: IncidentCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl NewIncident {
    /// Attach the identity assigned at persistence time
    #[must_use]
    pub fn into_record(self, id: IncidentId, created_at: i64) -> IncidentRecord {
        IncidentRecord {
            id,
            location_name: self.location_name,
            position: self.position,
            reporter_name: self.reporter_name,
            description: self.description,
            category: self.category,
            contact_info: self.contact_info,
            image_data: self.image_data,
            created_at,
        }
    }

    /// Whether a stored record carries exactly this content
    #[must_use]
    pub fn matches(&self, record: &IncidentRecord) -> bool {
        self.location_name == record.location_name
            && self.position == record.position
            && self.reporter_name == record.reporter_name
            && self.description == record.description
            && self.category == record.category
            && self.contact_info == record.contact_info
            && self.image_data == record.image_data
    }
}

/// A persisted incident report. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Unique identifier assigned by the store
    pub id: IncidentId,
    /// Human-readable place label
    pub location_name: String,
    /// Where the incident happened
    pub position: Position,
    /// Free-text identifier of the submitter
    pub reporter_name: String,
    /// Free-text narrative
    pub description: String,
    /// Incident kind
    pub category: IncidentCategory,
    /// Optional contact channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    /// Optional embedded image (opaque data URI or URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    /// Persistence timestamp (Unix ms)
    pub created_at: i64,
}

impl IncidentRecord {
    /// The content of this record without its persisted identity
    #[must_use]
    pub fn content(&self) -> NewIncident {
        NewIncident {
            location_name: self.location_name.clone(),
            position: self.position,
            reporter_name: self.reporter_name.clone(),
            description: self.description.clone(),
            category: self.category,
            contact_info: self.contact_info.clone(),
            image_data: self.image_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewIncident {
        NewIncident {
            location_name: "Central".to_string(),
            position: Position::new(22.2783, 114.1747),
            reporter_name: "volunteer".to_string(),
            description: "Several stray cats gathering".to_string(),
            category: IncidentCategory::GeneralReport,
            contact_info: None,
            image_data: None,
        }
    }

    #[test]
    fn test_incident_id_unique_and_parse() {
        let id1 = IncidentId::new();
        let id2 = IncidentId::new();
        assert_ne!(id1, id2);

        let parsed: IncidentId = id1.as_str().parse().unwrap();
        assert_eq!(id1, parsed);
    }

    #[test]
    fn test_category_codes() {
        assert_eq!(
            "poisoning-alert".parse::<IncidentCategory>().unwrap(),
            IncidentCategory::PoisoningAlert
        );
        assert_eq!(
            " Abuse-Report ".parse::<IncidentCategory>().unwrap(),
            IncidentCategory::AbuseReport
        );
        assert!("poison".parse::<IncidentCategory>().is_err());
        assert_eq!(
            serde_json::to_string(&IncidentCategory::GeneralReport).unwrap(),
            "\"general-report\""
        );
    }

    #[test]
    fn test_record_wire_shape() {
        let record = sample().into_record(IncidentId::new(), 1_700_000_000_000);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["locationName"], "Central");
        assert_eq!(value["position"][0], 22.2783);
        assert_eq!(value["position"][1], 114.1747);
        assert_eq!(value["category"], "general-report");
        assert_eq!(value["createdAt"], 1_700_000_000_000_i64);
        assert!(value.get("contactInfo").is_none());
    }

    #[test]
    fn test_matches_compares_content_only() {
        let incident = sample();
        let record = incident.clone().into_record(IncidentId::new(), 1);
        assert!(incident.matches(&record));
        assert_eq!(record.content(), incident);

        let mut other = incident;
        other.description = "Different".to_string();
        assert!(!other.matches(&record));
    }
}
