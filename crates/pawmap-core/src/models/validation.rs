//! Candidate validation
//!
//! Clients send an [`IncidentCandidate`] with loosely-typed fields. The
//! [`Validator`] turns it into a [`NewIncident`] or reports the first problem
//! it finds.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::incident::{IncidentCategory, NewIncident, Position};
use crate::util::normalize_text_option;

/// Default hard upper bound for inline image payloads (5 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Client-correctable problems with a submitted candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Image data is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },
}

impl ValidationError {
    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing-field",
            Self::InvalidCoordinate(_) => "invalid-coordinate",
            Self::InvalidCategory(_) => "invalid-category",
            Self::ImageTooLarge { .. } => "image-too-large",
        }
    }
}

/// Unvalidated submission as received from a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentCandidate {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub position: Option<Value>,
    #[serde(default)]
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl From<&NewIncident> for IncidentCandidate {
    fn from(incident: &NewIncident) -> Self {
        Self {
            location_name: Some(incident.location_name.clone()),
            position: Some(Value::from(vec![
                incident.position.latitude,
                incident.position.longitude,
            ])),
            reporter_name: Some(incident.reporter_name.clone()),
            description: Some(incident.description.clone()),
            category: Some(incident.category.as_str().to_string()),
            contact_info: incident.contact_info.clone(),
            image_data: incident.image_data.clone(),
        }
    }
}

/// Inclusive geographic bounding box for accepted positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl RegionBounds {
    /// Hong Kong service area
    pub const HONG_KONG: Self = Self {
        lat_min: 22.1,
        lat_max: 22.6,
        lng_min: 113.8,
        lng_max: 114.5,
    };

    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        (self.lat_min..=self.lat_max).contains(&position.latitude)
            && (self.lng_min..=self.lng_max).contains(&position.longitude)
    }
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self::HONG_KONG
    }
}

/// Validation rules for incident candidates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validator {
    bounds: RegionBounds,
    max_image_bytes: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(RegionBounds::default(), DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl Validator {
    #[must_use]
    pub const fn new(bounds: RegionBounds, max_image_bytes: usize) -> Self {
        Self {
            bounds,
            max_image_bytes,
        }
    }

    #[must_use]
    pub const fn bounds(&self) -> RegionBounds {
        self.bounds
    }

    #[must_use]
    pub const fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Validate a candidate, returning the normalized incident.
    ///
    /// Required fields are checked first (in wire order), then the position,
    /// the category and finally the image size.
    pub fn validate(&self, candidate: &IncidentCandidate) -> Result<NewIncident, ValidationError> {
        let location_name = required_text(candidate.location_name.as_deref(), "locationName")?;
        let reporter_name = required_text(candidate.reporter_name.as_deref(), "reporterName")?;
        let description = required_text(candidate.description.as_deref(), "description")?;
        let raw_position = candidate
            .position
            .as_ref()
            .filter(|value| !is_blank(value))
            .ok_or(ValidationError::MissingField("position"))?;
        let raw_category = required_text(candidate.category.as_deref(), "category")?;

        let position = self.parse_position(raw_position)?;
        let category = raw_category
            .parse::<IncidentCategory>()
            .map_err(|error| ValidationError::InvalidCategory(error.0))?;

        let image_data = normalize_text_option(candidate.image_data.clone());
        if let Some(image) = image_data.as_deref() {
            if image.len() > self.max_image_bytes {
                return Err(ValidationError::ImageTooLarge {
                    size: image.len(),
                    limit: self.max_image_bytes,
                });
            }
        }

        Ok(NewIncident {
            location_name,
            position,
            reporter_name,
            description,
            category,
            contact_info: normalize_text_option(candidate.contact_info.clone()),
            image_data,
        })
    }

    fn parse_position(&self, value: &Value) -> Result<Position, ValidationError> {
        let Value::Array(values) = value else {
            return Err(ValidationError::InvalidCoordinate(
                "position must be a [latitude, longitude] array".to_string(),
            ));
        };
        let [latitude, longitude] = values.as_slice() else {
            return Err(ValidationError::InvalidCoordinate(format!(
                "position must have exactly 2 components, got {}",
                values.len()
            )));
        };
        let position = Position::new(
            coordinate(latitude, "latitude")?,
            coordinate(longitude, "longitude")?,
        );

        if !self.bounds.contains(position) {
            let bounds = self.bounds;
            return Err(ValidationError::InvalidCoordinate(format!(
                "({}, {}) is outside latitude [{}, {}] / longitude [{}, {}]",
                position.latitude,
                position.longitude,
                bounds.lat_min,
                bounds.lat_max,
                bounds.lng_min,
                bounds.lng_max
            )));
        }
        Ok(position)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(values) => values.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
        .ok_or(ValidationError::MissingField(field))
}

fn coordinate(value: &Value, axis: &str) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|number| number.is_finite())
        .ok_or_else(|| ValidationError::InvalidCoordinate(format!("{axis} is not a number")))
}
