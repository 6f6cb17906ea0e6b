//! Data models for Pawmap

mod incident;
mod provisional;
mod validation;

pub use incident::{
    IncidentCategory, IncidentId, IncidentRecord, NewIncident, Position, UnknownCategory,
};
pub use provisional::{LocalIncident, ProvisionalIncident, TempId};
pub use validation::{
    IncidentCandidate, RegionBounds, ValidationError, Validator, DEFAULT_MAX_IMAGE_BYTES,
};
