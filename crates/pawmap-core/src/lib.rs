//! pawmap-core - Core library for Pawmap
//!
//! This crate contains the incident model, validation, the libsql store, the
//! server-side synchronization service and the client-side cache and HTTP
//! client shared by the API server and the CLI.

pub mod cache;
pub mod client;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{IncidentCategory, IncidentId, IncidentRecord, NewIncident, Position};
