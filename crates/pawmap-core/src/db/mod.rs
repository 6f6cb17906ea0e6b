//! Database layer for Pawmap

mod connection;
mod migrations;
mod repository;
mod seed;

pub use connection::{Database, IN_MEMORY_PATH};
pub use repository::{IncidentStore, LibSqlIncidentStore};
pub use seed::sample_incidents;
