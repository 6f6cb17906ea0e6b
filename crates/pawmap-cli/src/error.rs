use std::io;

use pawmap_core::client::ApiError;
use pawmap_core::models::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pawmap_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid report: {0}")]
    InvalidReport(#[from] ValidationError),
    #[error("Image file is empty: {0}")]
    EmptyImage(String),
    #[error("Clear aborted")]
    ClearAborted,
    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,
}
