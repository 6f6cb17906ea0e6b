//! HTTP client for the incident API.

mod sse;

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{IncidentRecord, NewIncident};
use crate::sync::SyncEvent;
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub use sse::{SseDecoder, SseMessage};

const PINS_PATH: &str = "/api/pins";
const EVENTS_PATH: &str = "/api/events";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(String),
    /// The server refused the request; retrying the same payload will not help
    #[error("Rejected by server: {message} ({code})")]
    Rejected { code: String, message: String },
    #[error("Server unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed server payload: {0}")]
    Protocol(String),
}

impl ApiError {
    /// Whether the same request may succeed later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Http(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Live events from `GET /api/events`
pub type EventStream = Pin<Box<dyn Stream<Item = ApiResult<SyncEvent>> + Send>>;

#[derive(Clone, Debug)]
pub struct IncidentApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl IncidentApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full authoritative set, newest first
    pub async fn list_all(&self) -> ApiResult<Vec<IncidentRecord>> {
        let response = self
            .client
            .get(self.url(PINS_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|error| ApiError::Protocol(error.to_string()))
    }

    /// Submit a report and return the persisted record
    pub async fn submit(&self, incident: &NewIncident) -> ApiResult<IncidentRecord> {
        let response = self
            .client
            .post(self.url(PINS_PATH))
            .header(header::ACCEPT, "application/json")
            .json(incident)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|error| ApiError::Protocol(error.to_string()))
    }

    /// Remove every incident; returns how many the server removed
    pub async fn clear(&self) -> ApiResult<u64> {
        let response = self
            .client
            .delete(self.url(PINS_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: ClearResponse = response
            .json()
            .await
            .map_err(|error| ApiError::Protocol(error.to_string()))?;
        Ok(body.removed)
    }

    /// Open the event stream. Only events published after this call are seen.
    pub async fn subscribe(&self) -> ApiResult<EventStream> {
        let response = self
            .client
            .get(self.url(EVENTS_PATH))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut decoder = SseDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .filter_map(decode_event)
                    .collect::<Vec<_>>(),
                Err(error) => vec![Err(ApiError::Http(error))],
            })
            .flat_map(futures::stream::iter);
        Ok(Box::pin(events))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct ClearResponse {
    removed: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    code: Option<String>,
}

async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

fn classify_failure(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|body| body.code.clone());
    let message = parsed
        .and_then(|body| body.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            let preview = compact_text(body);
            if preview.is_empty() {
                "empty response body".to_string()
            } else {
                preview
            }
        });

    if status.is_client_error() || code.as_deref() == Some("validation-rejected") {
        ApiError::Rejected {
            code: code.unwrap_or_else(|| "bad-request".to_string()),
            message,
        }
    } else {
        ApiError::Unavailable(format!("{message} ({})", status.as_u16()))
    }
}

fn decode_event(message: SseMessage) -> Option<ApiResult<SyncEvent>> {
    match message.event.as_str() {
        SyncEvent::INCIDENT_ADDED | SyncEvent::ALL_CLEARED | "message" => Some(
            serde_json::from_str(&message.data).map_err(|error| {
                ApiError::Protocol(format!("bad '{}' event: {error}", message.event))
            }),
        ),
        other => {
            tracing::debug!(event = other, "Skipping unknown server event");
            None
        }
    }
}

fn normalize_base_url(raw: String) -> ApiResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        ApiError::InvalidConfiguration("server URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(ApiError::InvalidConfiguration(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
