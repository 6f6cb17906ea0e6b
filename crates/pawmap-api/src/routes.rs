use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use futures::Stream;
use pawmap_core::db::{sample_incidents, LibSqlIncidentStore};
use pawmap_core::models::{IncidentCandidate, IncidentRecord, NewIncident, Validator};
use pawmap_core::sync::{Broadcaster, SyncEvent, SyncService};
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    service: SyncService<LibSqlIncidentStore>,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, service: SyncService<LibSqlIncidentStore>) -> Self {
        Self { config, service }
    }

    /// Open the store, seed it if asked to, and wire up the sync service
    pub async fn from_config(config: Arc<AppConfig>) -> pawmap_core::Result<Self> {
        let store = if config.uses_in_memory_store() {
            LibSqlIncidentStore::open_in_memory().await?
        } else {
            LibSqlIncidentStore::open(&config.db_path).await?
        };

        let validator = Validator::new(config.region, config.max_image_bytes);
        if config.seed_sample_data {
            store
                .seed_if_empty(&admissible_samples(&validator, &sample_incidents()))
                .await?;
        }

        let service = SyncService::new(store, Broadcaster::new(config.broadcast_capacity))
            .with_validator(validator)
            .with_store_timeout(config.store_timeout);
        Ok(Self::new(config, service))
    }
}

/// Sample incidents that the configured validator accepts
fn admissible_samples(validator: &Validator, samples: &[NewIncident]) -> Vec<NewIncident> {
    samples
        .iter()
        .filter_map(
            |sample| match validator.validate(&IncidentCandidate::from(sample)) {
                Ok(incident) => Some(incident),
                Err(error) => {
                    tracing::warn!(
                        location = %sample.location_name,
                        %error,
                        "Skipping sample incident outside configured rules"
                    );
                    None
                }
            },
        )
        .collect()
}

pub fn app_router(state: AppState) -> Router {
    let allow_origin = state
        .config
        .cors_allowed_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
        .map_or_else(|| AllowOrigin::from(Any), AllowOrigin::exact);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/pins", get(list_pins).post(create_pin).delete(clear_pins))
        .route("/api/events", get(stream_events))
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE]),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    incidents: Option<u64>,
    subscribers: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let incidents = match state.service.count().await {
        Ok(count) => Some(count),
        Err(error) => {
            tracing::warn!(endpoint = "healthz", %error, "Store health check failed");
            None
        }
    };
    Json(HealthResponse {
        status: if incidents.is_some() { "ok" } else { "degraded" },
        timestamp: Utc::now().timestamp(),
        incidents,
        subscribers: state.service.broadcaster().subscriber_count(),
    })
}

async fn list_pins(State(state): State<AppState>) -> Result<Json<Vec<IncidentRecord>>, AppError> {
    let records = state.service.list_all().await?;
    tracing::debug!(endpoint = "list", count = records.len(), "Listed incidents");
    Ok(Json(records))
}

async fn create_pin(
    State(state): State<AppState>,
    payload: Result<Json<IncidentCandidate>, JsonRejection>,
) -> Result<(StatusCode, Json<IncidentRecord>), AppError> {
    let Json(candidate) = payload?;
    let record = state.service.submit(&candidate).await?;
    tracing::info!(
        endpoint = "submit",
        id = %record.id,
        category = record.category.as_str(),
        "Recorded incident"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    removed: u64,
}

async fn clear_pins(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let removed = state.service.clear().await?;
    tracing::info!(endpoint = "clear", removed, "Cleared all incidents");
    Ok(Json(ClearResponse { removed }))
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.service.subscribe();
    let subscriber = SubscriberGuard::attach(state.service.broadcaster().subscriber_count());

    let events = BroadcastStream::new(receiver).map_while(move |item| {
        let _attached = &subscriber;
        match item {
            Ok(event) => sse_event(&event).map(Ok),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(
                    endpoint = "events",
                    skipped,
                    "Subscriber fell behind; closing stream so it resynchronizes"
                );
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.sse_keep_alive))
}

fn sse_event(event: &SyncEvent) -> Option<Event> {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(error) => {
            tracing::warn!(endpoint = "events", %error, "Failed to encode sync event");
            None
        }
    }
}

/// Logs subscriber connect/disconnect for the lifetime of one event stream
struct SubscriberGuard;

impl SubscriberGuard {
    fn attach(subscribers: usize) -> Self {
        tracing::info!(endpoint = "events", subscribers, "Subscriber connected");
        Self
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        tracing::info!(endpoint = "events", "Subscriber disconnected");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use pawmap_core::client::SseDecoder;
    use pawmap_core::models::{IncidentCategory, RegionBounds};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    async fn test_state(config: AppConfig) -> AppState {
        AppState::from_config(Arc::new(config)).await.unwrap()
    }

    fn valid_pin() -> Value {
        json!({
            "locationName": "Mong Kok",
            "position": [22.3167, 114.1717],
            "reporterName": "volunteer",
            "description": "Stray dog looking for food",
            "category": "general-report"
        })
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::post("/api/pins")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_store_and_subscribers() {
        let router = app_router(test_state(AppConfig::in_memory()).await);

        let (status, body) = send(&router, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["incidents"], 0);
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn seeded_store_lists_samples_newest_first() {
        let config = AppConfig {
            seed_sample_data: true,
            ..AppConfig::in_memory()
        };
        let router = app_router(test_state(config).await);

        let (status, body) = send(&router, get("/api/pins")).await;
        assert_eq!(status, StatusCode::OK);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 20);

        let timestamps: Vec<i64> = records
            .iter()
            .map(|record| record["createdAt"].as_i64().unwrap())
            .collect();
        assert!(timestamps.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn seeding_skips_samples_outside_configured_region() {
        let config = AppConfig {
            seed_sample_data: true,
            region: RegionBounds {
                lat_min: 24.0,
                lat_max: 26.0,
                lng_min: 113.0,
                lng_max: 115.0,
            },
            ..AppConfig::in_memory()
        };
        let state = test_state(config).await;

        assert!(state.service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn seeding_keeps_only_samples_inside_narrowed_region() {
        let region = RegionBounds {
            lat_min: 22.1,
            lat_max: 22.31,
            lng_min: 113.8,
            lng_max: 114.5,
        };
        let config = AppConfig {
            seed_sample_data: true,
            region,
            ..AppConfig::in_memory()
        };
        let state = test_state(config).await;

        let records = state.service.list_all().await.unwrap();
        assert_eq!(records.len(), 9);
        assert!(records.iter().all(|record| region.contains(record.position)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_then_list_round_trip() {
        let router = app_router(test_state(AppConfig::in_memory()).await);

        let (status, created) = send(&router, post_json(&valid_pin())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["locationName"], "Mong Kok");
        assert_eq!(created["category"], "general-report");
        assert!(created["id"].as_str().is_some());

        let (_, listed) = send(&router, get("/api/pins")).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], created["id"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn validation_errors_are_400_with_codes() {
        let router = app_router(test_state(AppConfig::in_memory()).await);

        let mut missing = valid_pin();
        missing.as_object_mut().unwrap().remove("reporterName");
        let (status, body) = send(&router, post_json(&missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "missing-field");
        assert!(body["error"].as_str().unwrap().contains("reporterName"));

        let mut outside = valid_pin();
        outside["position"] = json!([35.6762, 139.6503]);
        let (status, body) = send(&router, post_json(&outside)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid-coordinate");

        let mut flattened = valid_pin();
        flattened["position"] = json!("22.3167,114.1717");
        let (status, body) = send(&router, post_json(&flattened)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid-coordinate");

        let mut unknown = valid_pin();
        unknown["category"] = json!("lost-pet");
        let (status, body) = send(&router, post_json(&unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid-category");

        let (_, listed) = send(&router, get("/api/pins")).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_json_is_bad_request() {
        let router = app_router(test_state(AppConfig::in_memory()).await);
        let request = Request::post("/api/pins")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ nope"))
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad-request");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_image_is_rejected() {
        let config = AppConfig {
            max_image_bytes: 1024,
            ..AppConfig::in_memory()
        };
        let router = app_router(test_state(config).await);

        let mut pin = valid_pin();
        pin["imageData"] = json!(format!("data:image/png;base64,{}", "A".repeat(2048)));
        let (status, body) = send(&router, post_json(&pin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "image-too-large");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_reports_removed_count() {
        let router = app_router(test_state(AppConfig::in_memory()).await);
        send(&router, post_json(&valid_pin())).await;
        send(&router, post_json(&valid_pin())).await;

        let request = Request::delete("/api/pins").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "removed": 2 }));

        let request = Request::delete("/api/pins").body(Body::empty()).unwrap();
        let (_, body) = send(&router, request).await;
        assert_eq!(body, json!({ "removed": 0 }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn event_stream_delivers_submissions_and_clears() {
        let state = test_state(AppConfig::in_memory()).await;
        let router = app_router(state.clone());

        let response = router.clone().oneshot(get("/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(state.service.broadcaster().subscriber_count(), 1);

        let (_, created) = send(&router, post_json(&valid_pin())).await;
        let request = Request::delete("/api/pins").body(Body::empty()).unwrap();
        send(&router, request).await;

        let mut frames = response.into_body().into_data_stream();
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        while events.len() < 2 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), frames.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            for message in decoder.push(&chunk) {
                events.push(serde_json::from_str::<SyncEvent>(&message.data).unwrap());
            }
        }

        match &events[0] {
            SyncEvent::IncidentAdded { record } => {
                assert_eq!(record.id.to_string(), created["id"].as_str().unwrap());
                assert_eq!(record.category, IncidentCategory::GeneralReport);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events[1], SyncEvent::AllCleared);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lagging_subscriber_stream_is_closed() {
        let store = LibSqlIncidentStore::open_in_memory().await.unwrap();
        let service = SyncService::new(store, Broadcaster::new(2));
        let state = AppState::new(Arc::new(AppConfig::in_memory()), service.clone());
        let router = app_router(state);

        let response = router.oneshot(get("/api/events")).await.unwrap();
        for _ in 0..5 {
            service.clear().await.unwrap();
        }

        let mut frames = response.into_body().into_data_stream();
        let end = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .unwrap();
        assert!(end.is_none());

        drop(frames);
        assert_eq!(service.broadcaster().subscriber_count(), 0);
    }
}
