mod map;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use festmap_core::{AppConfig, Environment};
use festmap_store::{FsBackupStore, GithubStore, StoreError};
use festmap_sync::{SyncCoordinator, SyncError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id, RequestId};

pub type Coordinator = SyncCoordinator<GithubStore, FsBackupStore>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "bad_request" | "malformed_input" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "upstream_error" | "merge_aborted" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps a coordinator failure onto the public error envelope.
///
/// Validation messages go back verbatim since they name the offending path.
/// Store failures are logged in full and summarised for the caller.
pub(super) fn map_sync_error(request_id: String, error: &SyncError) -> ApiError {
    match error {
        SyncError::MalformedInput(_) => {
            ApiError::new(request_id, "malformed_input", error.to_string())
        }
        SyncError::InvalidStructure(_) | SyncError::UndecodableInput(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        SyncError::PersistFailed(StoreError::Conflict { .. }) => {
            tracing::warn!(error = %error, "map changed during submission");
            ApiError::new(
                request_id,
                "conflict",
                "the map was updated by someone else during this submission; please retry",
            )
        }
        SyncError::MergeAborted(_) => {
            tracing::error!(error = %error, "canonical map unavailable; submission not merged");
            ApiError::new(request_id, "merge_aborted", error.to_string())
        }
        SyncError::UpstreamFetchFailed(_) | SyncError::PersistFailed(_) => {
            tracing::error!(error = %error, "map store request failed");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
        SyncError::Serialize(_) => {
            tracing::error!(error = %error, "failed to serialize merged map");
            ApiError::new(request_id, "internal_error", "failed to serialize merged map")
        }
    }
}

/// Allowed origins from configuration. An empty list means any origin,
/// except in production where it means none.
fn build_cors(config: &AppConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.is_empty() {
        if config.env == Environment::Production {
            tracing::warn!("FESTMAP_ALLOWED_ORIGINS is empty; cross-origin requests are refused");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        } else {
            AllowOrigin::any()
        }
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring unusable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    let cors = build_cors(&state.config);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/map", get(map::get_map).post(map::submit_map))
        .route("/api/v1/map/upload", post(map::upload_map))
        .route("/api/v1/map/validate", post(map::validate_map))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let id = req
                        .extensions()
                        .get::<RequestId>()
                        .map_or("-", |id| id.0.as_str());
                    tracing::info_span!("request", method = %req.method(), uri = %req.uri(), request_id = %id)
                })),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            data: HealthData { status: "ok" },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}
