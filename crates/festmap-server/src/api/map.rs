//! Map document handlers: read, submit (JSON body or multipart upload) and
//! dry validation.

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Extension, Json,
};
use festmap_core::MapDocument;
use festmap_sync::{read_cache, validate_submission, write_cache, SubmitOutcome};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_sync_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(in crate::api) struct SubmitResponse {
    pub new_locations: usize,
    pub updated_locations: usize,
    pub total_locations: usize,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ValidateResponse {
    pub valid: bool,
    pub total_locations: usize,
    pub categories: Vec<String>,
}

/// Returns the canonical map. Falls back to the local cache when the store
/// is unreachable, so the map stays readable during an outage.
pub(in crate::api) async fn get_map(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<MapDocument>>, ApiError> {
    match state.coordinator.fetch_canonical().await {
        Ok(snapshot) => Ok(Json(ApiResponse {
            data: snapshot.document,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(fetch_err) => {
            let cached = read_cache(&state.config.cache_path).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "map: cache read failed");
                None
            });
            match cached {
                Some(document) => {
                    tracing::warn!(error = %fetch_err, "map: store unavailable; serving cached copy");
                    Ok(Json(ApiResponse {
                        data: document,
                        meta: ResponseMeta::new(req_id.0),
                    }))
                }
                None => {
                    tracing::error!(error = %fetch_err, "map: store unavailable and no cache");
                    Err(ApiError::new(
                        req_id.0,
                        "upstream_error",
                        fetch_err.to_string(),
                    ))
                }
            }
        }
    }
}

pub(in crate::api) async fn submit_map(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<SubmitResponse>>, ApiError> {
    submit_raw(&state, req_id.0, &body).await
}

/// Multipart variant of [`submit_map`]: the field named `file`, or failing
/// that the first field carrying a file name, is the submission.
pub(in crate::api) async fn upload_map(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SubmitResponse>>, ApiError> {
    let rid = req_id.0;

    let mut upload: Option<Bytes> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(ApiError::new(rid, "bad_request", e.body_text())),
        };
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        match field.bytes().await {
            Ok(bytes) => {
                upload = Some(bytes);
                break;
            }
            Err(e) => return Err(ApiError::new(rid, "bad_request", e.body_text())),
        }
    }

    let Some(bytes) = upload else {
        return Err(ApiError::new(rid, "bad_request", "no file uploaded"));
    };
    submit_raw(&state, rid, &bytes).await
}

pub(in crate::api) async fn validate_map(
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<ValidateResponse>>, ApiError> {
    let document =
        validate_submission(&body).map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ValidateResponse {
            valid: true,
            total_locations: document.total_locations(),
            categories: document.locations.keys().cloned().collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn submit_raw(
    state: &AppState,
    rid: String,
    raw: &[u8],
) -> Result<Json<ApiResponse<SubmitResponse>>, ApiError> {
    let outcome: SubmitOutcome = state
        .coordinator
        .submit_bytes(raw)
        .await
        .map_err(|e| map_sync_error(rid.clone(), &e))?;

    if let Err(e) = write_cache(&state.config.cache_path, &outcome.document).await {
        tracing::warn!(error = %e, "map: cache refresh after submit failed");
    }

    Ok(Json(ApiResponse {
        data: SubmitResponse {
            new_locations: outcome.stats.new_locations,
            updated_locations: outcome.stats.updated_locations,
            total_locations: outcome.total_locations,
            version: outcome.version.to_string(),
        },
        meta: ResponseMeta::new(rid),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::build_app;
    use super::super::tests::{body_json, test_config, test_state};

    const CONTENTS_PATH: &str = "/repos/festival/map-data/contents/map-data.json";

    async fn mount_canonical(server: &MockServer, document: &Value) {
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "sha-1",
                "encoding": "base64",
                "content": STANDARD.encode(serde_json::to_vec(document).unwrap())
            })))
            .mount(server)
            .await;
    }

    async fn mount_commit(server: &MockServer) {
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"sha": "sha-2"}
            })))
            .mount(server)
            .await;
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn validate_reports_categories_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), "http://127.0.0.1:1"));

        let response = app
            .oneshot(post(
                "/api/v1/map/validate",
                r#"{"locations":{"stages":[{"name":"Main Stage","lat":52.0,"lng":15.0}],"food":[]}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["valid"], true);
        assert_eq!(json["data"]["total_locations"], 1);
        assert_eq!(json["data"]["categories"], json!(["food", "stages"]));
    }

    #[tokio::test]
    async fn validate_rejects_out_of_range_latitude() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), "http://127.0.0.1:1"));

        let response = app
            .oneshot(post(
                "/api/v1/map/validate",
                r#"{"locations":{"stages":[{"name":"Main Stage","lat":91.0,"lng":15.0}]}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("stages[0]"));
    }

    #[tokio::test]
    async fn submit_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), "http://127.0.0.1:1"));

        let response = app
            .oneshot(post("/api/v1/map", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "malformed_input");
    }

    #[tokio::test]
    async fn submit_merges_and_refreshes_cache() {
        let server = MockServer::start().await;
        mount_canonical(
            &server,
            &json!({"locations": {"stages": [{"name": "Main Stage", "lat": 52.0, "lng": 15.0}]}}),
        )
        .await;
        mount_commit(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let cache_path = config.cache_path.clone();
        let app = build_app(test_state(config, &server.uri()));

        let response = app
            .oneshot(post(
                "/api/v1/map",
                r#"{"locations":{"stages":[{"name":"Main Stage","lat":52.0,"lng":15.0,"capacity":5000}],"food":[{"name":"Kebab","lat":52.1,"lng":15.1}]}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["new_locations"], 1);
        assert_eq!(json["data"]["updated_locations"], 1);
        assert_eq!(json["data"]["total_locations"], 2);
        assert_eq!(json["data"]["version"], "sha-2");

        let cached: Value = serde_json::from_slice(&std::fs::read(cache_path).unwrap()).unwrap();
        assert_eq!(cached["locations"]["stages"][0]["capacity"], 5000);
    }

    #[tokio::test]
    async fn submit_conflict_maps_to_409() {
        let server = MockServer::start().await;
        mount_canonical(&server, &json!({"locations": {}})).await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "message": "map-data.json does not match sha-1"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), &server.uri()));

        let response = app
            .oneshot(post(
                "/api/v1/map",
                r#"{"locations":{"food":[{"name":"Kebab","lat":1.0,"lng":1.0}]}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "conflict");
    }

    #[tokio::test]
    async fn upload_uses_file_field() {
        let server = MockServer::start().await;
        mount_canonical(&server, &json!({"locations": {}})).await;
        mount_commit(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), &server.uri()));

        let boundary = "festmap-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             ignored\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"map.json\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {{\"locations\":{{\"food\":[{{\"name\":\"Kebab\",\"lat\":1.0,\"lng\":1.0}}]}}}}\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/map/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["new_locations"], 1);
        assert_eq!(json["data"]["total_locations"], 1);
    }

    #[tokio::test]
    async fn get_map_serves_cache_when_store_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut cached = festmap_core::MapDocument::default();
        cached.locations.insert(
            "stages".into(),
            vec![festmap_core::Location::new("Main Stage", 52.0, 15.0)],
        );
        cached.recount();
        festmap_sync::write_cache(&config.cache_path, &cached)
            .await
            .unwrap();

        let app = build_app(test_state(config, "http://127.0.0.1:1"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/map")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["locations"]["stages"][0]["name"], "Main Stage");
        assert_eq!(json["data"]["metadata"]["totalLocations"], 1);
    }

    #[tokio::test]
    async fn get_map_without_store_or_cache_is_502() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(test_config(dir.path()), "http://127.0.0.1:1"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/map")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
