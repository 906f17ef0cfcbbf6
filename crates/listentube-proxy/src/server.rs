//! HTTP server for the caching front
//!
//! `/health` is answered locally; every other request is handed to the
//! [`CacheService`] and forwarded to the job processor as needed.

use crate::types::{HealthResponse, TierSizes};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use listentube_offline::{CacheService, OfflineError, RequestDescriptor, Served};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use url::Url;

/// Largest request body forwarded upstream
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub service: CacheService,
    pub upstream: Url,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(service: CacheService, upstream: Url) -> Self {
        Self {
            service,
            upstream,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(intercept)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let store = state.service.store();
    let tiers = state.service.tiers();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    let static_entries = store.keys(&tiers.static_tier).await.map(|k| k.len()).unwrap_or(0);
    let audio_entries = store.keys(&tiers.audio_tier).await.map(|k| k.len()).unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.service.stats(),
        tiers: TierSizes {
            static_entries,
            audio_entries,
        },
    })
}

/// Every route other than `/health`
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let descriptor = match describe(&state.upstream, request).await {
        Ok(descriptor) => descriptor,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.service.handle(&descriptor).await {
        Ok(served) => {
            debug!(
                path = descriptor.path(),
                status = served.response.status,
                cache = served.source.as_header(),
                "Served request"
            );
            into_response(served)
        }
        Err(e) => {
            warn!(method = %descriptor.method, path = descriptor.path(), error = %e, "Request failed");
            let status = match &e {
                OfflineError::Retrieval { .. } | OfflineError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, e.to_string())
        }
    }
}

/// Rewrite an incoming request against the upstream origin
async fn describe(upstream: &Url, request: Request) -> Result<RequestDescriptor, String> {
    let (parts, body) = request.into_parts();

    // Only path and query are taken from the request; scheme, host and port
    // always stay the upstream's, even for paths like `//other.host/x`
    let mut url = upstream.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| format!("Failed to read request body: {}", e))?;

    let mut descriptor = RequestDescriptor::new(parts.method.as_str(), url).with_body(body.to_vec());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            descriptor = descriptor.with_header(name.as_str(), value);
        }
    }

    Ok(descriptor)
}

fn into_response(served: Served) -> Response {
    let status = StatusCode::from_u16(served.response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = Response::new(Body::from(served.response.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &served.response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers.insert("x-cache", HeaderValue::from_static(served.source.as_header()));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Request;
    use listentube_offline::{
        CachedResponse, MemoryBlobStore, Network, RequestClassifier, TierNames,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Echoes the method and path back with a 200
    #[derive(Default)]
    struct FakeUpstream {
        offline: AtomicBool,
        requests: Mutex<Vec<RequestDescriptor>>,
    }

    #[async_trait]
    impl Network for FakeUpstream {
        async fn fetch(&self, request: &RequestDescriptor) -> listentube_offline::Result<CachedResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(OfflineError::Network("connection refused".to_string()));
            }
            let body = format!("{} {}", request.method, request.path());
            Ok(CachedResponse::new(200, body.into_bytes()).with_header("content-type", "text/plain"))
        }
    }

    fn create_test_state() -> (SharedState, Arc<FakeUpstream>) {
        let upstream = Arc::new(FakeUpstream::default());
        let service = CacheService::new(
            Arc::new(MemoryBlobStore::new()),
            upstream.clone(),
            RequestClassifier::default(),
            TierNames::default(),
        );
        let origin = Url::parse("http://127.0.0.1:9000").unwrap();
        (Arc::new(ServerState::new(service, origin)), upstream)
    }

    async fn send(state: &SharedState, method: &str, uri: &str, body: &str) -> Response {
        create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = create_test_state();
        send(&state, "GET", "/style.css", "").await;

        let response = send(&state, "GET", "/health", "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["misses"], 1);
        assert_eq!(json["tiers"]["static_entries"], 1);
        assert_eq!(json["tiers"]["audio_entries"], 0);
    }

    #[tokio::test]
    async fn test_static_asset_served_from_cache_on_repeat() {
        let (state, upstream) = create_test_state();

        let first = send(&state, "GET", "/index.html", "").await;
        assert_eq!(first.headers()["x-cache"], "MISS");

        let second = send(&state, "GET", "/index.html", "").await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()["x-cache"], "HIT");
        assert_eq!(second.headers()["content-type"], "text/plain");
        assert_eq!(body_string(second).await, "GET /index.html");

        assert_eq!(upstream.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audio_served_from_tier_when_upstream_down() {
        let (state, upstream) = create_test_state();
        send(&state, "GET", "/tasks/t1/play", "").await;

        upstream.offline.store(true, Ordering::SeqCst);
        let response = send(&state, "GET", "/tasks/t1/play", "").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "HIT");
        assert_eq!(body_string(response).await, "GET /tasks/t1/play");
    }

    #[tokio::test]
    async fn test_uncached_audio_with_upstream_down_is_bad_gateway() {
        let (state, upstream) = create_test_state();
        upstream.offline.store(true, Ordering::SeqCst);

        let response = send(&state, "GET", "/tasks/t2/download", "").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("no cached copy"));
    }

    #[tokio::test]
    async fn test_passthrough_forwards_body_and_query() {
        let (state, upstream) = create_test_state();

        let response = send(&state, "POST", "/tasks?trace=1", r#"{"url":"https://youtu.be/abc","format":"mp3"}"#).await;
        assert_eq!(response.headers()["x-cache"], "MISS");

        let requests = upstream.requests.lock().unwrap();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url.as_str(), "http://127.0.0.1:9000/tasks?trace=1");
        assert!(String::from_utf8_lossy(&requests[0].body).contains("youtu.be"));
    }

    #[tokio::test]
    async fn test_network_path_reference_stays_on_upstream() {
        let (state, upstream) = create_test_state();

        let response = send(&state, "GET", "//evil.example/tasks/t1/play?x=1", "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let requests = upstream.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.host_str(), Some("127.0.0.1"));
        assert_eq!(requests[0].url.port(), Some(9000));
        assert_eq!(
            requests[0].url.as_str(),
            "http://127.0.0.1:9000//evil.example/tasks/t1/play?x=1"
        );
    }

    #[test]
    fn test_server_state_new() {
        let (state, _) = create_test_state();
        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
