//! Router and server startup

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use reelcast_core::config::ReelcastConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::handlers::{api_qualities, api_telemetry, probe_asset, stream_video};
use crate::library::MediaLibrary;

const DEFAULT_PROBE_ROUTE: &str = "/probe.svg";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Uploaded videos
    pub library: MediaLibrary,
    /// Server-wide configuration
    pub config: Arc<ReelcastConfig>,
}

impl AppState {
    /// Creates state serving `config.server.media_dir`.
    pub fn new(config: ReelcastConfig) -> Self {
        Self {
            library: MediaLibrary::new(config.server.media_dir.clone()),
            config: Arc::new(config),
        }
    }
}

/// Cross-origin players need Range on requests and the range headers
/// readable on responses. Preflights are answered here.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ])
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let probe_route = match state.config.probe.probe_path.as_str() {
        path if path.starts_with('/') && path.len() > 1 => path.to_string(),
        path => {
            warn!("Ignoring probe path {:?}, serving {}", path, DEFAULT_PROBE_ROUTE);
            DEFAULT_PROBE_ROUTE.to_string()
        }
    };
    let media_dir = state.library.root().to_path_buf();

    Router::new()
        .route("/api/videos/{id}/stream", get(stream_video))
        .route("/api/videos/{id}/qualities", get(api_qualities))
        .route("/api/videos/{id}/telemetry", post(api_telemetry))
        .route(&probe_route, get(probe_asset))
        // Posters and other static files next to the uploads
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(cors_layer())
        .with_state(state)
}

/// Serves the API until the process is stopped.
///
/// # Errors
///
/// - Binding the listener or serving failed
pub async fn run_server(config: ReelcastConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let media_dir = config.server.media_dir.clone();
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Reelcast server running on http://{} serving {}",
        addr,
        media_dir.display()
    );
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    fn app_with_clip() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..100).collect();
        std::fs::write(dir.path().join("clip.mp4"), bytes).unwrap();

        let mut config = ReelcastConfig::for_testing();
        config.server.media_dir = dir.path().to_path_buf();
        (router(AppState::new(config)), dir)
    }

    fn get_request(uri: &str, range: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(range) = range {
            builder = builder.header(header::RANGE, range);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_range_request_returns_partial_content() {
        let (app, _dir) = app_with_clip();

        let response = app
            .oneshot(get_request("/api/videos/clip/stream", Some("bytes=10-19")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 10-19/100");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), (10..20).collect::<Vec<u8>>().as_slice());
    }

    #[tokio::test]
    async fn test_request_without_range_returns_full_body() {
        let (app, _dir) = app_with_clip();

        let response = app
            .oneshot(get_request("/api/videos/clip/stream", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 100);
    }

    #[tokio::test]
    async fn test_range_past_end_is_unsatisfiable() {
        let (app, _dir) = app_with_clip();

        let response = app
            .oneshot(get_request("/api/videos/clip/stream", Some("bytes=100-")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */100");
    }

    #[tokio::test]
    async fn test_unknown_video_is_not_found() {
        let (app, _dir) = app_with_clip();

        for uri in ["/api/videos/nope/stream", "/api/videos/nope/qualities"] {
            let response = app.clone().oneshot(get_request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_preflight_allows_range_header() {
        let (app, _dir) = app_with_clip();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/videos/clip/stream")
            .header(header::ORIGIN, "http://player.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "range")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("range"));
    }

    #[tokio::test]
    async fn test_range_headers_exposed_cross_origin() {
        let (app, _dir) = app_with_clip();

        let request = Request::builder()
            .uri("/api/videos/clip/stream")
            .header(header::ORIGIN, "http://player.example")
            .header(header::RANGE, "bytes=0-9")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("content-range"));
    }

    #[tokio::test]
    async fn test_qualities_endpoint_shape() {
        let (app, _dir) = app_with_clip();

        let response = app
            .oneshot(get_request("/api/videos/clip/qualities", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["videoId"], "clip");
        assert_eq!(json["defaultQuality"], "1080p");
        assert_eq!(json["qualities"][0]["label"], "Auto");
        assert_eq!(json["qualities"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_probe_asset_is_not_cached() {
        let (app, _dir) = app_with_clip();

        let response = app
            .oneshot(get_request("/probe.svg", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let cache = response.headers()[header::CACHE_CONTROL].to_str().unwrap();
        assert!(cache.contains("no-cache"));
    }

    #[tokio::test]
    async fn test_telemetry_accepts_metrics() {
        let (app, _dir) = app_with_clip();

        let payload = serde_json::json!({
            "qualitySwitches": [{
                "timestamp": "2024-05-01T12:00:00Z",
                "from": "Auto",
                "to": "720p",
                "reason": "initial"
            }],
            "bufferingEvents": [{
                "timestamp": "2024-05-01T12:00:05Z",
                "durationMs": 420,
                "quality": "720p"
            }]
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/videos/clip/telemetry")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_invalid_probe_path_falls_back() {
        let dir = TempDir::new().unwrap();
        let mut config = ReelcastConfig::for_testing();
        config.server.media_dir = dir.path().to_path_buf();
        config.probe.probe_path = "probe.svg".to_string();
        let app = router(AppState::new(config));

        let response = app
            .oneshot(get_request(DEFAULT_PROBE_ROUTE, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
