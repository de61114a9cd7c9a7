//! The catalog served over HTTP resolves to playable byte ranges

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use reelcast_core::config::ReelcastConfig;
use reelcast_core::quality::QualityDescriptor;
use reelcast_core::{NetworkClass, select_optimal_quality};
use reelcast_web::{AppState, router};
use tempfile::TempDir;
use tower::ServiceExt;

fn library_with_variants() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let files: [(&str, u8); 3] = [
        ("keynote.mp4", 0),
        ("keynote_360p.mp4", 36),
        ("keynote_1080p.mp4", 108),
    ];
    for (name, fill) in files {
        std::fs::write(dir.path().join(name), vec![fill; 4096]).unwrap();
    }

    let mut config = ReelcastConfig::for_testing();
    config.server.media_dir = dir.path().to_path_buf();
    (router(AppState::new(config)), dir)
}

async fn get(app: &Router, uri: &str, range: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder().uri(uri);
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn catalog(app: &Router, id: &str) -> Vec<QualityDescriptor> {
    let response = get(app, &format!("/api/videos/{id}/qualities"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    serde_json::from_value(json["qualities"].clone()).unwrap()
}

#[tokio::test]
async fn test_selected_variant_streams_its_own_bytes() {
    let (app, _dir) = library_with_variants();
    let qualities = catalog(&app, "keynote").await;

    let labels: Vec<&str> = qualities.iter().map(|q| q.label.as_str()).collect();
    assert_eq!(labels, vec!["Auto", "1080p", "360p"]);

    for (class, fill) in [(NetworkClass::Slow, 36u8), (NetworkClass::Fast, 108u8)] {
        let selected = select_optimal_quality(&qualities, class, None).unwrap();
        let response = get(&app, &selected.url, Some("bytes=0-1023")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{class}");
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-1023/4096");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 1024);
        assert!(body.iter().all(|b| *b == fill), "{class}");
    }
}

#[tokio::test]
async fn test_medium_class_falls_back_below_720p() {
    let (app, _dir) = library_with_variants();
    let qualities = catalog(&app, "keynote").await;

    let selected = select_optimal_quality(&qualities, NetworkClass::Medium, None).unwrap();
    assert_eq!(selected.label, "360p");
}

#[tokio::test]
async fn test_seeking_reads_from_offset() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..=255).cycle().take(10_000).collect();
    std::fs::write(dir.path().join("reel.webm"), &bytes).unwrap();
    let mut config = ReelcastConfig::for_testing();
    config.server.media_dir = dir.path().to_path_buf();
    let app = router(AppState::new(config));

    let response = get(&app, "/api/videos/reel/stream", Some("bytes=9000-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 9000-9999/10000");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), &bytes[9000..]);

    let tail = get(&app, "/api/videos/reel/stream", Some("bytes=-16")).await;
    let body = to_bytes(tail.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), &bytes[9984..]);
}

#[tokio::test]
async fn test_path_traversal_is_not_served() {
    let (app, _dir) = library_with_variants();

    for uri in [
        "/api/videos/..%2Fsecret/stream",
        "/api/videos/.keynote/stream",
        "/api/videos/key%20note/qualities",
    ] {
        let response = get(&app, uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_file_larger_than_one_chunk_streams_intact() {
    let dir = TempDir::new().unwrap();
    let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("feature.mp4"), &bytes).unwrap();
    let mut config = ReelcastConfig::for_testing();
    config.server.media_dir = dir.path().to_path_buf();
    let app = router(AppState::new(config));

    let full = get(&app, "/api/videos/feature/stream", None).await;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.headers()[header::CONTENT_LENGTH], "200000");
    let body = to_bytes(full.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), bytes.as_slice());

    // Spans several read chunks and ends short of the file end.
    let partial = get(&app, "/api/videos/feature/stream", Some("bytes=1000-150999")).await;
    assert_eq!(partial.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.headers()[header::CONTENT_LENGTH], "150000");
    assert_eq!(
        partial.headers()[header::CONTENT_RANGE],
        "bytes 1000-150999/200000"
    );
    let body = to_bytes(partial.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), &bytes[1000..151_000]);
}
