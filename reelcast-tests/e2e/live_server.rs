//! Production clients against a live server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reelcast_core::analytics::HttpTelemetrySink;
use reelcast_core::config::ReelcastConfig;
use reelcast_core::network::{ProbeTransport, ProductionProbeTransport, StaticHints};
use reelcast_core::{NetworkClass, NetworkSpeedDetector, QualityCatalog, SpeedDetector, VideoAnalytics};
use reelcast_web::{AppState, router};
use tempfile::TempDir;
use url::Url;

struct LiveServer {
    addr: SocketAddr,
    config: ReelcastConfig,
    _dir: TempDir,
}

impl LiveServer {
    async fn start(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), vec![0u8; 2048]).unwrap();
        }

        let mut config = ReelcastConfig::for_testing();
        config.server.media_dir = dir.path().to_path_buf();
        let app = router(AppState::new(config.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            config,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }
}

#[tokio::test]
async fn test_download_probe_on_loopback_is_fast() {
    let server = LiveServer::start(&[]).await;
    let transport = ProductionProbeTransport::new(&server.config.probe).unwrap();
    let detector = NetworkSpeedDetector::new(
        Arc::new(StaticHints::none()),
        Arc::new(transport),
        Some(server.url(&server.config.probe.probe_path)),
        server.config.probe.clone(),
    );

    assert_eq!(detector.detect_speed().await, NetworkClass::Fast);
}

#[tokio::test]
async fn test_unreachable_probe_keeps_default() {
    let server = LiveServer::start(&[]).await;
    let transport = ProductionProbeTransport::new(&server.config.probe).unwrap();
    let detector = NetworkSpeedDetector::new(
        Arc::new(StaticHints::none()),
        Arc::new(transport),
        Some(server.url("/missing.svg")),
        server.config.probe.clone(),
    );

    assert_eq!(detector.detect_speed().await, NetworkClass::Medium);
}

#[tokio::test]
async fn test_discover_finds_served_variants() {
    let server = LiveServer::start(&["talk.mp4", "talk_720p.mp4", "talk_480p.mp4"]).await;
    let transport = ProductionProbeTransport::new(&server.config.probe).unwrap();

    let catalog = QualityCatalog::discover(&server.url("/media/talk.mp4"), &transport)
        .await
        .unwrap();

    let labels: Vec<&str> = catalog.iter().map(|q| q.label.as_str()).collect();
    assert_eq!(labels, vec!["Auto", "720p", "480p"]);

    let variant = Url::parse(&catalog.find("720p").unwrap().url).unwrap();
    assert_eq!(transport.head(&variant).await.unwrap(), 200);
}

#[tokio::test]
async fn test_flush_posts_to_telemetry_endpoint() {
    let server = LiveServer::start(&["talk.mp4"]).await;
    let sink = HttpTelemetrySink::new(server.url("/"), Duration::from_secs(2)).unwrap();
    let analytics = VideoAnalytics::default();
    analytics.track_quality_switch("talk", "Auto", "720p", "initial");
    analytics.track_buffering("talk", 250, "720p");

    let sent = analytics.flush("talk", &sink).await.unwrap();

    assert_eq!(sent.quality_switches.len(), 1);
    assert!(analytics.metrics("talk").is_empty());
}
