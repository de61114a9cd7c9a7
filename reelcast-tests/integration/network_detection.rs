//! Detection over simulated networks

use std::sync::Arc;

use proptest::prelude::*;
use reelcast_core::config::{ProbeConfig, StreamingConfig};
use reelcast_core::{AdaptiveStreamingManager, NetworkClass, QualityCatalog, SpeedDetector};
use reelcast_sim::{NetworkConditions, NetworkProfile, SimulatedProbeTransport};
use url::Url;

#[tokio::test(start_paused = true)]
async fn test_profiles_drive_recommendations() {
    let catalog = QualityCatalog::for_stream("/api/videos/clip/stream");
    let expected = [
        (NetworkProfile::Offline, "480p"),
        (NetworkProfile::Slow2g, "360p"),
        (NetworkProfile::Mobile3g, "480p"),
        (NetworkProfile::CongestedWifi, "360p"),
        (NetworkProfile::Broadband, "1080p"),
        (NetworkProfile::Fiber, "1080p"),
    ];

    for (profile, label) in expected {
        let detector = Arc::new(profile.detector(7, ProbeConfig::default()));
        let manager = AdaptiveStreamingManager::new(detector, StreamingConfig::default());

        manager.initialize().await;

        assert_eq!(
            manager.recommended_quality(catalog.as_slice()),
            label,
            "{profile}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_initialize_caches_detected_class() {
    let detector = Arc::new(NetworkProfile::Slow2g.detector(3, ProbeConfig::default()));
    let manager = AdaptiveStreamingManager::new(detector.clone(), StreamingConfig::default());
    assert_eq!(manager.network_class(), NetworkClass::Medium);
    assert!(detector.last_measurement().is_none());

    manager.initialize().await;

    assert_eq!(manager.network_class(), NetworkClass::Slow);
    assert_eq!(detector.current_speed(), NetworkClass::Slow);
    assert!(detector.last_measurement().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_detection_keeps_previous_class() {
    let detector = NetworkProfile::Offline.detector(5, ProbeConfig::default());
    detector.set_current_speed(NetworkClass::Fast);

    assert_eq!(detector.detect_speed().await, NetworkClass::Fast);
}

#[tokio::test(start_paused = true)]
async fn test_discover_keeps_answering_variants() {
    let transport = SimulatedProbeTransport::new(NetworkConditions::default(), 11)
        .with_available_paths(["_720p.mp4", "_360p.mp4"]);
    let base = Url::parse("http://cdn.local/videos/talk.mp4").unwrap();

    let catalog = QualityCatalog::discover(&base, &transport).await.unwrap();

    let labels: Vec<&str> = catalog.iter().map(|q| q.label.as_str()).collect();
    assert_eq!(labels, vec!["Auto", "720p", "360p"]);
    assert_eq!(
        catalog.find("720p").unwrap().url,
        "http://cdn.local/videos/talk_720p.mp4"
    );
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_discover_without_variants_offers_original() {
    let transport = SimulatedProbeTransport::new(NetworkConditions::default(), 11)
        .with_available_paths(Vec::<String>::new());
    let base = Url::parse("http://cdn.local/videos/talk.mp4").unwrap();

    let catalog = QualityCatalog::discover(&base, &transport).await.unwrap();

    let original = catalog.find("Original").unwrap();
    assert_eq!(original.height, 1080);
    assert_eq!(original.url, base.as_str());
}

proptest! {
    #[test]
    fn test_fiber_is_fast_for_any_seed(seed in any::<u64>()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let class = runtime.block_on(async {
            NetworkProfile::Fiber
                .detector(seed, ProbeConfig::default())
                .detect_speed()
                .await
        });
        prop_assert_eq!(class, NetworkClass::Fast);
    }
}
