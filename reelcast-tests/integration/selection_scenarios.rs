//! Quality selection driven through a full session start
//!
//! Each case wires a fixed detector into the streaming manager, starts a
//! player session and checks what it loads and what analytics saw.

use std::sync::Arc;

use reelcast_core::config::{PlayerConfig, StreamingConfig};
use reelcast_core::network::testing::FixedSpeedDetector;
use reelcast_core::player::PlayerCommand;
use reelcast_core::quality::QualityDescriptor;
use reelcast_core::{
    AdaptiveStreamingManager, NetworkClass, PlayerSession, QualityCatalog, VideoAnalytics,
};

fn standard_catalog() -> QualityCatalog {
    QualityCatalog::new(vec![
        QualityDescriptor::new("Auto", 0, "/v/auto"),
        QualityDescriptor::new("360p", 360, "/v/360"),
        QualityDescriptor::new("480p", 480, "/v/480"),
        QualityDescriptor::new("720p", 720, "/v/720"),
        QualityDescriptor::new("1080p", 1080, "/v/1080"),
    ])
    .unwrap()
}

struct Started {
    session: PlayerSession,
    commands: Vec<PlayerCommand>,
    analytics: Arc<VideoAnalytics>,
}

async fn start(
    catalog: QualityCatalog,
    class: NetworkClass,
    preference: Option<&str>,
) -> Started {
    let detector = Arc::new(FixedSpeedDetector::new(class));
    let manager = AdaptiveStreamingManager::new(detector, StreamingConfig::default());
    let analytics = Arc::new(VideoAnalytics::default());
    let mut session = PlayerSession::new(
        "v1",
        catalog,
        Arc::clone(&analytics),
        PlayerConfig::default(),
    );

    let commands = session.start(&manager, preference).await;
    Started {
        session,
        commands,
        analytics,
    }
}

fn loaded_url(commands: &[PlayerCommand]) -> &str {
    match commands {
        [PlayerCommand::Load { url }] => url,
        other => panic!("expected a single load, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_network_starts_at_360p() {
    let started = start(standard_catalog(), NetworkClass::Slow, None).await;

    assert_eq!(started.session.state().current_quality, "360p");
    assert_eq!(loaded_url(&started.commands), "/v/360");
}

#[tokio::test]
async fn test_fast_network_starts_at_1080p() {
    let started = start(standard_catalog(), NetworkClass::Fast, None).await;

    assert_eq!(started.session.state().current_quality, "1080p");
    assert_eq!(loaded_url(&started.commands), "/v/1080");
}

#[tokio::test]
async fn test_medium_network_starts_at_480p() {
    let started = start(standard_catalog(), NetworkClass::Medium, None).await;

    assert_eq!(started.session.state().current_quality, "480p");
    assert_eq!(loaded_url(&started.commands), "/v/480");
}

#[tokio::test]
async fn test_auto_only_catalog_plays_auto() {
    let catalog = QualityCatalog::new(vec![QualityDescriptor::new("Auto", 0, "/v/auto")]).unwrap();
    let started = start(catalog, NetworkClass::Fast, None).await;

    assert_eq!(started.session.state().current_quality, "Auto");
    assert_eq!(loaded_url(&started.commands), "/v/auto");
}

#[tokio::test]
async fn test_preference_beats_slow_network() {
    let started = start(standard_catalog(), NetworkClass::Slow, Some("720p")).await;

    assert_eq!(started.session.state().current_quality, "720p");
    assert_eq!(loaded_url(&started.commands), "/v/720");
}

#[tokio::test]
async fn test_initial_selection_is_recorded() {
    let started = start(standard_catalog(), NetworkClass::Fast, None).await;

    let metrics = started.analytics.metrics("v1");
    assert_eq!(metrics.quality_switches.len(), 1);
    let switch = &metrics.quality_switches[0];
    assert_eq!(switch.from, "Auto");
    assert_eq!(switch.to, "1080p");
    assert_eq!(switch.reason, "initial");
}

#[test]
fn test_buffering_is_recorded_per_video() {
    let analytics = VideoAnalytics::default();

    analytics.track_buffering("v1", 500, "480p");
    analytics.track_buffering("v1", 500, "480p");

    assert_eq!(analytics.metrics("v1").buffering_events.len(), 2);
    assert_eq!(analytics.metrics("v2").buffering_events.len(), 0);
    assert_eq!(analytics.metrics("v1").total_buffering_ms(), 1000);
}

#[tokio::test]
async fn test_disabled_adaptive_keeps_medium_default() {
    let detector = Arc::new(FixedSpeedDetector::new(NetworkClass::Fast));
    let config = StreamingConfig {
        enable_adaptive: false,
        ..StreamingConfig::default()
    };
    let manager = AdaptiveStreamingManager::new(detector.clone(), config);
    let mut session = PlayerSession::new(
        "v1",
        standard_catalog(),
        Arc::new(VideoAnalytics::default()),
        PlayerConfig::default(),
    );

    session.start(&manager, None).await;

    assert_eq!(detector.measurements(), 0);
    assert_eq!(session.state().current_quality, "480p");
}
