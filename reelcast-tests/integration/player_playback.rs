//! Scripted playback sessions against a real streaming manager

use std::sync::Arc;
use std::time::Duration;

use reelcast_core::config::{PlayerConfig, ProbeConfig, StreamingConfig};
use reelcast_core::player::{MediaErrorKind, MediaEvent, PlayerCommand};
use reelcast_core::{AdaptiveStreamingManager, PlayerSession, QualityCatalog, VideoAnalytics};
use reelcast_sim::{
    DeterministicClock, DeterministicRng, NetworkProfile, PlaybackScript, random_viewing,
};

const STREAM: &str = "/media/lecture.mp4";

fn session(analytics: &Arc<VideoAnalytics>) -> PlayerSession {
    PlayerSession::new(
        "lecture",
        QualityCatalog::with_variant_urls(STREAM),
        Arc::clone(analytics),
        PlayerConfig::default(),
    )
}

fn manager(profile: NetworkProfile) -> AdaptiveStreamingManager {
    let detector = Arc::new(profile.detector(21, ProbeConfig::default()));
    AdaptiveStreamingManager::new(detector, StreamingConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_broadband_session_records_every_stall() {
    let analytics = Arc::new(VideoAnalytics::default());
    let mut player = session(&analytics);
    let manager = manager(NetworkProfile::Broadband);

    let commands = player.start(&manager, None).await;
    assert_eq!(
        commands,
        vec![PlayerCommand::Load {
            url: "/media/lecture_1080p.mp4".to_string()
        }]
    );

    let mut rng = DeterministicRng::from_seed(99);
    let script = random_viewing(&mut rng, 900.0, 30, 0.5);
    let mut clock = DeterministicClock::new();
    script.replay(&mut player, &mut clock).unwrap();

    let metrics = analytics.metrics("lecture");
    let stalls = script
        .steps()
        .iter()
        .filter(|step| matches!(step, reelcast_sim::PlaybackStep::Event(MediaEvent::Waiting)))
        .count();
    assert_eq!(metrics.buffering_events.len(), stalls);
    assert_eq!(
        u128::from(metrics.total_buffering_ms()),
        script.total_stall().as_millis()
    );
    assert!(metrics.buffering_events.iter().all(|e| e.quality == "1080p"));
}

#[tokio::test(start_paused = true)]
async fn test_downgrade_under_pressure_then_recover() {
    let analytics = Arc::new(VideoAnalytics::default());
    let mut player = session(&analytics);
    let manager = manager(NetworkProfile::Mobile3g);
    player.start(&manager, None).await;
    assert_eq!(player.state().current_quality, "480p");

    let mut clock = DeterministicClock::new();
    PlaybackScript::new()
        .startup(600.0, 854, 480)
        .advance(Duration::from_secs(30))
        .event(MediaEvent::TimeUpdate { current_time: 30.0 })
        .replay(&mut player, &mut clock)
        .unwrap();

    let commands = player.adapt(&manager, 600.0, 2.0).unwrap();
    assert_eq!(
        commands,
        vec![PlayerCommand::Load {
            url: "/media/lecture_360p.mp4".to_string()
        }]
    );

    // The new source resumes where the old one stopped.
    let resumed = player.handle_event(MediaEvent::LoadedMetadata {
        duration: 600.0,
        video_width: 640,
        video_height: 360,
    });
    assert_eq!(
        resumed,
        vec![PlayerCommand::Seek { time: 30.0 }, PlayerCommand::Play]
    );

    // Nothing lower to go to.
    assert!(player.adapt(&manager, 300.0, 1.0).unwrap().is_empty());
    // Healthy again.
    player.adapt(&manager, 20_000.0, 30.0).unwrap();
    assert_eq!(player.state().current_quality, "480p");

    let reasons: Vec<String> = analytics
        .metrics("lecture")
        .quality_switches
        .into_iter()
        .map(|s| s.reason)
        .collect();
    assert_eq!(
        reasons,
        vec!["initial", "bandwidth-downgrade", "bandwidth-upgrade"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_source_falls_back_then_gives_up() {
    let analytics = Arc::new(VideoAnalytics::default());
    let mut player = session(&analytics)
        .with_fallback("/media/lecture.webm")
        .with_poster("/media/lecture.jpg");
    player.start(&manager(NetworkProfile::Fiber), None).await;

    let mut clock = DeterministicClock::new();
    PlaybackScript::new()
        .startup(120.0, 1920, 1080)
        .event(MediaEvent::TimeUpdate { current_time: 42.0 })
        .replay(&mut player, &mut clock)
        .unwrap();

    let network = MediaEvent::Error {
        kind: MediaErrorKind::Network,
    };
    let decode = MediaEvent::Error {
        kind: MediaErrorKind::Decode,
    };

    assert_eq!(
        player.handle_event(network.clone()),
        vec![PlayerCommand::Reload {
            url: "/media/lecture_1080p.mp4".to_string()
        }]
    );
    assert_eq!(
        player.handle_event(network),
        vec![PlayerCommand::Load {
            url: "/media/lecture.webm".to_string()
        }]
    );
    assert!(player.is_using_fallback());

    let resumed = player.handle_event(MediaEvent::LoadedMetadata {
        duration: 120.0,
        video_width: 1920,
        video_height: 1080,
    });
    assert_eq!(
        resumed,
        vec![PlayerCommand::Seek { time: 42.0 }, PlayerCommand::Play]
    );

    let commands = player.handle_event(decode);
    assert_eq!(
        commands,
        vec![PlayerCommand::ShowError {
            message: "Video playback failed: the video could not be decoded".to_string(),
            poster: Some("/media/lecture.jpg".to_string()),
        }]
    );
    assert!(player.error().is_some());

    assert_eq!(
        player.retry(),
        vec![PlayerCommand::Load {
            url: "/media/lecture_1080p.mp4".to_string()
        }]
    );
    assert!(player.error().is_none());
    assert!(!player.is_using_fallback());
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_replays_identically() {
    let run = |seed| async move {
        let analytics = Arc::new(VideoAnalytics::default());
        let mut player = session(&analytics);
        player.start(&manager(NetworkProfile::Broadband), None).await;

        let mut rng = DeterministicRng::from_seed(seed);
        let mut clock = DeterministicClock::new();
        random_viewing(&mut rng, 300.0, 20, 0.3)
            .replay(&mut player, &mut clock)
            .unwrap();

        analytics
            .metrics("lecture")
            .buffering_events
            .into_iter()
            .map(|e| e.duration_ms)
            .collect::<Vec<_>>()
    };

    assert_eq!(run(5).await, run(5).await);
}
