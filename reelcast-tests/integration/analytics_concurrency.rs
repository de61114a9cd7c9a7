//! Analytics shared by concurrently running sessions

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use reelcast_core::analytics::{TelemetryError, TelemetrySink};
use reelcast_core::config::AnalyticsConfig;
use reelcast_core::{VideoAnalytics, VideoMetrics};

/// Sink that can be told to reject, and keeps what it accepted.
#[derive(Default)]
struct RecordingSink {
    reject: Mutex<bool>,
    batches: Mutex<Vec<(String, VideoMetrics)>>,
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn send(&self, video_id: &str, metrics: &VideoMetrics) -> Result<(), TelemetryError> {
        if *self.reject.lock() {
            return Err(TelemetryError::Rejected { status: 503 });
        }
        self.batches
            .lock()
            .push((video_id.to_string(), metrics.clone()));
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_lose_no_events() {
    let analytics = Arc::new(VideoAnalytics::default());

    let tasks = (0..8).map(|worker| {
        let analytics = Arc::clone(&analytics);
        tokio::spawn(async move {
            let video_id = format!("v{}", worker % 2);
            for i in 0..50u64 {
                analytics.track_buffering(&video_id, i, "720p");
                if i % 10 == 0 {
                    analytics.track_quality_switch(&video_id, "720p", "480p", "bandwidth-downgrade");
                }
                tokio::task::yield_now().await;
            }
        })
    });

    for result in join_all(tasks).await {
        result.unwrap();
    }

    for video_id in ["v0", "v1"] {
        let metrics = analytics.metrics(video_id);
        assert_eq!(metrics.buffering_events.len(), 200, "{video_id}");
        assert_eq!(metrics.quality_switches.len(), 20, "{video_id}");
        assert_eq!(metrics.total_buffering_ms(), 4 * (0..50).sum::<u64>());
    }
    assert_eq!(analytics.metrics("v2"), VideoMetrics::default());
}

#[test]
fn test_bounded_log_keeps_newest_events() {
    let config = AnalyticsConfig {
        max_events_per_video: 5,
        max_videos: 2,
    };
    let analytics = VideoAnalytics::new(&config);

    for ms in 1..=12 {
        analytics.track_buffering("a", ms, "360p");
    }
    let durations: Vec<u64> = analytics
        .metrics("a")
        .buffering_events
        .iter()
        .map(|e| e.duration_ms)
        .collect();
    assert_eq!(durations, vec![8, 9, 10, 11, 12]);

    analytics.track_buffering("b", 1, "360p");
    analytics.track_buffering("c", 1, "360p");

    // "a" was the least recently used video when "c" arrived.
    assert!(analytics.metrics("a").is_empty());
    assert_eq!(analytics.tracked_videos(), 2);
    assert_eq!(analytics.metrics("c").buffering_events.len(), 1);
}

#[tokio::test]
async fn test_flush_retains_events_until_delivered() {
    let analytics = VideoAnalytics::default();
    let sink = RecordingSink::default();
    analytics.track_buffering("v1", 300, "480p");
    analytics.track_quality_switch("v1", "Auto", "480p", "initial");

    *sink.reject.lock() = true;
    assert!(analytics.flush("v1", &sink).await.is_err());
    analytics.track_buffering("v1", 700, "480p");

    *sink.reject.lock() = false;
    let sent = analytics.flush("v1", &sink).await.unwrap();

    assert_eq!(sent.buffering_events.len(), 2);
    assert_eq!(sent.total_buffering_ms(), 1000);
    assert_eq!(sent.quality_switches.len(), 1);
    assert!(analytics.metrics("v1").is_empty());

    let batches = sink.batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, "v1");

    // Nothing left to send.
    drop(batches);
    assert!(analytics.flush("v1", &sink).await.unwrap().is_empty());
    assert_eq!(sink.batches.lock().len(), 1);
}
