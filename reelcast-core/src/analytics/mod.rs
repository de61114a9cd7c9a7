//! In-session playback analytics
//!
//! Append-only logs of quality switches and buffering stalls, keyed by video.
//! Storage is bounded: each list is a ring buffer and the set of tracked
//! videos is least-recently-used. Metrics leave the process only through an
//! explicit [`VideoAnalytics::flush`] into a [`TelemetrySink`].

pub mod telemetry;

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
pub use telemetry::{HttpTelemetrySink, TelemetryError, TelemetrySink, TracingTelemetrySink};
use tracing::debug;

use crate::config::AnalyticsConfig;

/// A change of the active quality during playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySwitchEvent {
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// A stall between the player starting to wait and resuming playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferingEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub quality: String,
}

/// Everything recorded for one video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetrics {
    pub quality_switches: Vec<QualitySwitchEvent>,
    pub buffering_events: Vec<BufferingEvent>,
}

impl VideoMetrics {
    pub fn is_empty(&self) -> bool {
        self.quality_switches.is_empty() && self.buffering_events.is_empty()
    }

    /// Sum of all recorded stall durations.
    pub fn total_buffering_ms(&self) -> u64 {
        self.buffering_events.iter().map(|e| e.duration_ms).sum()
    }
}

#[derive(Debug, Default)]
struct VideoLog {
    quality_switches: VecDeque<QualitySwitchEvent>,
    buffering_events: VecDeque<BufferingEvent>,
}

impl VideoLog {
    fn to_metrics(&self) -> VideoMetrics {
        VideoMetrics {
            quality_switches: self.quality_switches.iter().cloned().collect(),
            buffering_events: self.buffering_events.iter().cloned().collect(),
        }
    }
}

fn push_bounded<T>(list: &mut VecDeque<T>, item: T, capacity: usize) {
    if list.len() >= capacity {
        list.pop_front();
    }
    list.push_back(item);
}

/// Process-local analytics log shared by the player sessions of a client.
pub struct VideoAnalytics {
    videos: Mutex<LruCache<String, VideoLog>>,
    max_events_per_video: usize,
}

impl Default for VideoAnalytics {
    fn default() -> Self {
        Self::new(&AnalyticsConfig::default())
    }
}

impl VideoAnalytics {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let max_videos = NonZeroUsize::new(config.max_videos).unwrap_or(NonZeroUsize::MIN);
        Self {
            videos: Mutex::new(LruCache::new(max_videos)),
            max_events_per_video: config.max_events_per_video.max(1),
        }
    }

    /// Records a quality switch for `video_id`.
    pub fn track_quality_switch(
        &self,
        video_id: &str,
        from: &str,
        to: &str,
        reason: impl Into<String>,
    ) {
        let event = QualitySwitchEvent {
            timestamp: Utc::now(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        };
        debug!("Quality switch on {}: {} -> {} ({})", video_id, from, to, event.reason);

        let mut videos = self.videos.lock();
        let log = videos.get_or_insert_mut(video_id.to_string(), VideoLog::default);
        push_bounded(&mut log.quality_switches, event, self.max_events_per_video);
    }

    /// Records a buffering stall of `duration_ms` at `quality`.
    pub fn track_buffering(&self, video_id: &str, duration_ms: u64, quality: &str) {
        let event = BufferingEvent {
            timestamp: Utc::now(),
            duration_ms,
            quality: quality.to_string(),
        };
        debug!("Buffering on {}: {}ms at {}", video_id, duration_ms, quality);

        let mut videos = self.videos.lock();
        let log = videos.get_or_insert_mut(video_id.to_string(), VideoLog::default);
        push_bounded(&mut log.buffering_events, event, self.max_events_per_video);
    }

    /// Returns what has been recorded for `video_id`; empty if nothing.
    pub fn metrics(&self, video_id: &str) -> VideoMetrics {
        self.videos
            .lock()
            .peek(video_id)
            .map(VideoLog::to_metrics)
            .unwrap_or_default()
    }

    /// Number of videos currently tracked.
    pub fn tracked_videos(&self) -> usize {
        self.videos.lock().len()
    }

    /// Drains the metrics of `video_id` into `sink`.
    ///
    /// Nothing is sent when no events are recorded. If the sink fails the
    /// drained events are put back ahead of anything recorded meanwhile.
    ///
    /// # Errors
    ///
    /// - `TelemetryError` - The sink rejected or could not deliver the batch
    pub async fn flush(
        &self,
        video_id: &str,
        sink: &dyn TelemetrySink,
    ) -> Result<VideoMetrics, TelemetryError> {
        let drained = self.videos.lock().pop(video_id);
        let Some(drained) = drained else {
            return Ok(VideoMetrics::default());
        };

        let metrics = drained.to_metrics();
        if metrics.is_empty() {
            return Ok(metrics);
        }

        if let Err(e) = sink.send(video_id, &metrics).await {
            self.restore(video_id, drained);
            return Err(e);
        }

        Ok(metrics)
    }

    fn restore(&self, video_id: &str, mut drained: VideoLog) {
        let mut videos = self.videos.lock();
        let log = videos.get_or_insert_mut(video_id.to_string(), VideoLog::default);

        drained.quality_switches.append(&mut log.quality_switches);
        drained.buffering_events.append(&mut log.buffering_events);
        while drained.quality_switches.len() > self.max_events_per_video {
            drained.quality_switches.pop_front();
        }
        while drained.buffering_events.len() > self.max_events_per_video {
            drained.buffering_events.pop_front();
        }
        *log = drained;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    #[test]
    fn test_unknown_video_has_empty_metrics() {
        let analytics = VideoAnalytics::default();
        let metrics = analytics.metrics("missing");

        assert!(metrics.quality_switches.is_empty());
        assert!(metrics.buffering_events.is_empty());
    }

    #[test]
    fn test_buffering_is_keyed_by_video() {
        let analytics = VideoAnalytics::default();
        analytics.track_buffering("v1", 500, "480p");
        analytics.track_buffering("v1", 500, "480p");

        assert_eq!(analytics.metrics("v1").buffering_events.len(), 2);
        assert_eq!(analytics.metrics("v2").buffering_events.len(), 0);
        assert_eq!(analytics.metrics("v1").total_buffering_ms(), 1000);
    }

    #[test]
    fn test_quality_switches_are_additive() {
        let analytics = VideoAnalytics::default();
        for expected in 1..=5 {
            analytics.track_quality_switch("v1", "720p", "480p", "bandwidth");
            assert_eq!(analytics.metrics("v1").quality_switches.len(), expected);
        }
        analytics.track_quality_switch("v2", "480p", "720p", "bandwidth");
        assert_eq!(analytics.metrics("v1").quality_switches.len(), 5);

        let last = analytics.metrics("v2").quality_switches.pop().unwrap();
        assert_eq!((last.from.as_str(), last.to.as_str()), ("480p", "720p"));
        assert_eq!(last.reason, "bandwidth");
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let analytics = VideoAnalytics::new(&AnalyticsConfig {
            max_events_per_video: 3,
            max_videos: 8,
        });
        for duration in 1..=5 {
            analytics.track_buffering("v1", duration, "360p");
        }

        let durations: Vec<u64> = analytics
            .metrics("v1")
            .buffering_events
            .iter()
            .map(|e| e.duration_ms)
            .collect();
        assert_eq!(durations, vec![3, 4, 5]);
    }

    #[test]
    fn test_least_recently_used_video_dropped() {
        let analytics = VideoAnalytics::new(&AnalyticsConfig {
            max_events_per_video: 10,
            max_videos: 2,
        });
        analytics.track_buffering("a", 1, "360p");
        analytics.track_buffering("b", 1, "360p");
        analytics.track_buffering("a", 1, "360p");
        analytics.track_buffering("c", 1, "360p");

        assert_eq!(analytics.tracked_videos(), 2);
        assert!(analytics.metrics("b").is_empty());
        assert_eq!(analytics.metrics("a").buffering_events.len(), 2);
    }

    #[test]
    fn test_metrics_serialize_camel_case() {
        let analytics = VideoAnalytics::default();
        analytics.track_buffering("v1", 250, "720p");

        let json = serde_json::to_value(analytics.metrics("v1")).unwrap();
        assert_eq!(json["bufferingEvents"][0]["durationMs"], 250);
        assert!(json["qualitySwitches"].as_array().unwrap().is_empty());
    }

    struct FailingSink;

    #[async_trait]
    impl TelemetrySink for FailingSink {
        async fn send(&self, _video_id: &str, _metrics: &VideoMetrics) -> Result<(), TelemetryError> {
            Err(TelemetryError::Rejected { status: 503 })
        }
    }

    #[tokio::test]
    async fn test_flush_drains_into_sink() {
        let analytics = VideoAnalytics::default();
        analytics.track_quality_switch("v1", "Auto", "720p", "initial");
        analytics.track_buffering("v1", 120, "720p");

        let flushed = tokio_test::assert_ok!(analytics.flush("v1", &TracingTelemetrySink).await);
        assert_eq!(flushed.quality_switches.len(), 1);
        assert_eq!(flushed.buffering_events.len(), 1);
        assert!(analytics.metrics("v1").is_empty());

        let again = tokio_test::assert_ok!(analytics.flush("v1", &TracingTelemetrySink).await);
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_events() {
        let analytics = VideoAnalytics::default();
        analytics.track_buffering("v1", 100, "480p");

        let result = analytics.flush("v1", &FailingSink).await;
        assert!(matches!(result, Err(TelemetryError::Rejected { status: 503 })));
        assert_eq!(analytics.metrics("v1").buffering_events.len(), 1);
    }
}
