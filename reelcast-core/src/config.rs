//! Centralized configuration for Reelcast.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Reelcast components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ReelcastConfig {
    pub streaming: StreamingConfig,
    pub probe: ProbeConfig,
    pub analytics: AnalyticsConfig,
    pub player: PlayerConfig,
    pub server: ServerConfig,
}

/// Bandwidth cutoffs in kbps used when deciding on mid-playback switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthThresholds {
    /// Below this the connection is considered slow
    pub slow: f64,
    /// Upper bound of the medium band
    pub medium: f64,
    /// Above this the connection is considered fast
    pub fast: f64,
}

impl Default for BandwidthThresholds {
    fn default() -> Self {
        Self {
            slow: 1000.0,   // 1 Mbps
            medium: 5000.0, // 5 Mbps
            fast: 10000.0,  // 10 Mbps
        }
    }
}

/// Adaptive streaming behavior for a playback session.
///
/// Read-only for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Whether network detection runs at session start
    pub enable_adaptive: bool,
    /// Quality label used before anything is known
    pub default_quality: String,
    /// Ordered list of quality labels the catalog is built from
    pub quality_levels: Vec<String>,
    /// Bandwidth cutoffs for switch decisions
    pub bandwidth_thresholds: BandwidthThresholds,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enable_adaptive: true,
            default_quality: "auto".to_string(),
            quality_levels: ["360p", "480p", "720p", "1080p"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bandwidth_thresholds: BandwidthThresholds::default(),
        }
    }
}

/// Download probe configuration.
///
/// Controls the asset fetched to time the connection and how the measured
/// duration maps onto a network class.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Path of the probe asset, relative to the base URL
    pub probe_path: String,
    /// Hard limit on a single probe download
    pub timeout: Duration,
    /// Downloads slower than this classify as slow
    pub slow_after: Duration,
    /// Downloads slower than this (but within `slow_after`) classify as medium
    pub medium_after: Duration,
    /// User agent for probe requests
    pub user_agent: &'static str,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_path: "/probe.svg".to_string(),
            timeout: Duration::from_secs(5),
            slow_after: Duration::from_secs(2),
            medium_after: Duration::from_millis(500),
            user_agent: "reelcast/0.1.0",
        }
    }
}

/// Bounds on the in-memory analytics log.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Events kept per list per video before the oldest is evicted
    pub max_events_per_video: usize,
    /// Videos tracked before the least recently used is dropped
    pub max_videos: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_events_per_video: 1000,
            max_videos: 256,
        }
    }
}

/// Player control and buffer-health settings.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Distance covered by skip forward/back controls
    pub skip_seconds: f64,
    /// Buffer below this is low enough to downgrade
    pub low_buffer_secs: f64,
    /// Buffer above this is healthy enough to upgrade
    pub healthy_buffer_secs: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            skip_seconds: 10.0,
            low_buffer_secs: 5.0,
            healthy_buffer_secs: 15.0,
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to
    pub port: u16,
    /// Directory holding the served video files
    pub media_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            media_dir: PathBuf::from("media"),
        }
    }
}

impl ReelcastConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(enabled) = std::env::var("REELCAST_ADAPTIVE") {
            config.streaming.enable_adaptive = enabled.parse().unwrap_or(true);
        }

        if let Ok(timeout) = std::env::var("REELCAST_PROBE_TIMEOUT_MS") {
            if let Ok(millis) = timeout.parse::<u64>() {
                config.probe.timeout = Duration::from_millis(millis);
            }
        }

        if let Ok(path) = std::env::var("REELCAST_PROBE_PATH") {
            config.probe.probe_path = path;
        }

        if let Ok(max_events) = std::env::var("REELCAST_MAX_EVENTS_PER_VIDEO") {
            if let Ok(count) = max_events.parse::<usize>() {
                config.analytics.max_events_per_video = count;
            }
        }

        if let Ok(port) = std::env::var("REELCAST_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(dir) = std::env::var("REELCAST_MEDIA_DIR") {
            config.server.media_dir = PathBuf::from(dir);
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            probe: ProbeConfig {
                timeout: Duration::from_millis(500),
                ..Default::default()
            },
            analytics: AnalyticsConfig {
                max_events_per_video: 16,
                max_videos: 4,
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ReelcastConfig::default();

        assert!(config.streaming.enable_adaptive);
        assert_eq!(config.streaming.default_quality, "auto");
        assert_eq!(
            config.streaming.quality_levels,
            vec!["360p", "480p", "720p", "1080p"]
        );
        assert_eq!(config.streaming.bandwidth_thresholds.slow, 1000.0);
        assert_eq!(config.streaming.bandwidth_thresholds.fast, 10000.0);
        assert_eq!(config.probe.timeout, Duration::from_secs(5));
        assert_eq!(config.analytics.max_events_per_video, 1000);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_presets() {
        let testing_config = ReelcastConfig::for_testing();
        assert_eq!(testing_config.probe.timeout, Duration::from_millis(500));
        assert_eq!(testing_config.analytics.max_videos, 4);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("REELCAST_ADAPTIVE", "false");
            std::env::set_var("REELCAST_PROBE_TIMEOUT_MS", "1500");
            std::env::set_var("REELCAST_MAX_EVENTS_PER_VIDEO", "50");
            std::env::set_var("REELCAST_PORT", "8088");
        }

        let config = ReelcastConfig::from_env();

        assert!(!config.streaming.enable_adaptive);
        assert_eq!(config.probe.timeout, Duration::from_millis(1500));
        assert_eq!(config.analytics.max_events_per_video, 50);
        assert_eq!(config.server.port, 8088);

        // Cleanup
        unsafe {
            std::env::remove_var("REELCAST_ADAPTIVE");
            std::env::remove_var("REELCAST_PROBE_TIMEOUT_MS");
            std::env::remove_var("REELCAST_MAX_EVENTS_PER_VIDEO");
            std::env::remove_var("REELCAST_PORT");
        }
    }
}
