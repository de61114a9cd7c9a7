//! Reelcast Core - Adaptive playback for hosted video
//!
//! This crate provides the building blocks a video player needs to pick and
//! adjust playback quality: network speed detection, quality selection,
//! mid-playback switch gating, in-session analytics, and the player session
//! state machine that turns media element events into player commands.

pub mod analytics;
pub mod config;
pub mod network;
pub mod player;
pub mod quality;
pub mod streaming;

// Re-export main types for convenient access
pub use analytics::{TelemetryError, VideoAnalytics, VideoMetrics};
pub use config::ReelcastConfig;
pub use network::{NetworkClass, NetworkSpeedDetector, ProbeError, SpeedDetector};
pub use player::{PlayerError, PlayerSession};
pub use quality::{CatalogError, QualityCatalog, QualityDescriptor, select_optimal_quality};
pub use streaming::AdaptiveStreamingManager;

/// Core errors that can bubble up from any Reelcast subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ReelcastError {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelcastError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ReelcastError::Probe(_) => "Could not measure network speed".to_string(),
            ReelcastError::Catalog(e) => match e {
                CatalogError::Empty => "No playable qualities for this video".to_string(),
                CatalogError::DuplicateLabel { label } => {
                    format!("Quality {label} is listed twice")
                }
                _ => "Quality catalog error occurred".to_string(),
            },
            ReelcastError::Player(PlayerError::UnknownQuality { label }) => {
                format!("Quality {label} is not available for this video")
            }
            ReelcastError::Player(_) => "Playback error occurred".to_string(),
            ReelcastError::Telemetry(_) => "Could not send playback statistics".to_string(),
            ReelcastError::Configuration { .. } => "Configuration error occurred".to_string(),
            ReelcastError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ReelcastError::Configuration { .. }
                | ReelcastError::Player(PlayerError::UnknownQuality { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, ReelcastError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ProbeKind;

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = ReelcastError::from(ProbeError::Request {
            url: "http://10.0.0.5/probe.svg".to_string(),
            reason: "connection reset".to_string(),
        });
        assert_eq!(err.user_message(), "Could not measure network speed");
        assert!(err.to_string().contains("connection reset"));

        let err = ReelcastError::from(CatalogError::DuplicateLabel {
            label: "720p".to_string(),
        });
        assert_eq!(err.user_message(), "Quality 720p is listed twice");
    }

    #[test]
    fn test_user_errors_are_input_problems() {
        let bad_quality = ReelcastError::from(PlayerError::UnknownQuality {
            label: "4K".to_string(),
        });
        assert!(bad_quality.is_user_error());
        assert_eq!(
            bad_quality.user_message(),
            "Quality 4K is not available for this video"
        );

        let config = ReelcastError::Configuration {
            reason: "invalid URL".to_string(),
        };
        assert!(config.is_user_error());

        let probe = ReelcastError::from(ProbeError::Unavailable {
            probe: ProbeKind::Download,
        });
        assert!(!probe.is_user_error());
    }
}
