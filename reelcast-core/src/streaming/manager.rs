//! Adaptive streaming manager

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{PlayerConfig, StreamingConfig};
use crate::network::{NetworkClass, SpeedDetector};
use crate::quality::{QualityDescriptor, select_optimal_quality};

/// Label returned when no confident selection exists.
pub const AUTO_RECOMMENDATION: &str = "auto";

/// Outcome of comparing playback conditions against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchDecision {
    /// Bandwidth is low and the buffer is nearly drained
    Downgrade,
    /// Bandwidth is high and the buffer is comfortably ahead
    Upgrade,
    /// Keep the current quality
    Hold,
}

impl SwitchDecision {
    pub fn is_switch(&self) -> bool {
        !matches!(self, SwitchDecision::Hold)
    }
}

/// Coordinates network detection and quality selection for one session.
pub struct AdaptiveStreamingManager {
    detector: Arc<dyn SpeedDetector>,
    config: StreamingConfig,
    low_buffer_secs: f64,
    healthy_buffer_secs: f64,
}

impl AdaptiveStreamingManager {
    pub fn new(detector: Arc<dyn SpeedDetector>, config: StreamingConfig) -> Self {
        let player = PlayerConfig::default();
        Self {
            detector,
            config,
            low_buffer_secs: player.low_buffer_secs,
            healthy_buffer_secs: player.healthy_buffer_secs,
        }
    }

    /// Overrides the buffer-health cutoffs used by switch decisions.
    pub fn with_buffer_cutoffs(mut self, player: &PlayerConfig) -> Self {
        self.low_buffer_secs = player.low_buffer_secs;
        self.healthy_buffer_secs = player.healthy_buffer_secs;
        self
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Measures the network and caches the result when adaptive streaming
    /// is enabled; otherwise leaves the cached class untouched.
    pub async fn initialize(&self) {
        if !self.config.enable_adaptive {
            debug!("Adaptive streaming disabled, skipping network detection");
            return;
        }

        let class = self.detector.detect_speed().await;
        self.detector.set_current_speed(class);
        info!("Streaming session initialized for {} network", class);
    }

    /// Returns the network class recommendations are currently based on.
    pub fn network_class(&self) -> NetworkClass {
        self.detector.current_speed()
    }

    /// Returns the label the selector picks for the cached network class,
    /// or `"auto"` when nothing can be selected.
    pub fn recommended_quality(&self, catalog: &[QualityDescriptor]) -> String {
        select_optimal_quality(catalog, self.network_class(), None)
            .map(|q| q.label.clone())
            .unwrap_or_else(|| AUTO_RECOMMENDATION.to_string())
    }

    /// Classifies the current bandwidth (kbps) and buffer health (seconds).
    pub fn switch_decision(&self, bandwidth_kbps: f64, buffer_health_secs: f64) -> SwitchDecision {
        let thresholds = &self.config.bandwidth_thresholds;

        if bandwidth_kbps < thresholds.slow && buffer_health_secs < self.low_buffer_secs {
            SwitchDecision::Downgrade
        } else if bandwidth_kbps > thresholds.fast && buffer_health_secs > self.healthy_buffer_secs
        {
            SwitchDecision::Upgrade
        } else {
            SwitchDecision::Hold
        }
    }

    /// Whether a quality switch is advisable. Does not pick or perform one.
    pub fn should_switch_quality(&self, bandwidth_kbps: f64, buffer_health_secs: f64) -> bool {
        self.switch_decision(bandwidth_kbps, buffer_health_secs)
            .is_switch()
    }

    /// Picks the adjacent rung for a decision: the next lower height for a
    /// downgrade, the next higher for an upgrade.
    ///
    /// Returns `None` when holding, when already at the edge of the ladder,
    /// or when `current` is not a real quality in the catalog.
    pub fn switch_target<'a>(
        &self,
        catalog: &'a [QualityDescriptor],
        current: &str,
        decision: SwitchDecision,
    ) -> Option<&'a QualityDescriptor> {
        let current = catalog
            .iter()
            .find(|q| q.matches_label(current) && !q.is_auto())?;
        let rungs = catalog.iter().filter(|q| !q.is_auto());

        match decision {
            SwitchDecision::Hold => None,
            SwitchDecision::Downgrade => rungs
                .filter(|q| q.height < current.height)
                .max_by_key(|q| q.height),
            SwitchDecision::Upgrade => rungs
                .filter(|q| q.height > current.height)
                .min_by_key(|q| q.height),
        }
    }
}
