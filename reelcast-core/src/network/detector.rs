//! Network speed detector combining independent probes

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use url::Url;

use super::probe::{self, ProbeError, ProbeKind, ProbeTransport};
use super::{ConnectionHints, NetworkClass};
use crate::config::ProbeConfig;

/// Source of the session's network class.
///
/// The streaming manager and player depend on this trait rather than on a
/// concrete detector so tests can substitute fixed or scripted classes.
#[async_trait]
pub trait SpeedDetector: Send + Sync {
    /// Measures the current network class.
    ///
    /// Never fails: when no probe succeeds the last known class is returned.
    async fn detect_speed(&self) -> NetworkClass;

    /// Returns the last known class without probing.
    fn current_speed(&self) -> NetworkClass;

    /// Overwrites the cached class and records the measurement time.
    fn set_current_speed(&self, class: NetworkClass);
}

#[derive(Debug, Default)]
struct DetectorState {
    current: NetworkClass,
    last_measurement: Option<DateTime<Utc>>,
}

/// Estimates the network class from connection hints and a timed download.
///
/// Constructed explicitly and shared through `Arc`; one instance per
/// playback context.
pub struct NetworkSpeedDetector {
    hints: Arc<dyn ConnectionHints>,
    transport: Arc<dyn ProbeTransport>,
    probe_url: Option<Url>,
    config: ProbeConfig,
    state: RwLock<DetectorState>,
}

impl NetworkSpeedDetector {
    /// Creates a detector starting at the medium class.
    ///
    /// Without a `probe_url` the download probe is reported unavailable.
    pub fn new(
        hints: Arc<dyn ConnectionHints>,
        transport: Arc<dyn ProbeTransport>,
        probe_url: Option<Url>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            hints,
            transport,
            probe_url,
            config,
            state: RwLock::new(DetectorState::default()),
        }
    }

    /// Returns when the cached class was last written.
    pub fn last_measurement(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_measurement
    }

    async fn run_download_probe(&self) -> Result<NetworkClass, ProbeError> {
        match &self.probe_url {
            Some(url) => probe::probe_download(self.transport.as_ref(), url, &self.config).await,
            None => Err(ProbeError::Unavailable {
                probe: ProbeKind::Download,
            }),
        }
    }
}

#[async_trait]
impl SpeedDetector for NetworkSpeedDetector {
    async fn detect_speed(&self) -> NetworkClass {
        // All probes start together and are all allowed to settle; a failing
        // probe must not cancel the others.
        let hint = async { probe::probe_connection_hint(self.hints.as_ref()) };
        let download = self.run_download_probe();
        let round_trip = async { probe::probe_round_trip(self.hints.as_ref()) };

        let (hint, download, round_trip) = tokio::join!(hint, download, round_trip);

        let outcomes = ProbeKind::ALL.into_iter().zip([hint, download, round_trip]);
        let mut classes = Vec::with_capacity(ProbeKind::ALL.len());
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(class) => {
                    debug!("{:?} probe reported {}", kind, class);
                    classes.push(class);
                }
                Err(e) => debug!("{:?} probe excluded: {}", kind, e),
            }
        }

        match NetworkClass::most_conservative(classes) {
            Some(class) => {
                info!("Detected network class: {}", class);
                class
            }
            None => {
                let cached = self.current_speed();
                info!("All network probes failed, keeping cached class {}", cached);
                cached
            }
        }
    }

    fn current_speed(&self) -> NetworkClass {
        self.state.read().current
    }

    fn set_current_speed(&self, class: NetworkClass) {
        let mut state = self.state.write();
        state.current = class;
        state.last_measurement = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::network::{EffectiveType, StaticHints};

    /// Transport whose downloads take a fixed time, or always fail.
    struct DelayedTransport {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ProbeTransport for DelayedTransport {
        async fn fetch(&self, url: &Url) -> Result<Bytes, ProbeError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProbeError::Request {
                    url: url.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            Ok(Bytes::from_static(b"<svg/>"))
        }

        async fn head(&self, _url: &Url) -> Result<u16, ProbeError> {
            Ok(200)
        }
    }

    fn detector(hints: StaticHints, delay: Duration, fail: bool) -> NetworkSpeedDetector {
        NetworkSpeedDetector::new(
            Arc::new(hints),
            Arc::new(DelayedTransport { delay, fail }),
            Some(Url::parse("http://localhost/probe.svg").unwrap()),
            ProbeConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_slowest_probe_wins() {
        let hints = StaticHints {
            downlink_mbps: Some(20.0),
            effective_type: None,
            rtt_ms: Some(450),
        };
        let detector = detector(hints, Duration::from_millis(100), false);

        assert_eq!(detector.detect_speed().await, NetworkClass::Slow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_medium_beats_fast() {
        let hints = StaticHints {
            downlink_mbps: None,
            effective_type: Some(EffectiveType::FourG),
            rtt_ms: Some(50),
        };
        let detector = detector(hints, Duration::from_millis(800), false);

        assert_eq!(detector.detect_speed().await, NetworkClass::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_failing_keeps_cached_class() {
        let detector = detector(StaticHints::none(), Duration::from_millis(10), true);
        detector.set_current_speed(NetworkClass::Fast);

        assert_eq!(detector.detect_speed().await, NetworkClass::Fast);
        assert_eq!(detector.current_speed(), NetworkClass::Fast);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_use_defaults_to_medium() {
        let detector = detector(StaticHints::none(), Duration::from_millis(10), true);

        assert!(detector.last_measurement().is_none());
        assert_eq!(detector.detect_speed().await, NetworkClass::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_probe_times_out_instead_of_hanging() {
        let hints = StaticHints {
            rtt_ms: Some(20),
            ..Default::default()
        };
        let detector = detector(hints, Duration::from_secs(60), false);

        // Only the RTT probe survives; the stalled download is cut at 5s.
        let started = tokio::time::Instant::now();
        assert_eq!(detector.detect_speed().await, NetworkClass::Fast);
        assert!(started.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_does_not_write_cache() {
        let hints = StaticHints {
            downlink_mbps: Some(0.3),
            ..Default::default()
        };
        let detector = detector(hints, Duration::from_millis(10), false);

        assert_eq!(detector.detect_speed().await, NetworkClass::Slow);
        assert_eq!(detector.current_speed(), NetworkClass::Medium);

        detector.set_current_speed(NetworkClass::Slow);
        assert_eq!(detector.current_speed(), NetworkClass::Slow);
        assert!(detector.last_measurement().is_some());
    }
}
