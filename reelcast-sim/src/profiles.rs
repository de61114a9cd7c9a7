//! Named network environments
//!
//! Each profile pairs the connection hints a client would expose with the
//! request behavior the download probe would see, so detection can be run
//! end to end without a network.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reelcast_core::config::ProbeConfig;
use reelcast_core::network::{EffectiveType, NetworkSpeedDetector, StaticHints};
use url::Url;

use crate::network::{NetworkConditions, SimulatedProbeTransport};

/// URL the simulated detector downloads from.
pub const SIMULATED_PROBE_URL: &str = "http://sim.local/probe.svg";

/// Typical client network environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkProfile {
    /// No hints and every request fails
    Offline,
    /// Very slow cellular link
    Slow2g,
    /// Average cellular link
    Mobile3g,
    /// Wi-Fi that reports fast downlink but has high round-trip latency
    CongestedWifi,
    /// Home broadband
    Broadband,
    /// Fiber with negligible latency
    Fiber,
}

impl NetworkProfile {
    /// Every profile, from worst to best.
    pub const ALL: [NetworkProfile; 6] = [
        NetworkProfile::Offline,
        NetworkProfile::Slow2g,
        NetworkProfile::Mobile3g,
        NetworkProfile::CongestedWifi,
        NetworkProfile::Broadband,
        NetworkProfile::Fiber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkProfile::Offline => "offline",
            NetworkProfile::Slow2g => "slow-2g",
            NetworkProfile::Mobile3g => "3g",
            NetworkProfile::CongestedWifi => "congested-wifi",
            NetworkProfile::Broadband => "broadband",
            NetworkProfile::Fiber => "fiber",
        }
    }

    /// Connection hints a client on this network exposes.
    pub fn hints(&self) -> StaticHints {
        match self {
            NetworkProfile::Offline => StaticHints::none(),
            NetworkProfile::Slow2g => StaticHints {
                downlink_mbps: Some(0.25),
                effective_type: Some(EffectiveType::Slow2g),
                rtt_ms: Some(2000),
            },
            NetworkProfile::Mobile3g => StaticHints {
                downlink_mbps: Some(1.5),
                effective_type: Some(EffectiveType::ThreeG),
                rtt_ms: Some(250),
            },
            NetworkProfile::CongestedWifi => StaticHints {
                downlink_mbps: Some(10.0),
                effective_type: Some(EffectiveType::FourG),
                rtt_ms: Some(450),
            },
            NetworkProfile::Broadband => StaticHints {
                downlink_mbps: Some(25.0),
                effective_type: Some(EffectiveType::FourG),
                rtt_ms: Some(40),
            },
            NetworkProfile::Fiber => StaticHints {
                downlink_mbps: Some(100.0),
                effective_type: Some(EffectiveType::FourG),
                rtt_ms: Some(8),
            },
        }
    }

    /// Request behavior seen by the download probe.
    pub fn conditions(&self) -> NetworkConditions {
        let builder = NetworkConditions::builder();
        match self {
            NetworkProfile::Offline => builder.failure_rate(1.0).build(),
            NetworkProfile::Slow2g => builder.latency(2100..2600).bandwidth_limit(6_000).build(),
            NetworkProfile::Mobile3g => builder.latency(550..900).bandwidth_limit(50_000).build(),
            NetworkProfile::CongestedWifi => builder.latency(200..400).build(),
            NetworkProfile::Broadband => builder.latency(40..120).build(),
            NetworkProfile::Fiber => builder.latency(5..20).build(),
        }
    }

    /// Simulated transport for this profile.
    pub fn transport(&self, seed: u64) -> SimulatedProbeTransport {
        SimulatedProbeTransport::new(self.conditions(), seed)
    }

    /// Detector wired to this profile's hints and a seeded transport.
    pub fn detector(&self, seed: u64, config: ProbeConfig) -> NetworkSpeedDetector {
        NetworkSpeedDetector::new(
            Arc::new(self.hints()),
            Arc::new(self.transport(seed)),
            Url::parse(SIMULATED_PROBE_URL).ok(),
            config,
        )
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_ascii_lowercase();
        NetworkProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str() == name)
            .ok_or_else(|| format!("unknown network profile: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use reelcast_core::NetworkClass;
    use reelcast_core::SpeedDetector;

    use super::*;

    async fn detect(profile: NetworkProfile, seed: u64) -> NetworkClass {
        profile
            .detector(seed, ProbeConfig::default())
            .detect_speed()
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_profiles_classify_as_expected() {
        let expected = [
            (NetworkProfile::Offline, NetworkClass::Medium),
            (NetworkProfile::Slow2g, NetworkClass::Slow),
            (NetworkProfile::Mobile3g, NetworkClass::Medium),
            (NetworkProfile::CongestedWifi, NetworkClass::Slow),
            (NetworkProfile::Broadband, NetworkClass::Fast),
            (NetworkProfile::Fiber, NetworkClass::Fast),
        ];

        for (profile, class) in expected {
            assert_eq!(detect(profile, 1).await, class, "{profile:?}");
        }
    }

    #[test]
    fn test_profile_names_round_trip() {
        for profile in NetworkProfile::ALL {
            assert_eq!(profile.as_str().parse::<NetworkProfile>(), Ok(profile));
        }
        assert_eq!("FIBER".parse::<NetworkProfile>(), Ok(NetworkProfile::Fiber));
        assert!("dialup".parse::<NetworkProfile>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_classification_is_seed_independent() {
        for seed in 0..20 {
            assert_eq!(detect(NetworkProfile::Mobile3g, seed).await, NetworkClass::Medium);
        }
    }
}
