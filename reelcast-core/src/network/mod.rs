//! Network classification for playback quality decisions
//!
//! Estimates a coarse network class from independent probes. Browser-side
//! connection signals are modelled as an injected capability so that
//! production clients, the CLI and deterministic simulations share the
//! same detection logic.

pub mod detector;
pub mod probe;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::fmt;
use std::str::FromStr;

pub use detector::{NetworkSpeedDetector, SpeedDetector};
pub use probe::{ProbeError, ProbeKind, ProbeTransport, ProductionProbeTransport};
use serde::{Deserialize, Serialize};

/// Coarse three-level summary of estimated bandwidth and latency.
///
/// Ordered from most to least conservative, so the minimum of a set of
/// classes is the most conservative one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NetworkClass {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl NetworkClass {
    /// Returns the most conservative class in the set, if any.
    pub fn most_conservative(classes: impl IntoIterator<Item = NetworkClass>) -> Option<Self> {
        classes.into_iter().min()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkClass::Slow => "slow",
            NetworkClass::Medium => "medium",
            NetworkClass::Fast => "fast",
        }
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(NetworkClass::Slow),
            "medium" => Ok(NetworkClass::Medium),
            "fast" => Ok(NetworkClass::Fast),
            other => Err(format!("unknown network class: {other}")),
        }
    }
}

/// Categorical connection type reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
    /// A type the client reported that none of the above covers
    Unknown,
}

impl FromStr for EffectiveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(EffectiveType::Slow2g),
            "2g" => Ok(EffectiveType::TwoG),
            "3g" => Ok(EffectiveType::ThreeG),
            "4g" => Ok(EffectiveType::FourG),
            "" => Err("empty effective type".to_string()),
            _ => Ok(EffectiveType::Unknown),
        }
    }
}

/// Connection signals exposed by the client environment.
///
/// Every signal is optional; absence is a normal outcome and simply makes
/// the corresponding probe unavailable.
pub trait ConnectionHints: Send + Sync {
    /// Estimated downlink bandwidth in Mbps
    fn downlink_mbps(&self) -> Option<f64>;

    /// Categorical connection type
    fn effective_type(&self) -> Option<EffectiveType>;

    /// Estimated round-trip time in milliseconds
    fn rtt_ms(&self) -> Option<u32>;

    /// Whether the client exposes connection information at all, even if
    /// neither downlink nor type carries a usable value.
    fn connection_available(&self) -> bool {
        self.downlink_mbps().is_some() || self.effective_type().is_some()
    }
}

/// Fixed connection hints, e.g. parsed from a client report or CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticHints {
    pub downlink_mbps: Option<f64>,
    pub effective_type: Option<EffectiveType>,
    pub rtt_ms: Option<u32>,
}

impl StaticHints {
    /// Hints for an environment that exposes no connection information.
    pub fn none() -> Self {
        Self::default()
    }
}

impl ConnectionHints for StaticHints {
    fn downlink_mbps(&self) -> Option<f64> {
        self.downlink_mbps
    }

    fn effective_type(&self) -> Option<EffectiveType> {
        self.effective_type
    }

    fn rtt_ms(&self) -> Option<u32> {
        self.rtt_ms
    }
}
