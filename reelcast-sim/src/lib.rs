//! Reelcast Simulation - Deterministic testing for adaptive playback.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! This crate runs network detection and player sessions under controlled,
//! reproducible conditions.
//!
//! # Features
//!
//! - **Deterministic Execution**: Same seed always produces identical results
//! - **Network Simulation**: Configurable latency, failures, and bandwidth
//!   behind the same probe transport the production detector uses
//! - **Network Profiles**: Pre-built client environments from 2G to fiber
//! - **Playback Scripts**: Media element timelines replayed on a manual clock
//!
//! # Example
//!
//! ```rust,no_run
//! use reelcast_core::SpeedDetector;
//! use reelcast_core::config::ProbeConfig;
//! use reelcast_sim::NetworkProfile;
//!
//! # async fn run() {
//! let detector = NetworkProfile::Mobile3g.detector(42, ProbeConfig::default());
//! let class = detector.detect_speed().await;
//! println!("Detected {class}");
//! # }
//! ```

pub mod deterministic;
pub mod network;
pub mod playback;
pub mod profiles;

pub use deterministic::{DeterministicClock, DeterministicRng};
pub use network::{NetworkConditions, NetworkConditionsBuilder, SimulatedProbeTransport};
pub use playback::{PlaybackScript, PlaybackStep, random_viewing};
pub use profiles::{NetworkProfile, SIMULATED_PROBE_URL};

/// Errors raised by simulation components.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Simulated time was moved in a way the clock does not allow.
    #[error("Invalid time step: {reason}")]
    InvalidTimeStep {
        /// Why the step was rejected
        reason: String,
    },
}
