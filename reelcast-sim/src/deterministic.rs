//! Time control and random number generation for reproducible runs.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::SimulationError;

/// Maximum time that can be advanced in a single operation (24 hours).
const MAX_TIME_ADVANCE: Duration = Duration::from_secs(86400);

/// Clock that only moves when told to.
///
/// Hands out `Instant`s for [`reelcast_core::PlayerSession::handle_event_at`]
/// so stall durations are exact regardless of wall-clock time.
#[derive(Debug, Clone)]
pub struct DeterministicClock {
    current_time: Instant,
    start_time: Instant,
}

impl Default for DeterministicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicClock {
    /// Creates a clock at simulation time zero.
    pub fn new() -> Self {
        let start = Instant::now();
        Self {
            current_time: start,
            start_time: start,
        }
    }

    /// Returns current simulation time.
    pub fn now(&self) -> Instant {
        self.current_time
    }

    /// Returns elapsed time since simulation start.
    pub fn elapsed(&self) -> Duration {
        self.current_time.duration_since(self.start_time)
    }

    /// Advances simulation time.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidTimeStep` - Step exceeds 24 hours
    pub fn advance(&mut self, duration: Duration) -> Result<(), SimulationError> {
        if duration > MAX_TIME_ADVANCE {
            return Err(SimulationError::InvalidTimeStep {
                reason: format!("cannot advance by {duration:?}, limit is 24 hours"),
            });
        }
        self.current_time += duration;
        Ok(())
    }

    /// Advances simulation time to a specific instant.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidTimeStep` - Target is in the past
    pub fn advance_to(&mut self, target: Instant) -> Result<(), SimulationError> {
        if target < self.current_time {
            return Err(SimulationError::InvalidTimeStep {
                reason: "cannot advance time backwards".to_string(),
            });
        }
        self.current_time = target;
        Ok(())
    }
}

/// Seeded random source; identical seeds give identical sequences.
#[derive(Debug)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl DeterministicRng {
    /// Creates an RNG from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed this RNG was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates a number in `[0, 1)`.
    pub fn random_f64(&mut self) -> f64 {
        self.rng.random()
    }

    /// Generates a number in `[min, max)`; returns `min` for an empty range.
    pub fn random_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Returns true with the given probability, clamped to `[0, 1]`.
    pub fn random_bool(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }
}
