//! Test doubles for code that depends on a [`SpeedDetector`].

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{NetworkClass, SpeedDetector};

/// Detector that always measures the same class and counts measurements.
///
/// The cached class starts at the medium default, like the real detector.
#[derive(Debug)]
pub struct FixedSpeedDetector {
    measured: NetworkClass,
    current: Mutex<NetworkClass>,
    measurements: Mutex<u32>,
}

impl FixedSpeedDetector {
    pub fn new(measured: NetworkClass) -> Self {
        Self {
            measured,
            current: Mutex::new(NetworkClass::default()),
            measurements: Mutex::new(0),
        }
    }

    /// How many times `detect_speed` ran.
    pub fn measurements(&self) -> u32 {
        *self.measurements.lock()
    }
}

#[async_trait]
impl SpeedDetector for FixedSpeedDetector {
    async fn detect_speed(&self) -> NetworkClass {
        *self.measurements.lock() += 1;
        self.measured
    }

    fn current_speed(&self) -> NetworkClass {
        *self.current.lock()
    }

    fn set_current_speed(&self, class: NetworkClass) {
        *self.current.lock() = class;
    }
}
