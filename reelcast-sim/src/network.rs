//! Simulated HTTP transport for probes and variant discovery

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reelcast_core::network::{ProbeError, ProbeTransport};
use tracing::trace;
use url::Url;

use crate::deterministic::DeterministicRng;

/// Network conditions applied to every simulated request.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConditions {
    /// Per-request latency range in milliseconds
    pub latency_ms: Range<u64>,
    /// Probability (0.0-1.0) that a request fails outright
    pub failure_rate: f64,
    /// Throughput limit in bytes per second
    pub bandwidth_limit: u64,
    /// Size of the body returned by `fetch`
    pub payload_bytes: usize,
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self {
            latency_ms: 10..50,
            failure_rate: 0.0,
            bandwidth_limit: u64::MAX,
            payload_bytes: 2048,
        }
    }
}

impl NetworkConditions {
    /// Returns builder for customizing network conditions.
    pub fn builder() -> NetworkConditionsBuilder {
        NetworkConditionsBuilder {
            conditions: Self::default(),
        }
    }

    /// Time needed to move `bytes` through the bandwidth limit.
    pub fn transfer_delay(&self, bytes: usize) -> Duration {
        if self.bandwidth_limit == u64::MAX || self.bandwidth_limit == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(bytes as f64 / self.bandwidth_limit as f64)
        }
    }
}

/// Builder for [`NetworkConditions`].
pub struct NetworkConditionsBuilder {
    conditions: NetworkConditions,
}

impl NetworkConditionsBuilder {
    /// Sets latency range in milliseconds.
    pub fn latency(mut self, range: Range<u64>) -> Self {
        self.conditions.latency_ms = range;
        self
    }

    /// Sets request failure probability (0.0-1.0).
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.conditions.failure_rate = rate;
        self
    }

    /// Sets bandwidth limit in bytes per second.
    pub fn bandwidth_limit(mut self, bytes_per_second: u64) -> Self {
        self.conditions.bandwidth_limit = bytes_per_second;
        self
    }

    /// Sets the size of fetched bodies.
    pub fn payload_bytes(mut self, bytes: usize) -> Self {
        self.conditions.payload_bytes = bytes;
        self
    }

    /// Creates the configured conditions.
    pub fn build(self) -> NetworkConditions {
        self.conditions
    }
}

/// Probe transport that sleeps on the tokio clock instead of doing I/O.
///
/// Under `tokio::time::pause` the simulated latency elapses instantly while
/// the download probe still measures it, so whole detection runs are
/// deterministic for a given seed.
pub struct SimulatedProbeTransport {
    conditions: NetworkConditions,
    rng: Mutex<DeterministicRng>,
    available_paths: Option<Vec<String>>,
    requests: Mutex<Vec<Url>>,
}

impl SimulatedProbeTransport {
    /// Creates a transport for `conditions`, seeded with `seed`.
    pub fn new(conditions: NetworkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: Mutex::new(DeterministicRng::from_seed(seed)),
            available_paths: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Restricts HEAD success to URLs whose path ends with one of `paths`.
    /// Without this every HEAD succeeds.
    pub fn with_available_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().clone()
    }

    /// Rolls latency and failure for one request.
    fn roll(&self, url: &Url) -> Result<Duration, ProbeError> {
        self.requests.lock().push(url.clone());

        let mut rng = self.rng.lock();
        if rng.random_bool(self.conditions.failure_rate) {
            return Err(ProbeError::Request {
                url: url.to_string(),
                reason: "simulated connection reset".to_string(),
            });
        }

        let latency = rng.random_range(self.conditions.latency_ms.start, self.conditions.latency_ms.end);
        Ok(Duration::from_millis(latency))
    }
}

#[async_trait]
impl ProbeTransport for SimulatedProbeTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes, ProbeError> {
        let latency = self.roll(url)?;
        let delay = latency + self.conditions.transfer_delay(self.conditions.payload_bytes);
        trace!("Simulated fetch of {} takes {:?}", url, delay);

        tokio::time::sleep(delay).await;
        Ok(Bytes::from(vec![0u8; self.conditions.payload_bytes]))
    }

    async fn head(&self, url: &Url) -> Result<u16, ProbeError> {
        let latency = self.roll(url)?;
        tokio::time::sleep(latency).await;

        let found = match &self.available_paths {
            Some(paths) => paths.iter().any(|p| url.path().ends_with(p.as_str())),
            None => true,
        };
        Ok(if found { 200 } else { 404 })
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://sim.local").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_transfer_delay() {
        let unlimited = NetworkConditions::default();
        assert_eq!(unlimited.transfer_delay(1_000_000), Duration::ZERO);

        let limited = NetworkConditions::builder()
            .bandwidth_limit(1_000_000)
            .build();
        assert_eq!(limited.transfer_delay(500_000), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_takes_latency_plus_transfer() {
        let conditions = NetworkConditions::builder()
            .latency(100..101)
            .bandwidth_limit(10_000)
            .payload_bytes(5_000)
            .build();
        let transport = SimulatedProbeTransport::new(conditions, 1);

        let started = Instant::now();
        let body = transport.fetch(&url("/probe.svg")).await.unwrap();

        assert_eq!(body.len(), 5_000);
        assert_eq!(started.elapsed(), Duration::from_millis(600));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_rate_fails_every_request() {
        let conditions = NetworkConditions::builder().failure_rate(1.0).build();
        let transport = SimulatedProbeTransport::new(conditions, 9);

        for _ in 0..10 {
            let result = transport.fetch(&url("/probe.svg")).await;
            assert!(matches!(result, Err(ProbeError::Request { .. })));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_head_honors_available_paths() {
        let transport = SimulatedProbeTransport::new(NetworkConditions::default(), 3)
            .with_available_paths(["_720p.mp4"]);

        assert_eq!(transport.head(&url("/m/a_720p.mp4")).await, Ok(200));
        assert_eq!(transport.head(&url("/m/a_1080p.mp4")).await, Ok(404));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_latencies() {
        let conditions = NetworkConditions::builder().latency(10..500).build();
        let a = SimulatedProbeTransport::new(conditions.clone(), 77);
        let b = SimulatedProbeTransport::new(conditions, 77);
        let probe = url("/probe.svg");

        for _ in 0..5 {
            assert_eq!(a.roll(&probe), b.roll(&probe));
        }
    }
}
