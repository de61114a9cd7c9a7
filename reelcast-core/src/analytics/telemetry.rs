//! Destinations for flushed analytics

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use url::Url;

use super::VideoMetrics;

/// Errors delivering a metrics batch.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The batch could not be sent.
    #[error("telemetry request failed: {reason}")]
    Request { reason: String },

    /// The backend answered with a non-success status.
    #[error("telemetry backend rejected batch with status {status}")]
    Rejected { status: u16 },

    /// The endpoint URL could not be formed.
    #[error("invalid telemetry endpoint: {url}")]
    InvalidEndpoint { url: String },
}

/// Receives flushed per-video metrics.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Delivers one batch of metrics for `video_id`.
    ///
    /// # Errors
    ///
    /// - `TelemetryError` - Delivery failed; the caller keeps the batch
    async fn send(&self, video_id: &str, metrics: &VideoMetrics) -> Result<(), TelemetryError>;
}

/// Writes batches to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn send(&self, video_id: &str, metrics: &VideoMetrics) -> Result<(), TelemetryError> {
        info!(
            video_id,
            quality_switches = metrics.quality_switches.len(),
            buffering_events = metrics.buffering_events.len(),
            buffering_ms = metrics.total_buffering_ms(),
            "Playback telemetry"
        );
        Ok(())
    }
}

/// Posts batches as JSON to `{base}/api/videos/{id}/telemetry`.
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTelemetrySink {
    /// # Errors
    ///
    /// - `TelemetryError::Request` - HTTP client could not be built
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Request {
                reason: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, video_id: &str) -> Result<Url, TelemetryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TelemetryError::InvalidEndpoint {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "videos", video_id, "telemetry"]);
        Ok(url)
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn send(&self, video_id: &str, metrics: &VideoMetrics) -> Result<(), TelemetryError> {
        let url = self.endpoint(video_id)?;
        let response = self
            .client
            .post(url)
            .json(metrics)
            .send()
            .await
            .map_err(|e| TelemetryError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_escapes_video_id() {
        let base = Url::parse("http://localhost:3000/").unwrap();
        let sink = HttpTelemetrySink::new(base, Duration::from_secs(1)).unwrap();

        let url = sink.endpoint("clip 1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/videos/clip%201/telemetry");
    }

    #[test]
    fn test_endpoint_rejects_opaque_base() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        let sink = HttpTelemetrySink::new(base, Duration::from_secs(1)).unwrap();

        assert!(matches!(
            sink.endpoint("v1"),
            Err(TelemetryError::InvalidEndpoint { .. })
        ));
    }
}
