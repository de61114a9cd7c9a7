//! Individual network probes and their classification rules
//!
//! Each probe produces either a network class or a typed reason why it could
//! not. Probes never panic and never block past their configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use super::{ConnectionHints, EffectiveType, NetworkClass};
use crate::config::ProbeConfig;

/// The independent probes combined by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Downlink or effective-type hint from the client
    ConnectionHint,
    /// Timed download of a small asset
    Download,
    /// Round-trip-time hint from the client
    RoundTrip,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 3] = [
        ProbeKind::ConnectionHint,
        ProbeKind::Download,
        ProbeKind::RoundTrip,
    ];
}

/// Reasons a probe produced no classification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    /// The signal this probe relies on is not exposed.
    #[error("{probe:?} probe unavailable")]
    Unavailable { probe: ProbeKind },

    /// The download did not finish in time.
    #[error("probe request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// The request could not be sent or its body could not be read.
    #[error("probe request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("probe request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The HTTP client could not be built.
    #[error("probe client setup failed: {reason}")]
    ClientSetup { reason: String },
}

/// HTTP transport used by the download probe and variant discovery.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Fetches the full body of `url`.
    ///
    /// # Errors
    ///
    /// - `ProbeError::Request` - Network failure or unreadable body
    /// - `ProbeError::Status` - Non-2xx response
    /// - `ProbeError::Timeout` - Transport-level timeout
    async fn fetch(&self, url: &Url) -> Result<Bytes, ProbeError>;

    /// Issues a HEAD request and returns the status code.
    ///
    /// # Errors
    ///
    /// - `ProbeError::Request` - Network failure
    /// - `ProbeError::Timeout` - Transport-level timeout
    async fn head(&self, url: &Url) -> Result<u16, ProbeError>;
}

/// Production probe transport using reqwest.
pub struct ProductionProbeTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ProductionProbeTransport {
    /// Creates a transport whose requests give up after `config.timeout`.
    ///
    /// # Errors
    ///
    /// - `ProbeError::ClientSetup` - TLS backend or client configuration failed
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .map_err(|e| ProbeError::ClientSetup {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    fn map_send_error(&self, url: &Url, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else if e.is_connect() {
            ProbeError::Request {
                url: url.to_string(),
                reason: "failed to connect".to_string(),
            }
        } else {
            ProbeError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ProbeTransport for ProductionProbeTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes, ProbeError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| ProbeError::Request {
                url: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            })
    }

    async fn head(&self, url: &Url) -> Result<u16, ProbeError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        Ok(response.status().as_u16())
    }
}

/// Maps a downlink estimate in Mbps onto a class.
pub fn classify_downlink(mbps: f64) -> NetworkClass {
    if mbps < 1.0 {
        NetworkClass::Slow
    } else if mbps < 5.0 {
        NetworkClass::Medium
    } else {
        NetworkClass::Fast
    }
}

/// Maps a categorical connection type onto a class.
///
/// An unspecified or unrecognized type is treated as fast.
pub fn classify_effective_type(effective_type: Option<EffectiveType>) -> NetworkClass {
    match effective_type {
        Some(EffectiveType::Slow2g | EffectiveType::TwoG) => NetworkClass::Slow,
        Some(EffectiveType::ThreeG) => NetworkClass::Medium,
        Some(EffectiveType::FourG | EffectiveType::Unknown) | None => NetworkClass::Fast,
    }
}

/// Maps a round-trip time in milliseconds onto a class.
pub fn classify_rtt(rtt_ms: u32) -> NetworkClass {
    if rtt_ms > 300 {
        NetworkClass::Slow
    } else if rtt_ms > 100 {
        NetworkClass::Medium
    } else {
        NetworkClass::Fast
    }
}

/// Maps a probe download duration onto a class.
pub fn classify_download(elapsed: Duration, config: &ProbeConfig) -> NetworkClass {
    if elapsed > config.slow_after {
        NetworkClass::Slow
    } else if elapsed > config.medium_after {
        NetworkClass::Medium
    } else {
        NetworkClass::Fast
    }
}

/// Classifies the connection from downlink or effective-type hints.
///
/// A positive downlink decides; otherwise the effective type does. An
/// exposed connection without a usable value of either counts as fast.
///
/// # Errors
///
/// - `ProbeError::Unavailable` - The client exposes no connection information
pub fn probe_connection_hint(hints: &dyn ConnectionHints) -> Result<NetworkClass, ProbeError> {
    if !hints.connection_available() {
        return Err(ProbeError::Unavailable {
            probe: ProbeKind::ConnectionHint,
        });
    }

    match hints.downlink_mbps() {
        Some(mbps) if mbps > 0.0 => Ok(classify_downlink(mbps)),
        _ => Ok(classify_effective_type(hints.effective_type())),
    }
}

/// Classifies the connection from the round-trip-time hint.
///
/// # Errors
///
/// - `ProbeError::Unavailable` - No RTT hint, or a zero hint
pub fn probe_round_trip(hints: &dyn ConnectionHints) -> Result<NetworkClass, ProbeError> {
    match hints.rtt_ms() {
        Some(rtt) if rtt > 0 => Ok(classify_rtt(rtt)),
        _ => Err(ProbeError::Unavailable {
            probe: ProbeKind::RoundTrip,
        }),
    }
}

/// Times a download of the probe asset and classifies the duration.
///
/// A cache-busting `t` parameter is added so intermediaries cannot answer
/// from cache.
///
/// # Errors
///
/// - `ProbeError::Timeout` - Download exceeded `config.timeout`
/// - `ProbeError::Request` / `ProbeError::Status` - Transport failure
pub async fn probe_download(
    transport: &dyn ProbeTransport,
    probe_url: &Url,
    config: &ProbeConfig,
) -> Result<NetworkClass, ProbeError> {
    let url = cache_busted(probe_url);
    let started = Instant::now();

    let body = tokio::time::timeout(config.timeout, transport.fetch(&url))
        .await
        .map_err(|_| ProbeError::Timeout {
            url: url.to_string(),
            after: config.timeout,
        })??;

    let elapsed = started.elapsed();
    let class = classify_download(elapsed, config);
    debug!(
        "Download probe fetched {} bytes in {:?}: {}",
        body.len(),
        elapsed,
        class
    );
    Ok(class)
}

/// Returns `url` with a `t=<unix millis>` query parameter appended.
pub fn cache_busted(url: &Url) -> Url {
    let mut busted = url.clone();
    let stamp = chrono::Utc::now().timestamp_millis().to_string();
    busted.query_pairs_mut().append_pair("t", &stamp);
    busted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StaticHints;

    #[test]
    fn test_classify_downlink_boundaries() {
        assert_eq!(classify_downlink(0.5), NetworkClass::Slow);
        assert_eq!(classify_downlink(1.0), NetworkClass::Medium);
        assert_eq!(classify_downlink(4.99), NetworkClass::Medium);
        assert_eq!(classify_downlink(5.0), NetworkClass::Fast);
    }

    #[test]
    fn test_classify_rtt_boundaries() {
        assert_eq!(classify_rtt(301), NetworkClass::Slow);
        assert_eq!(classify_rtt(300), NetworkClass::Medium);
        assert_eq!(classify_rtt(101), NetworkClass::Medium);
        assert_eq!(classify_rtt(100), NetworkClass::Fast);
    }

    #[test]
    fn test_classify_download_boundaries() {
        let config = ProbeConfig::default();
        assert_eq!(
            classify_download(Duration::from_millis(2001), &config),
            NetworkClass::Slow
        );
        assert_eq!(
            classify_download(Duration::from_secs(2), &config),
            NetworkClass::Medium
        );
        assert_eq!(
            classify_download(Duration::from_millis(500), &config),
            NetworkClass::Fast
        );
    }

    #[test]
    fn test_connection_hint_prefers_downlink() {
        let hints = StaticHints {
            downlink_mbps: Some(0.4),
            effective_type: Some(EffectiveType::FourG),
            rtt_ms: None,
        };
        assert_eq!(probe_connection_hint(&hints), Ok(NetworkClass::Slow));
    }

    #[test]
    fn test_connection_hint_falls_back_to_effective_type() {
        let hints = StaticHints {
            effective_type: Some(EffectiveType::ThreeG),
            ..Default::default()
        };
        assert_eq!(probe_connection_hint(&hints), Ok(NetworkClass::Medium));

        let hints = StaticHints {
            effective_type: Some(EffectiveType::TwoG),
            ..Default::default()
        };
        assert_eq!(probe_connection_hint(&hints), Ok(NetworkClass::Slow));
    }

    #[tokio::test]
    async fn test_timeout_reports_configured_limit() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = ProbeConfig {
            timeout: Duration::from_millis(150),
            ..ProbeConfig::default()
        };
        let transport = ProductionProbeTransport::new(&config).unwrap();
        let url = Url::parse(&format!("http://{addr}/probe.svg")).unwrap();

        let err = transport.fetch(&url).await.unwrap_err();
        assert_eq!(
            err,
            ProbeError::Timeout {
                url: url.to_string(),
                after: Duration::from_millis(150),
            }
        );
        assert!(err.to_string().contains("150ms"));
        server.abort();
    }

    #[test]
    fn test_exposed_connection_without_values_is_fast() {
        let hints = StaticHints {
            downlink_mbps: Some(0.0),
            ..Default::default()
        };
        assert_eq!(probe_connection_hint(&hints), Ok(NetworkClass::Fast));

        let hints = StaticHints {
            effective_type: Some("5g".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(hints.effective_type, Some(EffectiveType::Unknown));
        assert_eq!(probe_connection_hint(&hints), Ok(NetworkClass::Fast));
    }

    #[test]
    fn test_missing_hints_are_unavailable() {
        let hints = StaticHints::none();
        assert_eq!(
            probe_connection_hint(&hints),
            Err(ProbeError::Unavailable {
                probe: ProbeKind::ConnectionHint
            })
        );
        assert_eq!(
            probe_round_trip(&hints),
            Err(ProbeError::Unavailable {
                probe: ProbeKind::RoundTrip
            })
        );
    }

    #[test]
    fn test_cache_busted_keeps_existing_query() {
        let url = Url::parse("http://localhost:3000/probe.svg?v=2").unwrap();
        let busted = cache_busted(&url);

        let pairs: Vec<(String, String)> = busted.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("v".to_string(), "2".to_string()));
        assert_eq!(pairs[1].0, "t");
        assert_eq!(busted.path(), "/probe.svg");
    }
}
