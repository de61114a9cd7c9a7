//! Per-video quality catalogs
//!
//! Catalogs are derived from a fixed list of target resolutions rather than
//! discovered from encoded variants. By default every entry points at the
//! video's single stream URL; `with_variant_urls` and `discover` address
//! suffixed variant files when those exist.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{AUTO_LABEL, Bitrate, QualityDescriptor};
use crate::network::ProbeTransport;

/// Target resolution a video may be offered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetResolution {
    pub label: &'static str,
    pub height: u32,
    pub width: u32,
    pub bitrate_kbps: u32,
    /// Appended to the file stem of a variant file
    pub suffix: &'static str,
}

/// Fixed target resolutions, highest first.
pub static TARGET_RESOLUTIONS: [TargetResolution; 4] = [
    TargetResolution {
        label: "1080p",
        height: 1080,
        width: 1920,
        bitrate_kbps: 5000,
        suffix: "_1080p",
    },
    TargetResolution {
        label: "720p",
        height: 720,
        width: 1280,
        bitrate_kbps: 2500,
        suffix: "_720p",
    },
    TargetResolution {
        label: "480p",
        height: 480,
        width: 854,
        bitrate_kbps: 1000,
        suffix: "_480p",
    },
    TargetResolution {
        label: "360p",
        height: 360,
        width: 640,
        bitrate_kbps: 600,
        suffix: "_360p",
    },
];

/// Height assumed for an untranscoded upload.
const ORIGINAL_HEIGHT: u32 = 1080;

static VIDEO_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp4|webm|mov)$").expect("video extension pattern is valid")
});

/// Errors raised while building a catalog.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// A catalog needs at least one entry.
    #[error("quality catalog is empty")]
    Empty,

    /// Labels must be unique within a video's catalog.
    #[error("duplicate quality label: {label}")]
    DuplicateLabel { label: String },

    /// A variant URL could not be formed.
    #[error("invalid variant URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Ordered, label-unique list of quality descriptors for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityCatalog {
    entries: Vec<QualityDescriptor>,
}

impl QualityCatalog {
    /// Creates a catalog from explicit entries.
    ///
    /// # Errors
    ///
    /// - `CatalogError::Empty` - No entries given
    /// - `CatalogError::DuplicateLabel` - Two entries share a label (case-insensitive)
    pub fn new(entries: Vec<QualityDescriptor>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        for (index, entry) in entries.iter().enumerate() {
            if entries[..index].iter().any(|e| e.matches_label(&entry.label)) {
                return Err(CatalogError::DuplicateLabel {
                    label: entry.label.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Builds the static catalog for a stream: "Auto" followed by every
    /// target resolution, all pointing at `base_url`.
    pub fn for_stream(base_url: &str) -> Self {
        Self::from_targets(base_url, TARGET_RESOLUTIONS.iter(), |_| base_url.to_string())
    }

    /// Like [`QualityCatalog::for_stream`] but limited to the given labels.
    pub fn for_stream_with_levels(base_url: &str, levels: &[String]) -> Self {
        let targets = TARGET_RESOLUTIONS
            .iter()
            .filter(|target| levels.iter().any(|l| l.eq_ignore_ascii_case(target.label)));
        Self::from_targets(base_url, targets, |_| base_url.to_string())
    }

    /// Builds a catalog whose entries address suffixed variant files,
    /// e.g. `movie.mp4` becomes `movie_720p.mp4`.
    ///
    /// URLs without a recognized video extension are used unchanged.
    pub fn with_variant_urls(base_url: &str) -> Self {
        Self::from_targets(base_url, TARGET_RESOLUTIONS.iter(), |target| {
            variant_url(base_url, target)
        })
    }

    /// Probes each suffixed variant with a HEAD request and keeps the ones
    /// that answer successfully.
    ///
    /// When no variant exists the untranscoded upload is offered as
    /// "Original", assumed to be 1080 pixels high.
    ///
    /// # Errors
    ///
    /// - `CatalogError::InvalidUrl` - A variant URL could not be parsed
    pub async fn discover(
        base_url: &Url,
        transport: &dyn ProbeTransport,
    ) -> Result<Self, CatalogError> {
        let base = base_url.as_str();
        let mut entries = vec![auto_entry(base)];

        for target in &TARGET_RESOLUTIONS {
            let candidate = variant_url(base, target);
            let url = Url::parse(&candidate).map_err(|e| CatalogError::InvalidUrl {
                url: candidate.clone(),
                reason: e.to_string(),
            })?;

            match transport.head(&url).await {
                Ok(status) if (200..300).contains(&status) => {
                    entries.push(target_entry(target, candidate));
                }
                Ok(status) => debug!("Quality {} not available ({})", target.label, status),
                Err(e) => debug!("Quality {} not available: {}", target.label, e),
            }
        }

        if entries.len() == 1 {
            entries.push(
                QualityDescriptor::new("Original", ORIGINAL_HEIGHT, base)
                    .with_bitrate(Bitrate::Tag("original".to_string())),
            );
        }

        Self::new(entries)
    }

    fn from_targets<'a>(
        base_url: &str,
        targets: impl Iterator<Item = &'a TargetResolution>,
        url_for: impl Fn(&TargetResolution) -> String,
    ) -> Self {
        let mut entries = vec![auto_entry(base_url)];
        entries.extend(targets.map(|target| target_entry(target, url_for(target))));
        Self { entries }
    }

    /// Label the player should start from: the first real quality, or
    /// "Auto" when the catalog only has the pseudo-entry.
    pub fn default_label(&self) -> &str {
        self.entries
            .iter()
            .find(|entry| !entry.is_auto())
            .map(|entry| entry.label.as_str())
            .unwrap_or(AUTO_LABEL)
    }

    /// Looks up an entry by case-insensitive label.
    pub fn find(&self, label: &str) -> Option<&QualityDescriptor> {
        self.entries.iter().find(|entry| entry.matches_label(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.find(label).is_some()
    }

    pub fn first(&self) -> Option<&QualityDescriptor> {
        self.entries.first()
    }

    pub fn as_slice(&self) -> &[QualityDescriptor] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QualityDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AsRef<[QualityDescriptor]> for QualityCatalog {
    fn as_ref(&self) -> &[QualityDescriptor] {
        &self.entries
    }
}

fn auto_entry(base_url: &str) -> QualityDescriptor {
    QualityDescriptor::new(AUTO_LABEL, 0, base_url).with_bitrate(Bitrate::Tag("adaptive".into()))
}

fn target_entry(target: &TargetResolution, url: String) -> QualityDescriptor {
    QualityDescriptor::new(target.label, target.height, url)
        .with_bitrate(Bitrate::Kbps(target.bitrate_kbps))
}

fn variant_url(base_url: &str, target: &TargetResolution) -> String {
    VIDEO_EXTENSION
        .replace(base_url, format!("{}.$1", target.suffix).as_str())
        .into_owned()
}
