//! Quality descriptors, per-video catalogs, and quality selection
//!
//! A catalog is a fixed list of target resolutions combined with a video's
//! base stream URL. Selection is a pure function of the catalog, the network
//! class, and an optional user preference.

pub mod catalog;
pub mod selector;

use std::fmt;

pub use catalog::{CatalogError, QualityCatalog, TARGET_RESOLUTIONS, TargetResolution};
pub use selector::{estimate_quality_for_bitrate, select_middle_quality, select_optimal_quality};
use serde::{Deserialize, Serialize};

/// Label of the pseudo-entry that lets the player decide.
pub const AUTO_LABEL: &str = "Auto";

/// Nominal bitrate of a quality variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Bitrate {
    /// Target rate in kbps, e.g. 5000 for "5000k"
    Kbps(u32),
    /// Descriptive tag such as "adaptive" or "original"
    Tag(String),
}

impl Bitrate {
    /// Parses `"2500k"` style rates, keeping anything else as a tag.
    pub fn parse(value: &str) -> Self {
        value
            .strip_suffix('k')
            .and_then(|digits| digits.parse().ok())
            .map(Bitrate::Kbps)
            .unwrap_or_else(|| Bitrate::Tag(value.to_string()))
    }
}

impl From<String> for Bitrate {
    fn from(value: String) -> Self {
        Bitrate::parse(&value)
    }
}

impl From<Bitrate> for String {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.to_string()
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bitrate::Kbps(kbps) => write!(f, "{kbps}k"),
            Bitrate::Tag(tag) => f.write_str(tag),
        }
    }
}

/// A named, fixed-resolution variant pointing at a playback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDescriptor {
    pub label: String,
    /// Pixel height; 0 for the "Auto" pseudo-entry
    pub height: u32,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<Bitrate>,
}

impl QualityDescriptor {
    pub fn new(label: impl Into<String>, height: u32, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            height,
            url: url.into(),
            bitrate: None,
        }
    }

    pub fn with_bitrate(mut self, bitrate: Bitrate) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Whether this is the "Auto" pseudo-entry.
    pub fn is_auto(&self) -> bool {
        self.label == AUTO_LABEL
    }

    /// Case-insensitive label comparison.
    pub fn matches_label(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_parse() {
        assert_eq!(Bitrate::parse("5000k"), Bitrate::Kbps(5000));
        assert_eq!(Bitrate::parse("adaptive"), Bitrate::Tag("adaptive".to_string()));
        assert_eq!(Bitrate::Kbps(600).to_string(), "600k");
    }

    #[test]
    fn test_descriptor_serializes_without_missing_bitrate() {
        let descriptor = QualityDescriptor::new("720p", 720, "/v.mp4");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("bitrate").is_none());

        let json = serde_json::to_value(descriptor.with_bitrate(Bitrate::Kbps(2500))).unwrap();
        assert_eq!(json["bitrate"], "2500k");
    }
}
