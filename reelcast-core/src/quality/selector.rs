//! Quality selection heuristics
//!
//! Pure functions: identical inputs always produce the identical descriptor.

use super::QualityDescriptor;
use crate::network::NetworkClass;

/// Preference value meaning "let the selector decide".
const AUTO_PREFERENCE: &str = "auto";

/// Picks the quality to play for a network class and optional preference.
///
/// An explicit preference matching a catalog label (case-insensitive) always
/// wins; only the exact lowercase `"auto"` means no preference. Otherwise the "Auto" pseudo-entry is ignored and the class decides:
///
/// - slow: the highest entry at or below 360p, else the lowest entry
/// - medium: the lowest entry within 480p..=720p, else the highest at or
///   below 720p, else the lowest entry
/// - fast: the highest entry, since anything at or above 1080p sorts first
///
/// Returns `None` only for an empty catalog. A catalog holding nothing but
/// "Auto" yields its first entry.
pub fn select_optimal_quality<'a>(
    catalog: &'a [QualityDescriptor],
    network: NetworkClass,
    preference: Option<&str>,
) -> Option<&'a QualityDescriptor> {
    let (first, sorted) = prepare(catalog, preference)?;
    let Some(sorted) = sorted else {
        return Some(first);
    };

    let lowest = sorted[sorted.len() - 1];
    let selected = match network {
        NetworkClass::Slow => sorted.iter().find(|q| q.height <= 360).copied(),
        NetworkClass::Medium => sorted
            .iter()
            .rev()
            .find(|q| (480..=720).contains(&q.height))
            .or_else(|| sorted.iter().find(|q| q.height <= 720))
            .copied(),
        NetworkClass::Fast => sorted
            .iter()
            .find(|q| q.height >= 1080)
            .copied()
            .or(Some(sorted[0])),
    };

    Some(selected.unwrap_or(lowest))
}

/// Picks the middle quality when no network class is known.
///
/// Follows the same preference and "Auto" rules as
/// [`select_optimal_quality`].
pub fn select_middle_quality<'a>(
    catalog: &'a [QualityDescriptor],
    preference: Option<&str>,
) -> Option<&'a QualityDescriptor> {
    let (first, sorted) = prepare(catalog, preference)?;
    match sorted {
        Some(sorted) => Some(sorted[sorted.len() / 2]),
        None => Some(first),
    }
}

/// Shared preamble of the selectors.
///
/// Returns the entry to use as-is when the preference matched or nothing but
/// "Auto" is available, or the real qualities sorted by descending height.
fn prepare<'a>(
    catalog: &'a [QualityDescriptor],
    preference: Option<&str>,
) -> Option<(&'a QualityDescriptor, Option<Vec<&'a QualityDescriptor>>)> {
    let first = catalog.first()?;

    if let Some(preferred) = preference.filter(|p| *p != AUTO_PREFERENCE) {
        if let Some(entry) = catalog.iter().find(|q| q.matches_label(preferred)) {
            return Some((entry, None));
        }
    }

    let mut sorted: Vec<&QualityDescriptor> = catalog.iter().filter(|q| !q.is_auto()).collect();
    if sorted.is_empty() {
        return Some((first, None));
    }

    // Stable, so equal heights keep catalog order.
    sorted.sort_by(|a, b| b.height.cmp(&a.height));
    Some((first, Some(sorted)))
}

/// Estimates the quality an upload can sustain from its average bitrate.
///
/// `file_size` is in bytes and `duration_secs` in seconds.
pub fn estimate_quality_for_bitrate(file_size: u64, duration_secs: f64) -> &'static str {
    if duration_secs <= 0.0 {
        return "360p";
    }

    let kbps = (file_size as f64 * 8.0) / duration_secs / 1000.0;
    if kbps > 4000.0 {
        "1080p"
    } else if kbps > 2000.0 {
        "720p"
    } else if kbps > 800.0 {
        "480p"
    } else {
        "360p"
    }
}
