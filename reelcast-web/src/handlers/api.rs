//! JSON API handlers: quality catalogs, probe asset and telemetry

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use reelcast_core::analytics::telemetry::{TelemetrySink, TracingTelemetrySink};
use reelcast_core::quality::{AUTO_LABEL, Bitrate, QualityCatalog, QualityDescriptor};
use reelcast_core::VideoMetrics;
use serde::Serialize;
use tracing::{error, info};

use crate::library::{MediaLibrary, variant_id};
use crate::server::AppState;

/// Small image the download probe times. Kept under a kilobyte so the
/// measurement reflects latency more than throughput.
pub const PROBE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64"><rect width="64" height="64" rx="8" fill="#111827"/><path d="M24 18v28l22-14z" fill="#f9fafb"/></svg>"##;

/// Response of the qualities endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitiesResponse {
    /// Video the catalog belongs to
    pub video_id: String,
    /// Catalog entries, "Auto" first
    pub qualities: QualityCatalog,
    /// First real quality, or "Auto"
    pub default_quality: String,
}

/// Stream URL for a video id.
pub fn stream_url(id: &str) -> String {
    format!("/api/videos/{id}/stream")
}

/// Builds the catalog offered for `id`.
///
/// Transcoded variants on disk are addressed individually. Without any,
/// every configured level points at the single upload.
pub async fn build_catalog(library: &MediaLibrary, id: &str, levels: &[String]) -> QualityCatalog {
    let base = stream_url(id);
    let variants: Vec<_> = library
        .variants(id)
        .await
        .into_iter()
        .filter(|target| levels.iter().any(|l| l.eq_ignore_ascii_case(target.label)))
        .collect();

    if variants.is_empty() {
        return QualityCatalog::for_stream_with_levels(&base, levels);
    }

    let mut entries = vec![
        QualityDescriptor::new(AUTO_LABEL, 0, base.clone())
            .with_bitrate(Bitrate::Tag("adaptive".to_string())),
    ];
    entries.extend(variants.into_iter().map(|target| {
        QualityDescriptor::new(target.label, target.height, stream_url(&variant_id(id, target)))
            .with_bitrate(Bitrate::Kbps(target.bitrate_kbps))
    }));

    // Labels come from distinct target resolutions, so this cannot collide.
    QualityCatalog::new(entries).unwrap_or_else(|_| QualityCatalog::for_stream(&base))
}

/// `GET /api/videos/{id}/qualities`
///
/// # Errors
///
/// - `StatusCode::NOT_FOUND` - Unknown video id
pub async fn api_qualities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QualitiesResponse>, StatusCode> {
    if state.library.resolve(&id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let catalog = build_catalog(&state.library, &id, &state.config.streaming.quality_levels).await;
    let default_quality = catalog.default_label().to_string();
    info!(
        "Serving {} qualities for {}, default {}",
        catalog.len(),
        id,
        default_quality
    );

    Ok(Json(QualitiesResponse {
        video_id: id,
        qualities: catalog,
        default_quality,
    }))
}

/// `GET /probe.svg`
pub async fn probe_asset() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        PROBE_SVG,
    )
}

/// `POST /api/videos/{id}/telemetry`
///
/// # Errors
///
/// - `StatusCode::INTERNAL_SERVER_ERROR` - The sink rejected the batch
pub async fn api_telemetry(
    Path(id): Path<String>,
    Json(metrics): Json<VideoMetrics>,
) -> Result<StatusCode, StatusCode> {
    TracingTelemetrySink
        .send(&id, &metrics)
        .await
        .map_err(|e| {
            error!("Failed to record telemetry for {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn levels() -> Vec<String> {
        ["360p", "480p", "720p", "1080p"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_catalog_without_variants_points_at_upload() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("talk.mp4"), b"x").unwrap();
        let library = MediaLibrary::new(dir.path());

        let catalog = build_catalog(&library, "talk", &levels()).await;

        assert_eq!(catalog.len(), 5);
        assert!(catalog.iter().all(|q| q.url == "/api/videos/talk/stream"));
    }

    #[tokio::test]
    async fn test_catalog_addresses_variants() {
        let dir = TempDir::new().unwrap();
        for name in ["talk.mp4", "talk_480p.mp4", "talk_1080p.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let library = MediaLibrary::new(dir.path());

        let catalog = build_catalog(&library, "talk", &levels()).await;

        let labels: Vec<&str> = catalog.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["Auto", "1080p", "480p"]);
        assert_eq!(
            catalog.find("480p").unwrap().url,
            "/api/videos/talk_480p/stream"
        );
    }

    #[tokio::test]
    async fn test_catalog_ignores_unconfigured_variants() {
        let dir = TempDir::new().unwrap();
        for name in ["talk.mp4", "talk_1080p.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let library = MediaLibrary::new(dir.path());
        let levels = vec!["360p".to_string(), "720p".to_string()];

        let catalog = build_catalog(&library, "talk", &levels).await;

        let labels: Vec<&str> = catalog.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["Auto", "720p", "360p"]);
    }

    #[test]
    fn test_probe_asset_is_small() {
        assert!(PROBE_SVG.len() < 1024);
        assert!(PROBE_SVG.starts_with("<svg"));
    }
}
