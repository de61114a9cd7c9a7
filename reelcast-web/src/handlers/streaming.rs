//! Video byte delivery with Range support

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use super::range::{
    ByteRange, build_range_response, build_unsatisfiable_response, extract_range_header,
    parse_range_header, validate_range_bounds,
};
use crate::server::AppState;

/// Failures serving a video.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No file for this id.
    #[error("video {id} not found")]
    NotFound {
        /// Requested id
        id: String,
    },

    /// The requested range starts past the end of the file.
    #[error("range not satisfiable for {total_size} byte file")]
    RangeNotSatisfiable {
        /// Actual file size
        total_size: u64,
    },

    /// The file could not be read.
    #[error("failed to read video: {0}")]
    Io(#[from] std::io::Error),

    /// The response could not be assembled.
    #[error("failed to build response")]
    Response,
}

impl IntoResponse for StreamError {
    fn into_response(self) -> axum::response::Response {
        match self {
            StreamError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "Video not found").into_response()
            }
            StreamError::RangeNotSatisfiable { total_size } => {
                build_unsatisfiable_response(total_size).into_response()
            }
            StreamError::Io(ref e) => {
                error!("Video read failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            StreamError::Response => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// `GET /api/videos/{id}/stream`
///
/// Serves the requested byte range with `206`, or the whole file with `200`
/// when no usable Range header is sent.
///
/// # Errors
///
/// - `StreamError::NotFound` - Unknown id (404)
/// - `StreamError::RangeNotSatisfiable` - Range starts past the end (416)
/// - `StreamError::Io` - The file could not be read (500)
pub async fn stream_video(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response<Body>, StreamError> {
    let path = state
        .library
        .resolve(&id)
        .await
        .ok_or_else(|| StreamError::NotFound { id: id.clone() })?;
    let total_size = tokio::fs::metadata(&path).await?.len();
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let requested = extract_range_header(&headers).and_then(|r| parse_range_header(r, total_size));
    let range = match requested {
        Some((start, end)) => Some(
            validate_range_bounds(start, end, total_size)
                .map_err(|_| StreamError::RangeNotSatisfiable { total_size })?,
        ),
        None => None,
    };

    match range {
        Some(range) => debug!(
            "Streaming {} bytes {}-{}/{}",
            id, range.start, range.end, total_size
        ),
        None => info!("Streaming {} in full ({} bytes)", id, total_size),
    }

    let (body, len) = open_body(&path, range, total_size).await?;
    build_range_response(body, len, &content_type, range, total_size)
        .map_err(|_| StreamError::Response)
}

/// Streams `len` bytes of the file from the range start without buffering.
async fn open_body(
    path: &Path,
    range: Option<ByteRange>,
    total_size: u64,
) -> Result<(Body, u64), StreamError> {
    let mut file = tokio::fs::File::open(path).await?;
    let (start, len) = match range {
        Some(range) => (range.start, range.len()),
        None => (0, total_size),
    };

    file.seek(SeekFrom::Start(start)).await?;
    let stream = ReaderStream::new(file.take(len));
    Ok((Body::from_stream(stream), len))
}
