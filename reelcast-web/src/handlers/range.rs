//! HTTP Range request handling for video streaming
//!
//! Implements single-range RFC 7233 requests: `bytes=start-end`,
//! `bytes=start-` and suffix ranges `bytes=-len`.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte served
    pub start: u64,
    /// Last byte served
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Parse an HTTP Range header into a raw `(start, end)` request.
///
/// An open end resolves to the last byte of `total_size`. Returns `None`
/// when the header is not a single byte range this server understands, in
/// which case the full body is served.
///
/// # Examples
/// ```
/// use reelcast_web::handlers::range::parse_range_header;
/// assert_eq!(parse_range_header("bytes=100-199", 1000), Some((100, 199)));
/// assert_eq!(parse_range_header("bytes=-100", 1000), Some((900, 999)));
/// ```
pub fn parse_range_header(range: &str, total_size: u64) -> Option<(u64, u64)> {
    let spec = range.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let last = total_size.saturating_sub(1);

    if start.is_empty() {
        let suffix = end.parse::<u64>().ok().filter(|len| *len > 0)?;
        return Some((total_size.saturating_sub(suffix), last));
    }

    let start = start.parse::<u64>().ok()?;
    let end = if end.is_empty() {
        last
    } else {
        end.parse::<u64>().ok()?
    };
    if end < start {
        return None;
    }
    Some((start, end))
}

/// Validate a requested range against the file size.
///
/// The end is clamped to the last byte.
///
/// # Errors
/// Returns RANGE_NOT_SATISFIABLE if start lies at or beyond the end of the file
pub fn validate_range_bounds(
    start: u64,
    end: u64,
    total_size: u64,
) -> Result<ByteRange, StatusCode> {
    if start >= total_size {
        return Err(StatusCode::RANGE_NOT_SATISFIABLE);
    }

    Ok(ByteRange {
        start,
        end: end.min(total_size - 1),
    })
}

/// Extract the Range header value, if present and valid UTF-8.
pub fn extract_range_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::RANGE)
        .and_then(|range| range.to_str().ok())
}

/// Build a video response: `206` with Content-Range for a range request,
/// `200` for the full body. `content_length` must match what `body` yields.
///
/// # Errors
/// Returns StatusCode error if response building fails
pub fn build_range_response(
    body: Body,
    content_length: u64,
    content_type: &str,
    range: Option<ByteRange>,
    total_size: u64,
) -> Result<Response<Body>, StatusCode> {
    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length.to_string());

    response = match range {
        Some(range) => response.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, total_size),
        ),
        None => response.status(StatusCode::OK),
    };

    response
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build the `416` response advertising the actual size.
///
/// # Errors
/// Returns StatusCode error if response building fails
pub fn build_unsatisfiable_response(total_size: u64) -> Result<Response<Body>, StatusCode> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, format!("bytes */{total_size}"))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::empty())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header_valid() {
        assert_eq!(parse_range_header("bytes=100-199", 1000), Some((100, 199)));
    }

    #[test]
    fn test_parse_range_header_open_end() {
        assert_eq!(parse_range_header("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn test_parse_range_header_suffix() {
        assert_eq!(parse_range_header("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_range_header("bytes=-5000", 1000), Some((0, 999)));
        assert_eq!(parse_range_header("bytes=-0", 1000), None);
    }

    #[test]
    fn test_parse_range_header_invalid() {
        assert_eq!(parse_range_header("invalid", 1000), None);
        assert_eq!(parse_range_header("bytes=abc-", 1000), None);
        assert_eq!(parse_range_header("bytes=300-200", 1000), None);
        assert_eq!(parse_range_header("bytes=0-1,5-6", 1000), None);
    }

    #[test]
    fn test_validate_range_bounds_valid() {
        let range = validate_range_bounds(100, 199, 1000).unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 199 });
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn test_validate_range_bounds_beyond_size() {
        assert_eq!(
            validate_range_bounds(500, 599, 400),
            Err(StatusCode::RANGE_NOT_SATISFIABLE)
        );
        assert_eq!(
            validate_range_bounds(400, 410, 400),
            Err(StatusCode::RANGE_NOT_SATISFIABLE)
        );
    }

    #[test]
    fn test_validate_range_bounds_clamps_end() {
        let range = validate_range_bounds(100, 999, 500).unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 499 });
        assert_eq!(range.len(), 400);
    }

    #[test]
    fn test_partial_response_headers() {
        let range = ByteRange { start: 0, end: 3 };
        let response = build_range_response(Body::from(vec![1, 2, 3, 4]), 4, "video/mp4", Some(range), 10)
                .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-3/10");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    }

    #[test]
    fn test_full_response_has_no_content_range() {
        let response = build_range_response(Body::from(vec![0; 10]), 10, "video/webm", None, 10).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    }
}
