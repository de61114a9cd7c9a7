//! HTTP request handlers organized by functionality

pub mod api;
pub mod range;
pub mod streaming;

// Re-export handler functions
pub use api::{QualitiesResponse, api_qualities, api_telemetry, build_catalog, probe_asset};
pub use range::{ByteRange, parse_range_header};
pub use streaming::{StreamError, stream_video};
