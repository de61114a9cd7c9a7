//! Reelcast Web - Video delivery and playback API server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Serves uploaded videos with HTTP Range support, per-video quality
//! catalogs, the asset timed by the client's download probe, and an
//! endpoint accepting flushed playback telemetry.

pub mod handlers;
pub mod library;
pub mod server;

// Re-export main types
pub use library::MediaLibrary;
pub use server::{AppState, router, run_server};
