//! Integration tests for Reelcast
//!
//! These tests drive several crates together: simulated networks feed the
//! detector, the detector feeds selection, sessions record into analytics,
//! and the web router serves what the catalog points at.

#[path = "integration/selection_scenarios.rs"]
mod selection_scenarios;

#[path = "integration/network_detection.rs"]
mod network_detection;

#[path = "integration/player_playback.rs"]
mod player_playback;

#[path = "integration/analytics_concurrency.rs"]
mod analytics_concurrency;

#[path = "integration/http_api.rs"]
mod http_api;
