//! End-to-end tests for Reelcast
//!
//! These tests run the HTTP server on a loopback port and drive it with the
//! production HTTP clients, covering probe timing, variant discovery and
//! telemetry delivery over a real socket.

mod live_server;
