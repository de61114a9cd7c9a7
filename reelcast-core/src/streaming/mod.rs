//! Session-scoped adaptive streaming coordination.
//!
//! The manager wraps a speed detector and the quality selector, and decides
//! when observed bandwidth and buffer health warrant a mid-playback switch.

pub mod manager;

pub use manager::{AdaptiveStreamingManager, SwitchDecision};
