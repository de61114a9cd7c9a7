//! Player control surface
//!
//! The UI reports media element events to a [`PlayerSession`] and executes
//! the [`PlayerCommand`]s it returns. The session owns the runtime state,
//! drives error recovery, and records switches and stalls to analytics.

pub mod session;

use std::fmt;

pub use session::PlayerSession;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Media element error classes, from the element's numeric error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    /// Fetching was aborted by the user agent (code 1)
    Aborted,
    /// A network error interrupted the download (code 2)
    Network,
    /// The media could not be decoded (code 3)
    Decode,
    /// The source format or URL is not supported (code 4)
    SourceNotSupported,
}

impl MediaErrorKind {
    /// Maps a media element error code; unknown codes are treated as decode
    /// failures.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MediaErrorKind::Aborted,
            2 => MediaErrorKind::Network,
            4 => MediaErrorKind::SourceNotSupported,
            _ => MediaErrorKind::Decode,
        }
    }

    /// Whether reloading the same source is worth one attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaErrorKind::Network | MediaErrorKind::SourceNotSupported
        )
    }

    fn describe(&self) -> &'static str {
        match self {
            MediaErrorKind::Aborted => "playback was aborted",
            MediaErrorKind::Network => "a network error interrupted the download",
            MediaErrorKind::Decode => "the video could not be decoded",
            MediaErrorKind::SourceNotSupported => "the video format is not supported",
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Events reported by the media element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata {
        duration: f64,
        video_width: u32,
        video_height: u32,
    },
    CanPlay,
    CanPlayThrough,
    /// Playback stalled waiting for data
    Waiting,
    /// Playback resumed after starting or stalling
    Playing,
    Error {
        kind: MediaErrorKind,
    },
    Play,
    Pause,
    TimeUpdate {
        current_time: f64,
    },
    VolumeChange {
        volume: f64,
        muted: bool,
    },
    FullscreenChange {
        fullscreen: bool,
    },
}

/// Instructions for the UI to apply to the media element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Replace the source and load it
    Load { url: String },
    /// Reload the current source
    Reload { url: String },
    Seek { time: f64 },
    Play,
    Pause,
    SetVolume { volume: f64 },
    SetMuted { muted: bool },
    EnterFullscreen,
    ExitFullscreen,
    /// Show the terminal error overlay with a retry control
    ShowError {
        message: String,
        poster: Option<String>,
    },
}

/// Why the active quality changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    Initial,
    UserSelection,
    BandwidthDowngrade,
    BandwidthUpgrade,
}

impl SwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchReason::Initial => "initial",
            SwitchReason::UserSelection => "user-selection",
            SwitchReason::BandwidthDowngrade => "bandwidth-downgrade",
            SwitchReason::BandwidthUpgrade => "bandwidth-upgrade",
        }
    }
}

/// Browser family, for recovery quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Safari,
    Edge,
    #[default]
    Unknown,
}

impl BrowserKind {
    /// Detects the browser family from a User-Agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let user_agent = user_agent.to_lowercase();
        if user_agent.contains("edg") {
            BrowserKind::Edge
        } else if user_agent.contains("chrome") || user_agent.contains("crios") {
            BrowserKind::Chrome
        } else if user_agent.contains("firefox") || user_agent.contains("fxios") {
            BrowserKind::Firefox
        } else if user_agent.contains("safari") {
            BrowserKind::Safari
        } else {
            BrowserKind::Unknown
        }
    }
}

/// Player state owned by one session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRuntimeState {
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub is_muted: bool,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub is_fullscreen: bool,
    pub has_video_track: bool,
    pub current_quality: String,
}

impl Default for PlayerRuntimeState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_muted: false,
            is_playing: false,
            is_buffering: false,
            is_fullscreen: false,
            has_video_track: true,
            current_quality: crate::quality::AUTO_LABEL.to_string(),
        }
    }
}

/// Errors from player control actions.
#[derive(Debug, Error, PartialEq)]
pub enum PlayerError {
    /// The requested quality is not in this video's catalog.
    #[error("quality {label} is not in the catalog")]
    UnknownQuality { label: String },

    /// The session is showing a terminal error; call `retry` first.
    #[error("player is in a failed state: {message}")]
    Failed { message: String },
}
