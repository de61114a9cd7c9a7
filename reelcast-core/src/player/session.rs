//! Playback session state machine

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{
    BrowserKind, MediaErrorKind, MediaEvent, PlayerCommand, PlayerError, PlayerRuntimeState,
    SwitchReason,
};
use crate::analytics::VideoAnalytics;
use crate::config::PlayerConfig;
use crate::quality::{QualityCatalog, QualityDescriptor, select_optimal_quality};
use crate::streaming::{AdaptiveStreamingManager, SwitchDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveSource {
    Primary,
    Fallback,
}

/// Position to restore once a swapped source has loaded its metadata.
#[derive(Debug, Clone, Copy)]
struct Resume {
    time: f64,
    play: bool,
}

/// One video being played.
///
/// Consumes [`MediaEvent`]s and control actions, and answers with the
/// [`PlayerCommand`]s the UI must apply. Error recovery escalates from one
/// reload of the current source, to a single swap to the fallback source,
/// to a terminal error that only [`PlayerSession::retry`] clears.
pub struct PlayerSession {
    video_id: String,
    catalog: QualityCatalog,
    fallback_url: Option<String>,
    poster: Option<String>,
    browser: BrowserKind,
    analytics: Arc<VideoAnalytics>,
    config: PlayerConfig,
    state: PlayerRuntimeState,
    source: ActiveSource,
    current_url: String,
    reload_attempted: bool,
    loading: bool,
    error: Option<String>,
    buffering_since: Option<Instant>,
    resume: Option<Resume>,
}

impl PlayerSession {
    pub fn new(
        video_id: impl Into<String>,
        catalog: QualityCatalog,
        analytics: Arc<VideoAnalytics>,
        config: PlayerConfig,
    ) -> Self {
        let current_url = catalog
            .first()
            .map(|q| q.url.clone())
            .unwrap_or_default();

        Self {
            video_id: video_id.into(),
            catalog,
            fallback_url: None,
            poster: None,
            browser: BrowserKind::Unknown,
            analytics,
            config,
            state: PlayerRuntimeState::default(),
            source: ActiveSource::Primary,
            current_url,
            reload_attempted: false,
            loading: false,
            error: None,
            buffering_since: None,
            resume: None,
        }
    }

    /// Source to swap to once when the primary cannot be played.
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_poster(mut self, url: impl Into<String>) -> Self {
        self.poster = Some(url.into());
        self
    }

    pub fn with_browser(mut self, browser: BrowserKind) -> Self {
        self.browser = browser;
        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn state(&self) -> &PlayerRuntimeState {
        &self.state
    }

    pub fn catalog(&self) -> &QualityCatalog {
        &self.catalog
    }

    /// URL the media element should currently be playing.
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_using_fallback(&self) -> bool {
        self.source == ActiveSource::Fallback
    }

    /// Message of the terminal error, if the session is in one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The media loaded metadata but has no picture.
    pub fn is_audio_only(&self) -> bool {
        !self.state.has_video_track && self.state.duration > 0.0
    }

    /// Runs network detection through `manager` and loads the quality the
    /// selector picks for the result.
    ///
    /// A preference naming a catalog label wins over the network class.
    pub async fn start(
        &mut self,
        manager: &AdaptiveStreamingManager,
        preference: Option<&str>,
    ) -> Vec<PlayerCommand> {
        manager.initialize().await;

        let network = manager.network_class();
        let selected = select_optimal_quality(self.catalog.as_slice(), network, preference)
            .cloned();

        let Some(selected) = selected else {
            return Vec::new();
        };

        info!(
            "Starting {} at {} on {} network",
            self.video_id, selected.label, network
        );
        self.activate(&selected, SwitchReason::Initial);
        self.loading = true;
        vec![PlayerCommand::Load {
            url: self.current_url.clone(),
        }]
    }

    /// Applies a media element event observed now.
    pub fn handle_event(&mut self, event: MediaEvent) -> Vec<PlayerCommand> {
        self.handle_event_at(event, Instant::now())
    }

    /// Applies a media element event observed at `now`.
    pub fn handle_event_at(&mut self, event: MediaEvent, now: Instant) -> Vec<PlayerCommand> {
        match event {
            MediaEvent::LoadStart => {
                self.loading = true;
                Vec::new()
            }
            MediaEvent::LoadedMetadata {
                duration,
                video_width,
                video_height,
            } => self.on_metadata(duration, video_width, video_height),
            MediaEvent::CanPlay | MediaEvent::CanPlayThrough => {
                self.loading = false;
                Vec::new()
            }
            MediaEvent::Waiting => {
                self.state.is_buffering = true;
                self.buffering_since.get_or_insert(now);
                Vec::new()
            }
            MediaEvent::Playing => {
                self.state.is_playing = true;
                self.state.is_buffering = false;
                self.loading = false;
                if let Some(started) = self.buffering_since.take() {
                    let stalled = now.saturating_duration_since(started);
                    self.analytics.track_buffering(
                        &self.video_id,
                        u64::try_from(stalled.as_millis()).unwrap_or(u64::MAX),
                        &self.state.current_quality,
                    );
                }
                Vec::new()
            }
            MediaEvent::Error { kind } => self.on_error(kind),
            MediaEvent::Play => {
                self.state.is_playing = true;
                Vec::new()
            }
            MediaEvent::Pause => {
                self.state.is_playing = false;
                Vec::new()
            }
            MediaEvent::TimeUpdate { current_time } => {
                self.state.current_time = current_time;
                Vec::new()
            }
            MediaEvent::VolumeChange { volume, muted } => {
                self.state.volume = volume.clamp(0.0, 1.0);
                self.state.is_muted = muted;
                Vec::new()
            }
            MediaEvent::FullscreenChange { fullscreen } => {
                self.state.is_fullscreen = fullscreen;
                Vec::new()
            }
        }
    }

    fn on_metadata(&mut self, duration: f64, width: u32, height: u32) -> Vec<PlayerCommand> {
        self.state.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.state.has_video_track = !(width == 0 || height == 0) || self.state.duration == 0.0;
        if !self.state.has_video_track {
            debug!("{} has no video track, presenting audio only", self.video_id);
        }

        let Some(resume) = self.resume.take() else {
            return Vec::new();
        };

        let time = self.clamp_time(resume.time);
        self.state.current_time = time;
        let mut commands = vec![PlayerCommand::Seek { time }];
        if resume.play {
            commands.push(PlayerCommand::Play);
        }
        commands
    }

    fn on_error(&mut self, kind: MediaErrorKind) -> Vec<PlayerCommand> {
        self.loading = false;
        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.buffering_since = None;

        if kind.is_retryable() && !self.reload_attempted {
            self.reload_attempted = true;
            warn!("{} failed ({}), reloading once", self.video_id, kind);
            return vec![PlayerCommand::Reload {
                url: self.reload_url(),
            }];
        }

        if self.source == ActiveSource::Primary {
            if let Some(fallback) = self.fallback_url.clone() {
                warn!("{} failed ({}), switching to fallback source", self.video_id, kind);
                self.source = ActiveSource::Fallback;
                self.reload_attempted = false;
                self.resume = Some(Resume {
                    time: self.state.current_time,
                    play: true,
                });
                self.current_url = fallback;
                self.loading = true;
                return vec![PlayerCommand::Load {
                    url: self.current_url.clone(),
                }];
            }
        }

        let message = format!("Video playback failed: {kind}");
        warn!("{}: {}", self.video_id, message);
        self.error = Some(message.clone());
        vec![PlayerCommand::ShowError {
            message,
            poster: self.poster.clone(),
        }]
    }

    fn reload_url(&self) -> String {
        if self.browser != BrowserKind::Safari {
            return self.current_url.clone();
        }
        // Safari serves a stale failed response for the same URL.
        let separator = if self.current_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}t={}",
            self.current_url,
            separator,
            Utc::now().timestamp_millis()
        )
    }

    /// Clears a terminal error and loads the selected quality from scratch.
    pub fn retry(&mut self) -> Vec<PlayerCommand> {
        info!("Retrying playback of {}", self.video_id);
        self.error = None;
        self.source = ActiveSource::Primary;
        self.reload_attempted = false;
        self.resume = None;
        self.current_url = self
            .catalog
            .find(&self.state.current_quality)
            .or_else(|| self.catalog.first())
            .map(|q| q.url.clone())
            .unwrap_or_default();
        self.loading = true;
        vec![PlayerCommand::Load {
            url: self.current_url.clone(),
        }]
    }

    /// Swaps to the quality labelled `label`, keeping position and
    /// play/pause state. Selecting the active quality does nothing.
    ///
    /// # Errors
    ///
    /// - `PlayerError::UnknownQuality` - `label` is not in the catalog
    /// - `PlayerError::Failed` - The session is showing a terminal error
    pub fn switch_quality(
        &mut self,
        label: &str,
        reason: SwitchReason,
    ) -> Result<Vec<PlayerCommand>, PlayerError> {
        if let Some(message) = &self.error {
            return Err(PlayerError::Failed {
                message: message.clone(),
            });
        }

        let target = self
            .catalog
            .find(label)
            .cloned()
            .ok_or_else(|| PlayerError::UnknownQuality {
                label: label.to_string(),
            })?;

        if target.matches_label(&self.state.current_quality) {
            return Ok(Vec::new());
        }

        self.resume = Some(Resume {
            time: self.state.current_time,
            play: self.state.is_playing,
        });
        self.activate(&target, reason);
        self.source = ActiveSource::Primary;
        self.reload_attempted = false;
        self.loading = true;

        Ok(vec![PlayerCommand::Load {
            url: self.current_url.clone(),
        }])
    }

    /// Steps one rung down or up the ladder when `manager` judges the
    /// observed bandwidth (kbps) and buffer health (seconds) call for it.
    ///
    /// # Errors
    ///
    /// - `PlayerError::Failed` - The session is showing a terminal error
    pub fn adapt(
        &mut self,
        manager: &AdaptiveStreamingManager,
        bandwidth_kbps: f64,
        buffer_health_secs: f64,
    ) -> Result<Vec<PlayerCommand>, PlayerError> {
        let decision = manager.switch_decision(bandwidth_kbps, buffer_health_secs);
        let reason = match decision {
            SwitchDecision::Hold => return Ok(Vec::new()),
            SwitchDecision::Downgrade => SwitchReason::BandwidthDowngrade,
            SwitchDecision::Upgrade => SwitchReason::BandwidthUpgrade,
        };

        let target = manager
            .switch_target(
                self.catalog.as_slice(),
                &self.state.current_quality,
                decision,
            )
            .map(|q| q.label.clone());

        match target {
            Some(label) => self.switch_quality(&label, reason),
            None => Ok(Vec::new()),
        }
    }

    fn activate(&mut self, target: &QualityDescriptor, reason: SwitchReason) {
        self.analytics.track_quality_switch(
            &self.video_id,
            &self.state.current_quality,
            &target.label,
            reason.as_str(),
        );
        self.state.current_quality = target.label.clone();
        self.current_url = target.url.clone();
    }

    pub fn toggle_play(&mut self) -> Vec<PlayerCommand> {
        if self.state.is_playing {
            self.state.is_playing = false;
            vec![PlayerCommand::Pause]
        } else {
            self.state.is_playing = true;
            vec![PlayerCommand::Play]
        }
    }

    /// Seeks to `time` seconds, clamped to the media duration.
    pub fn seek(&mut self, time: f64) -> Vec<PlayerCommand> {
        let time = self.clamp_time(time);
        self.state.current_time = time;
        vec![PlayerCommand::Seek { time }]
    }

    pub fn skip_forward(&mut self) -> Vec<PlayerCommand> {
        self.seek(self.state.current_time + self.config.skip_seconds)
    }

    pub fn skip_backward(&mut self) -> Vec<PlayerCommand> {
        self.seek(self.state.current_time - self.config.skip_seconds)
    }

    /// Sets the volume in `[0, 1]`; any audible volume also unmutes.
    pub fn set_volume(&mut self, volume: f64) -> Vec<PlayerCommand> {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.state.volume = volume;

        let mut commands = vec![PlayerCommand::SetVolume { volume }];
        if volume > 0.0 && self.state.is_muted {
            self.state.is_muted = false;
            commands.push(PlayerCommand::SetMuted { muted: false });
        }
        commands
    }

    pub fn toggle_mute(&mut self) -> Vec<PlayerCommand> {
        self.state.is_muted = !self.state.is_muted;
        vec![PlayerCommand::SetMuted {
            muted: self.state.is_muted,
        }]
    }

    pub fn toggle_fullscreen(&mut self) -> Vec<PlayerCommand> {
        self.state.is_fullscreen = !self.state.is_fullscreen;
        if self.state.is_fullscreen {
            vec![PlayerCommand::EnterFullscreen]
        } else {
            vec![PlayerCommand::ExitFullscreen]
        }
    }

    fn clamp_time(&self, time: f64) -> f64 {
        let time = if time.is_nan() { 0.0 } else { time.max(0.0) };
        if self.state.duration > 0.0 {
            time.min(self.state.duration)
        } else {
            time
        }
    }
}
