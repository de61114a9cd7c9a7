//! Scripted media element timelines
//!
//! A [`PlaybackScript`] is the sequence of events a media element would
//! report, interleaved with pauses in simulated time. Replaying it through a
//! [`PlayerSession`] on a [`DeterministicClock`] yields exact stall
//! durations in analytics.

use std::time::Duration;

use reelcast_core::PlayerSession;
use reelcast_core::player::{MediaEvent, PlayerCommand};
use tracing::debug;

use crate::SimulationError;
use crate::deterministic::{DeterministicClock, DeterministicRng};

/// One step of a playback timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStep {
    /// Deliver an event at the current simulated time
    Event(MediaEvent),
    /// Let simulated time pass
    Advance(Duration),
}

/// An ordered playback timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackScript {
    steps: Vec<PlaybackStep>,
}

impl PlaybackScript {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn event(mut self, event: MediaEvent) -> Self {
        self.steps.push(PlaybackStep::Event(event));
        self
    }

    /// Appends a pause in simulated time.
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(PlaybackStep::Advance(duration));
        self
    }

    /// Appends the startup sequence of a video with the given shape.
    pub fn startup(self, duration: f64, width: u32, height: u32) -> Self {
        self.event(MediaEvent::LoadStart)
            .event(MediaEvent::LoadedMetadata {
                duration,
                video_width: width,
                video_height: height,
            })
            .event(MediaEvent::CanPlay)
            .event(MediaEvent::Playing)
    }

    /// Appends a stall of `duration` followed by resumed playback.
    pub fn stall(self, duration: Duration) -> Self {
        self.event(MediaEvent::Waiting)
            .advance(duration)
            .event(MediaEvent::Playing)
    }

    /// Steps in order.
    pub fn steps(&self) -> &[PlaybackStep] {
        &self.steps
    }

    /// Total time the script spends stalled, as analytics would record it.
    pub fn total_stall(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut waiting = false;
        for step in &self.steps {
            match step {
                PlaybackStep::Event(MediaEvent::Waiting) => waiting = true,
                PlaybackStep::Event(MediaEvent::Playing) => waiting = false,
                PlaybackStep::Advance(d) if waiting => total += *d,
                _ => {}
            }
        }
        total
    }

    /// Feeds every step into `session`, returning all emitted commands.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidTimeStep` - An advance exceeds the clock limit
    pub fn replay(
        &self,
        session: &mut PlayerSession,
        clock: &mut DeterministicClock,
    ) -> Result<Vec<PlayerCommand>, SimulationError> {
        let mut commands = Vec::new();
        for step in &self.steps {
            match step {
                PlaybackStep::Event(event) => {
                    commands.extend(session.handle_event_at(event.clone(), clock.now()));
                }
                PlaybackStep::Advance(duration) => clock.advance(*duration)?,
            }
        }
        debug!(
            "Replayed {} steps for {}, {} commands emitted",
            self.steps.len(),
            session.video_id(),
            commands.len()
        );
        Ok(commands)
    }
}

/// Generates a seeded viewing session: startup, then `segments` stretches
/// of playback, each followed by a stall with probability `stall_rate`.
///
/// Stalls last between 100 ms and 3 s; playback segments between 2 and 10 s.
pub fn random_viewing(
    rng: &mut DeterministicRng,
    duration: f64,
    segments: usize,
    stall_rate: f64,
) -> PlaybackScript {
    let mut script = PlaybackScript::new().startup(duration, 1280, 720);
    let mut position = 0.0;

    for _ in 0..segments {
        let played = Duration::from_millis(rng.random_range(2_000, 10_000));
        position = (position + played.as_secs_f64()).min(duration);
        script = script.advance(played).event(MediaEvent::TimeUpdate {
            current_time: position,
        });

        if rng.random_bool(stall_rate) {
            script = script.stall(Duration::from_millis(rng.random_range(100, 3_000)));
        }
    }
    script
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reelcast_core::config::PlayerConfig;
    use reelcast_core::{QualityCatalog, VideoAnalytics};

    use super::*;

    fn session(analytics: Arc<VideoAnalytics>) -> PlayerSession {
        PlayerSession::new(
            "sim",
            QualityCatalog::for_stream("/api/videos/sim/stream"),
            analytics,
            PlayerConfig::default(),
        )
    }

    #[test]
    fn test_stalls_recorded_exactly() {
        let analytics = Arc::new(VideoAnalytics::default());
        let mut session = session(analytics.clone());
        let mut clock = DeterministicClock::new();

        let script = PlaybackScript::new()
            .startup(60.0, 1920, 1080)
            .advance(Duration::from_secs(5))
            .stall(Duration::from_millis(1200))
            .advance(Duration::from_secs(5))
            .stall(Duration::from_millis(300));

        script.replay(&mut session, &mut clock).unwrap();

        let metrics = analytics.metrics("sim");
        assert_eq!(metrics.buffering_events.len(), 2);
        assert_eq!(metrics.total_buffering_ms(), 1500);
        assert_eq!(script.total_stall(), Duration::from_millis(1500));
        assert_eq!(clock.elapsed(), Duration::from_millis(11_500));
    }

    #[test]
    fn test_random_viewing_matches_recorded_stalls() {
        let mut rng = DeterministicRng::from_seed(2024);
        let script = random_viewing(&mut rng, 600.0, 40, 0.3);

        let analytics = Arc::new(VideoAnalytics::default());
        let mut session = session(analytics.clone());
        script
            .replay(&mut session, &mut DeterministicClock::new())
            .unwrap();

        let recorded = analytics.metrics("sim").total_buffering_ms();
        assert_eq!(
            u128::from(recorded),
            script.total_stall().as_millis()
        );
        assert!(session.state().current_time <= 600.0);
    }

    #[test]
    fn test_random_viewing_is_reproducible() {
        let a = random_viewing(&mut DeterministicRng::from_seed(5), 120.0, 10, 0.5);
        let b = random_viewing(&mut DeterministicRng::from_seed(5), 120.0, 10, 0.5);
        assert_eq!(a, b);
    }
}
