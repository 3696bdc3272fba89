//! Frame-pacing scheduler. The caller supplies the current instant on every
//! tick, which keeps pacing deterministic under test; the scheduler never
//! sleeps itself, it reports how long the loop may idle when ahead of the
//! source cadence.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::source::{Frame, FrameSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    /// Terminal: the source yielded its last frame. Rendering continues
    /// with the final frame, but no further advances occur.
    Exhausted,
}

/// Outcome of one scheduler tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// One frame became due and was pulled from the source.
    Advanced(Frame),
    /// Ahead of cadence; the loop may idle for the returned remainder.
    Idle(Duration),
    Paused,
    Exhausted,
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    state: PlaybackState,
    frame_interval: Duration,
    last_tick: Instant,
}

impl PlaybackScheduler {
    /// `start` stands in for the session's opening wall-clock instant; the
    /// first frame becomes due one interval after it.
    pub fn new(frame_rate: f32, start: Instant) -> Self {
        Self {
            state: PlaybackState::Playing,
            frame_interval: Duration::from_secs_f64(1.0 / frame_rate as f64),
            last_tick: start,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Flip Playing ⇄ Paused. Exhaustion is terminal and ignores the toggle.
    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
            PlaybackState::Exhausted => PlaybackState::Exhausted,
        };
    }

    /// Advance at most one frame if the interval has elapsed since the last
    /// accepted advance. Pulling no frame from the source transitions to
    /// `Exhausted`.
    pub fn tick(&mut self, now: Instant, source: &mut dyn FrameSource) -> Result<TickOutcome> {
        match self.state {
            PlaybackState::Paused => return Ok(TickOutcome::Paused),
            PlaybackState::Exhausted => return Ok(TickOutcome::Exhausted),
            PlaybackState::Playing => {}
        }

        let elapsed = now.saturating_duration_since(self.last_tick);
        if elapsed < self.frame_interval {
            return Ok(TickOutcome::Idle(self.frame_interval - elapsed));
        }

        match source.next_frame()? {
            Some(frame) => {
                self.last_tick = now;
                Ok(TickOutcome::Advanced(frame))
            }
            None => {
                self.state = PlaybackState::Exhausted;
                Ok(TickOutcome::Exhausted)
            }
        }
    }
}
