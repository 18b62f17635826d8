//! Playback phases and their timing. Time is always passed in by the caller.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::DurationConfig;
use crate::motion::clamp01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    IntroKaleidoscope,
    MindMovie,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::IntroKaleidoscope => "intro-kaleidoscope",
            Phase::MindMovie => "mind-movie",
            Phase::Ended => "ended",
        }
    }

    /// Phases that change on every frame.
    pub fn is_animating(&self) -> bool {
        matches!(self, Phase::IntroKaleidoscope | Phase::MindMovie)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: Phase,
    pub phase_started_at: Option<Instant>,
    pub playback_started_at: Option<Instant>,
}

/// One-shot timer handed to the driver on `play`. It only has an effect if
/// delivered back before the session is stopped or restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntroTimer {
    pub epoch: u64,
    pub fire_at: Instant,
}

pub struct PhaseController {
    state: PhaseState,
    durations: DurationConfig,
    epoch: u64,
}

impl PhaseController {
    pub fn new(durations: DurationConfig) -> Self {
        Self {
            state: PhaseState {
                phase: Phase::Idle,
                phase_started_at: None,
                playback_started_at: None,
            },
            durations,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn durations(&self) -> DurationConfig {
        self.durations
    }

    /// Durations can only change between sessions. Returns whether the new
    /// values were accepted.
    pub fn set_durations(&mut self, durations: DurationConfig) -> bool {
        if self.state.phase.is_animating() {
            return false;
        }
        self.durations = durations;
        true
    }

    pub fn mind_movie_duration(&self) -> Duration {
        self.durations.mind_movie_duration()
    }

    /// Starts the intro from Idle or Ended. Without resolved images this is
    /// a silent no-op, as is calling it while already playing.
    pub fn play(&mut self, now: Instant, resolved_images: usize) -> Option<(PhaseChange, IntroTimer)> {
        if resolved_images == 0 || self.state.phase.is_animating() {
            return None;
        }
        self.epoch += 1;
        let change = self.goto(Phase::IntroKaleidoscope, now)?;
        self.state.playback_started_at = None;
        let timer = IntroTimer {
            epoch: self.epoch,
            fire_at: now + self.durations.intro_duration(),
        };
        Some((change, timer))
    }

    pub fn on_intro_timer(&mut self, timer: IntroTimer, now: Instant) -> Option<PhaseChange> {
        if timer.epoch != self.epoch || self.state.phase != Phase::IntroKaleidoscope {
            return None;
        }
        let change = self.goto(Phase::MindMovie, now)?;
        self.state.playback_started_at = Some(now);
        Some(change)
    }

    /// Per-frame check that ends the movie once its time is up or the image
    /// list has emptied.
    pub fn tick(&mut self, now: Instant, image_count: usize) -> Option<PhaseChange> {
        if self.state.phase != Phase::MindMovie {
            return None;
        }
        if image_count == 0 || self.elapsed(now) >= self.mind_movie_duration() {
            return self.goto(Phase::Ended, now);
        }
        None
    }

    /// Forces Idle from any phase, cancelling a pending intro timer.
    pub fn stop(&mut self, now: Instant) -> Option<PhaseChange> {
        self.epoch += 1;
        let change = self.goto(Phase::Idle, now)?;
        self.state.playback_started_at = None;
        Some(change)
    }

    /// Time since the movie started; zero outside MindMovie/Ended.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.state.playback_started_at {
            Some(start) => now.saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// Intro countdown in `[0, 1]`; zero outside the intro.
    pub fn intro_progress(&self, now: Instant) -> f32 {
        if self.state.phase != Phase::IntroKaleidoscope {
            return 0.0;
        }
        let Some(start) = self.state.phase_started_at else {
            return 0.0;
        };
        let total = self.durations.intro_duration().as_secs_f32();
        if total <= 0.0 {
            return 1.0;
        }
        clamp01(now.saturating_duration_since(start).as_secs_f32() / total)
    }

    fn goto(&mut self, to: Phase, now: Instant) -> Option<PhaseChange> {
        if self.state.phase == to {
            return None;
        }
        let ch = PhaseChange {
            from: self.state.phase,
            to,
        };
        self.state.phase = to;
        self.state.phase_started_at = Some(now);
        Some(ch)
    }
}
