//! Tempo clock — conversion between musical ticks and elapsed seconds
//! under a variable speed multiplier.
//!
//! Ticks are the durable, tempo-independent coordinate shared by the
//! scheduler and the sync loop; seconds exist only at the edges (scrubber,
//! time display, skip buttons). Changing speed rescales the rate at which
//! the clock advances through ticks and never rewrites the ticks already
//! assigned to scheduled triggers.

use serde::Serialize;

use crate::model::Score;

/// Allowed speed multiplier bounds.
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Fixed offset applied by the skip-forward/back controls.
pub const SKIP_SECONDS: f64 = 5.0;

/// Transport state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// The single mutable transport object. Owned by the playback controller;
/// the sync loop and scheduler take snapshot reads at the top of a frame.
#[derive(Debug, Clone)]
pub struct TempoClock {
    state: PlayState,
    current_tick: f64,
    base_bpm: f64,
    speed: f64,
    ticks_per_quarter: u32,
    total_ticks: u64,
    duration_seconds: f64,
}

impl TempoClock {
    /// Clock positioned at tick 0 for a loaded score.
    pub fn new(score: &Score) -> Self {
        Self {
            state: PlayState::Stopped,
            current_tick: 0.0,
            base_bpm: score.bpm,
            speed: 1.0,
            ticks_per_quarter: score.ticks_per_quarter,
            total_ticks: score.total_ticks,
            duration_seconds: score.duration_seconds,
        }
    }

    /// Clock for a session with no score loaded yet.
    pub fn idle() -> Self {
        Self {
            state: PlayState::Stopped,
            current_tick: 0.0,
            base_bpm: crate::model::DEFAULT_BPM,
            speed: 1.0,
            ticks_per_quarter: crate::model::DEFAULT_TICKS_PER_QUARTER,
            total_ticks: 0,
            duration_seconds: 0.0,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn current_tick(&self) -> f64 {
        self.current_tick
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn base_bpm(&self) -> f64 {
        self.base_bpm
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Effective tick rate: `(baseBPM * speed) * PPQ / 60`.
    pub fn ticks_per_second(&self) -> f64 {
        self.base_bpm * self.speed * f64::from(self.ticks_per_quarter) / 60.0
    }

    /// Tick rate of the original (speed 1.0) timeline.
    fn base_ticks_per_second(&self) -> f64 {
        self.base_bpm * f64::from(self.ticks_per_quarter) / 60.0
    }

    // ─── State machine ───────────────────────────────────────────────

    /// Stopped/Paused → Playing.
    pub fn play(&mut self) {
        self.state = PlayState::Playing;
    }

    /// Playing → Paused. Pausing while stopped or paused is a no-op.
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped | PlayState::Paused => self.play(),
        }
    }

    /// Any state → Stopped, position reset. Used on unload/teardown.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.current_tick = 0.0;
    }

    // ─── Advancement & speed ─────────────────────────────────────────

    /// Advance by `dt` wall-clock seconds when playing.
    pub fn advance(&mut self, dt_seconds: f64) {
        if self.state == PlayState::Playing && dt_seconds > 0.0 {
            self.current_tick += dt_seconds * self.ticks_per_second();
        }
    }

    /// Set the speed multiplier, clamped to `[0.5, 2.0]`. Takes effect on
    /// the next advancement; the current tick position is untouched.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
    }

    // ─── Seconds projection & seeking ────────────────────────────────

    /// Position on the original-tempo timeline, for the scrubber and time
    /// display: `(currentTick / totalTicks) * durationSeconds`. Stable
    /// under speed changes, so the scrubber always matches the original
    /// track length. Degenerate scores map ticks to seconds directly.
    pub fn projected_display_seconds(&self) -> f64 {
        if self.total_ticks == 0 || self.duration_seconds <= 0.0 {
            return self.current_tick / self.base_ticks_per_second();
        }
        (self.current_tick / self.total_ticks as f64) * self.duration_seconds
    }

    /// Move the clock to a display-seconds position via the inverse of the
    /// projection formula. Legal in any state; does not start or stop
    /// playback. Positions past the end are allowed, the sync loop just
    /// produces no visible notes there.
    pub fn seek_display_seconds(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        self.current_tick = if self.total_ticks == 0 || self.duration_seconds <= 0.0 {
            seconds * self.base_ticks_per_second()
        } else {
            (seconds / self.duration_seconds) * self.total_ticks as f64
        };
    }

    /// Shift the position by `delta` display seconds, clamped at 0 on the
    /// lower bound only.
    pub fn skip_seconds(&mut self, delta: f64) {
        let target = (self.projected_display_seconds() + delta).max(0.0);
        self.seek_display_seconds(target);
    }
}
