//! Playback controller — the public command surface over the tempo clock
//! and the note scheduler.
//!
//! `Player` owns the whole session explicitly (score, layout, clock,
//! scheduler, sync-loop state) instead of keeping any of it as ambient
//! global state. Every command is a direct, synchronous mutation of clock
//! state; the audio and visual engines poll that state each frame rather
//! than receiving pushed events, so no queuing is needed.

use crate::clock::{PlayState, TempoClock, SKIP_SECONDS};
use crate::error::ParseError;
use crate::keyboard::KeyboardLayout;
use crate::model::{note_name, Score};
use crate::parser;
use crate::persist::ScoreStore;
use crate::scheduler::{Instrument, NoteScheduler};
use crate::sync::{DrawSurface, FrameHandle, FrameScheduler, FrameSnapshot, KeyWidget, SyncLoop};

/// One playback session: a loaded score and the machinery that plays it.
pub struct Player {
    score: Option<Score>,
    layout: KeyboardLayout,
    clock: TempoClock,
    scheduler: NoteScheduler,
    sync: SyncLoop,
    pending_frame: Option<FrameHandle>,
    last_frame_at: Option<f64>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            score: None,
            layout: KeyboardLayout::full(),
            clock: TempoClock::idle(),
            scheduler: NoteScheduler::new(),
            sync: SyncLoop::new(),
            pending_frame: None,
            last_frame_at: None,
        }
    }

    // ─── Loading ─────────────────────────────────────────────────────

    /// Parse `bytes` and install the score, atomically replacing any
    /// previous session: pending triggers from the old score are
    /// cancelled before the new schedule exists, so a reload can never
    /// leave stale notes sounding. The raw bytes are persisted for
    /// resume; a storage failure is logged and ignored.
    pub fn load(
        &mut self,
        name: &str,
        bytes: &[u8],
        instrument: &mut dyn Instrument,
        store: &mut dyn ScoreStore,
    ) -> Result<(), ParseError> {
        let score = parser::parse_bytes(bytes)?;

        self.clock.stop();
        self.scheduler.cancel(instrument);

        self.layout = KeyboardLayout::for_score(&score);
        self.clock = TempoClock::new(&score);
        self.scheduler = NoteScheduler::build(&score);
        self.sync.reset();
        self.last_frame_at = None;
        self.score = Some(score);

        if let Err(warning) = store.store(name, bytes) {
            log::warn!("score not persisted: {warning}");
        }
        log::debug!(
            "loaded '{}': {} notes, {} ticks",
            name,
            self.score.as_ref().map_or(0, |s| s.notes.len()),
            self.clock_total_ticks()
        );
        Ok(())
    }

    fn clock_total_ticks(&self) -> u64 {
        self.score.as_ref().map_or(0, |s| s.total_ticks)
    }

    // ─── Transport commands ──────────────────────────────────────────

    pub fn play(&mut self, frames: &mut dyn FrameScheduler) {
        self.clock.play();
        self.ensure_frame_requested(frames);
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn toggle_play(&mut self, frames: &mut dyn FrameScheduler) {
        if self.clock.is_playing() {
            self.pause();
        } else {
            self.play(frames);
        }
    }

    /// Move to a display-seconds position. Legal in any state; the sync
    /// loop notices a backward move on its next frame and resets its
    /// search cursor, and the scheduler cursor is repositioned here so
    /// seeked-past notes neither sound late nor double-trigger.
    pub fn seek(&mut self, display_seconds: f64) {
        self.clock.seek_display_seconds(display_seconds);
        self.scheduler.rewind_to(self.clock.current_tick());
    }

    pub fn skip_forward(&mut self) {
        self.clock.skip_seconds(SKIP_SECONDS);
        self.scheduler.rewind_to(self.clock.current_tick());
    }

    pub fn skip_backward(&mut self) {
        self.clock.skip_seconds(-SKIP_SECONDS);
        self.scheduler.rewind_to(self.clock.current_tick());
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        self.clock.set_speed(multiplier);
    }

    // ─── Key widget input ────────────────────────────────────────────

    /// A key pressed on the widget sounds immediately, independent of
    /// the transport. The release is the widget's responsibility too;
    /// nothing here schedules one.
    pub fn press_key(&mut self, pitch: u8, instrument: &mut dyn Instrument) {
        instrument.trigger_attack(&note_name(pitch));
    }

    pub fn release_key(&mut self, pitch: u8, instrument: &mut dyn Instrument) {
        instrument.trigger_release(&note_name(pitch));
    }

    pub fn state(&self) -> PlayState {
        self.clock.state()
    }

    pub fn clock(&self) -> &TempoClock {
        &self.clock
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn score(&self) -> Option<&Score> {
        self.score.as_ref()
    }

    // ─── Frame pump ──────────────────────────────────────────────────

    /// Run one display frame at host time `now_seconds`: advance the
    /// clock by the elapsed wall time, fire due audio triggers, render,
    /// and re-request the next frame while playing. The host calls this
    /// from its frame-presentation callback; invocations never overlap.
    pub fn frame(
        &mut self,
        now_seconds: f64,
        surface: Option<&mut dyn DrawSurface>,
        widget: &mut dyn KeyWidget,
        instrument: &mut dyn Instrument,
        frames: &mut dyn FrameScheduler,
    ) -> FrameSnapshot {
        // This invocation consumes the outstanding request.
        self.pending_frame = None;

        let dt = self
            .last_frame_at
            .map_or(0.0, |last| (now_seconds - last).max(0.0));
        self.last_frame_at = Some(now_seconds);
        self.clock.advance(dt);

        if self.clock.is_playing() {
            self.scheduler.fire_due(
                self.clock.current_tick(),
                self.clock.ticks_per_second(),
                now_seconds,
                instrument,
            );
        }

        let snapshot = match self.score.as_ref() {
            Some(score) => self.sync.frame(&self.clock, score, &self.layout, surface, widget),
            None => empty_snapshot(&self.clock),
        };

        if self.clock.is_playing() {
            self.ensure_frame_requested(frames);
        }
        snapshot
    }

    fn ensure_frame_requested(&mut self, frames: &mut dyn FrameScheduler) {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(frames.request_frame());
        }
    }

    // ─── Teardown ────────────────────────────────────────────────────

    /// Tear the session down: stop the clock, cancel pending triggers,
    /// dispose the instrument, cancel the outstanding frame callback.
    /// Every step runs unconditionally; a leaked frame callback after
    /// teardown would mutate a defunct rendering surface.
    pub fn teardown(&mut self, instrument: &mut dyn Instrument, frames: &mut dyn FrameScheduler) {
        self.clock.stop();
        self.scheduler.cancel(instrument);
        instrument.dispose();
        if let Some(handle) = self.pending_frame.take() {
            frames.cancel_frame(handle);
        }
        self.score = None;
        self.sync.reset();
        self.last_frame_at = None;
    }
}

fn empty_snapshot(clock: &TempoClock) -> FrameSnapshot {
    let display_seconds = clock.projected_display_seconds();
    FrameSnapshot {
        tick: clock.current_tick(),
        display_seconds,
        display_time: crate::sync::format_time(display_seconds),
        active_pitches: Vec::new(),
        visible_notes: 0,
        drew: false,
    }
}
