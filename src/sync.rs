//! Render/sync loop — the per-frame bridge between the tempo clock, the
//! score and the drawing surface.
//!
//! Runs once per display frame, driven by the host's frame-presentation
//! callback (never a fixed-interval timer, so it stays locked to the real
//! display cadence). Each frame it advances a monotone search cursor over
//! the sorted note list, computes the rectangles for the 3-second visible
//! window, derives the active-pitch set and updates the scrubber. The
//! cursor keeps per-frame cost amortized O(visible notes) instead of
//! O(total notes), regardless of score length.

use serde::Serialize;

use crate::clock::TempoClock;
use crate::keyboard::KeyboardLayout;
use crate::model::Score;

/// How far ahead of "now" a note becomes visible, in original seconds of
/// the current tempo.
pub const VISIBLE_SECONDS: f64 = 3.0;

/// How far behind "now" a finished note must be before the cursor skips
/// it permanently.
pub const CULL_BEHIND_SECONDS: f64 = 1.0;

// ─── Host seams ──────────────────────────────────────────────────────

/// Identifies one outstanding frame request.
pub type FrameHandle = u64;

/// The host's frame-presentation callback, made explicit so cancellation
/// and re-entry rules are testable without a real display surface.
pub trait FrameScheduler {
    /// Ask the host to run the sync loop on the next display frame.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancel an outstanding request. Must tolerate stale handles.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// A rectangle in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The two rendering colors notes are bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bucket {
    Primary,
    Secondary,
}

/// Rule mapping a note's voice (source track index) to a color bucket.
/// Track 0 vs the rest is a heuristic for hand assignment, not a
/// guarantee, so the threshold is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSplit {
    /// Voices at or above this index land in the secondary bucket.
    pub secondary_from_voice: usize,
}

impl Default for VoiceSplit {
    fn default() -> Self {
        Self {
            secondary_from_voice: 1,
        }
    }
}

impl VoiceSplit {
    pub fn bucket(&self, voice: usize) -> Bucket {
        if voice >= self.secondary_from_voice {
            Bucket::Secondary
        } else {
            Bucket::Primary
        }
    }
}

/// Drawing surface for one frame. May report itself unavailable, in which
/// case the loop skips drawing for that frame only and keeps running.
pub trait DrawSurface {
    fn is_available(&self) -> bool;

    /// Viewport size in pixels: (width, height).
    fn viewport(&self) -> (f64, f64);

    /// Fill a batch of rectangles in one operation. Called at most once
    /// per bucket per frame, so drawing overhead stays independent of the
    /// note count. Rectangles may extend past the viewport; the surface
    /// clips.
    fn fill_rects(&mut self, bucket: Bucket, rects: &[NoteRect]);
}

/// Consumer contract of the external key widget: it receives the active
/// pitches to highlight and nothing else.
pub trait KeyWidget {
    fn set_active_pitches(&mut self, pitches: &[u8]);
}

// ─── Frame output ────────────────────────────────────────────────────

/// What one frame produced, for the host UI (scrubber, time label) and
/// for tests. Serializable so an embedding layer can consume it as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    /// Tick the frame was computed at
    pub tick: f64,
    /// Scrubber position on the original-tempo timeline
    pub display_seconds: f64,
    /// Formatted "m:ss" time label
    pub display_time: String,
    /// Pitches sounding at this tick, ascending
    pub active_pitches: Vec<u8>,
    /// Notes inside the visible window this frame
    pub visible_notes: usize,
    /// Whether rectangles were drawn (false when the surface was missing)
    pub drew: bool,
}

/// Format seconds as "m:ss" for the time display.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

// ─── The loop itself ─────────────────────────────────────────────────

/// Per-session mutable state of the render loop: the search cursor, the
/// previous frame's tick (for backward-jump detection) and the previous
/// active set (for change-detected highlight propagation).
#[derive(Debug)]
pub struct SyncLoop {
    cursor: usize,
    prev_tick: f64,
    prev_active: Vec<u8>,
    pub split: VoiceSplit,
}

impl Default for SyncLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncLoop {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            prev_tick: 0.0,
            prev_active: Vec::new(),
            split: VoiceSplit::default(),
        }
    }

    /// Reset for a new score (or teardown). The cursor, jump detector and
    /// highlight memory all go back to zero.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.prev_tick = 0.0;
        self.prev_active.clear();
    }

    /// Current search cursor index, monotone during forward playback.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Run one frame: cull, search the visible window, draw, derive the
    /// active set and update the scrubber values.
    pub fn frame(
        &mut self,
        clock: &TempoClock,
        score: &Score,
        layout: &KeyboardLayout,
        mut surface: Option<&mut dyn DrawSurface>,
        widget: &mut dyn KeyWidget,
    ) -> FrameSnapshot {
        let tick = clock.current_tick();
        let tps = clock.ticks_per_second();
        let notes = &score.notes;

        // 1. A backward jump (seek) is the only thing that moves the
        //    cursor backward, and it resets it all the way to 0.
        if tick < self.prev_tick {
            self.cursor = 0;
        }
        self.prev_tick = tick;

        // 2. Permanently skip notes that ended more than one second (in
        //    current-tempo ticks) ago; they can never become visible again
        //    during forward playback.
        let cull_before = tick - CULL_BEHIND_SECONDS * tps;
        while self.cursor < notes.len()
            && (notes[self.cursor].end_tick() as f64) < cull_before
        {
            self.cursor += 1;
        }

        // 3–4. Collect the visible window and the active set. Iteration
        // stops at the first note past the window (the list is sorted);
        // notes already finished are skipped without advancing the
        // cursor, since a longer earlier note may still be scrolling off.
        let window_ticks = VISIBLE_SECONDS * tps;
        let can_draw = surface.as_ref().map_or(false, |s| s.is_available());
        let (view_w, view_h) = if can_draw {
            surface.as_ref().map_or((0.0, 0.0), |s| s.viewport())
        } else {
            (0.0, 0.0)
        };

        let mut primary: Vec<NoteRect> = Vec::new();
        let mut secondary: Vec<NoteRect> = Vec::new();
        let mut active: Vec<u8> = Vec::new();
        let mut visible = 0usize;

        for note in &notes[self.cursor..] {
            if note.start_tick as f64 > tick + window_ticks {
                break;
            }
            if (note.end_tick() as f64) <= tick {
                continue;
            }
            visible += 1;

            if note.is_active_at(tick) {
                active.push(note.pitch);
            }

            if can_draw {
                if let Some(key) = layout.key(note.pitch) {
                    // A note's bottom edge reaches the keyboard line
                    // (y = view_h) exactly at its start tick.
                    let bottom =
                        view_h - (note.start_tick as f64 - tick) / window_ticks * view_h;
                    let height = note.duration_ticks as f64 / window_ticks * view_h;
                    let rect = NoteRect {
                        x: key.left_pct / 100.0 * view_w,
                        y: bottom - height,
                        width: key.width_pct / 100.0 * view_w,
                        height,
                    };
                    match self.split.bucket(note.voice) {
                        Bucket::Primary => primary.push(rect),
                        Bucket::Secondary => secondary.push(rect),
                    }
                }
            }
        }

        // 5. One fill per bucket.
        if can_draw {
            if let Some(surface) = surface.as_deref_mut() {
                if !primary.is_empty() {
                    surface.fill_rects(Bucket::Primary, &primary);
                }
                if !secondary.is_empty() {
                    surface.fill_rects(Bucket::Secondary, &secondary);
                }
            }
        }

        // 6. Only propagate the active set when it actually changed.
        active.sort_unstable();
        active.dedup();
        if active != self.prev_active {
            widget.set_active_pitches(&active);
            self.prev_active = active.clone();
        }

        // 7. Scrubber and time display.
        let display_seconds = clock.projected_display_seconds();
        FrameSnapshot {
            tick,
            display_seconds,
            display_time: format_time(display_seconds),
            active_pitches: active,
            visible_notes: visible,
            drew: can_draw,
        }
    }
}
