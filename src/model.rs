//! Data model for a parsed musical score.
//!
//! These structures capture the note events and timing metadata needed to
//! drive audio triggering and falling-note rendering from one shared tick
//! coordinate. Everything here is immutable once parsing finishes; the
//! scheduler and the sync loop only ever hold read-only views.

use serde::{Deserialize, Serialize};

/// Tick resolution used when the file does not carry one.
pub const DEFAULT_TICKS_PER_QUARTER: u32 = 192;

/// Tempo used when the file has no tempo marking.
pub const DEFAULT_BPM: f64 = 120.0;

/// One note of the score, placed on the tick timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch number (0–127)
    pub pitch: u8,
    /// Display name, e.g. "C4" or "F#3"
    pub name: String,
    /// Onset in ticks from the start of the score
    pub start_tick: u64,
    /// Length in ticks (always at least 1)
    pub duration_ticks: u64,
    /// Onset in seconds at the base tempo (for the scrubber mapping)
    pub start_seconds: f64,
    /// Length in seconds at the base tempo
    pub duration_seconds: f64,
    /// Normalized attack velocity (0.0–1.0)
    pub velocity: f32,
    /// Source track index; used only to bucket notes into two
    /// rendering colors
    pub voice: usize,
}

impl NoteEvent {
    /// Tick at which the note stops sounding (exclusive).
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }

    /// Whether the note is sounding at `tick`. Inclusive at the start
    /// boundary, exclusive at the end.
    pub fn is_active_at(&self, tick: f64) -> bool {
        self.start_tick as f64 <= tick && tick < self.end_tick() as f64
    }
}

/// A complete parsed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Note events sorted ascending by `start_tick`; equal onsets keep
    /// their original parse order
    pub notes: Vec<NoteEvent>,
    /// Ticks per quarter note (PPQ)
    pub ticks_per_quarter: u32,
    /// Base tempo from the first tempo marking, in beats per minute
    pub bpm: f64,
    /// Total duration in seconds at the base tempo
    pub duration_seconds: f64,
    /// Total duration in ticks; at least every note's end tick
    pub total_ticks: u64,
}

impl Score {
    /// True when the score carries no note events.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Tick rate at the base tempo (speed 1.0).
    pub fn base_ticks_per_second(&self) -> f64 {
        self.bpm * self.ticks_per_quarter as f64 / 60.0
    }

    /// Lowest and highest pitch in the score, or `None` when empty.
    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let mut iter = self.notes.iter();
        let first = iter.next()?;
        let mut lo = first.pitch;
        let mut hi = first.pitch;
        for note in iter {
            lo = lo.min(note.pitch);
            hi = hi.max(note.pitch);
        }
        Some((lo, hi))
    }

    /// Notes whose sounding interval overlaps `[start_tick, end_tick)`.
    pub fn notes_in_range(
        &self,
        start_tick: u64,
        end_tick: u64,
    ) -> impl Iterator<Item = &NoteEvent> {
        self.notes
            .iter()
            .filter(move |n| n.start_tick < end_tick && n.end_tick() > start_tick)
    }
}

/// English note name for a MIDI pitch number, middle C (60) = "C4".
pub fn note_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}
