//! notefall — MIDI playback synchronization engine with falling-note
//! rendering geometry.
//!
//! Plays a parsed score in real time, keeping three clocks in lockstep:
//! a tick-based musical clock, the audio trigger schedule, and the visual
//! falling-note window aligned to a piano-key layout. The host supplies
//! the actual display surface, instrument and frame callback behind small
//! traits; everything here is deterministic and testable without them.
//!
//! # Example
//! ```no_run
//! use notefall::{parse_file, KeyboardLayout};
//!
//! let score = parse_file("path/to/song.mid").unwrap();
//! println!("Notes: {}", score.notes.len());
//! println!("Duration: {:.1}s at {:.0} BPM", score.duration_seconds, score.bpm);
//! let layout = KeyboardLayout::for_score(&score);
//! println!("Keys shown: {}", layout.keys.len());
//! ```

pub mod clock;
pub mod controller;
pub mod error;
pub mod keyboard;
pub mod model;
pub mod parser;
pub mod persist;
pub mod scheduler;
pub mod sync;

use std::path::Path;

pub use clock::{PlayState, TempoClock, MAX_SPEED, MIN_SPEED, SKIP_SECONDS};
pub use controller::Player;
pub use error::{InstrumentWarning, ParseError, StorageWarning};
pub use keyboard::{
    is_accidental, layout, ActiveNoteRange, KeyGeometry, KeyboardLayout, ACCIDENTAL_WIDTH_RATIO,
    KEYBOARD_MAX_PITCH, KEYBOARD_MIN_PITCH,
};
pub use model::{note_name, NoteEvent, Score};
pub use parser::parse_bytes;
pub use persist::{MemoryStore, ScoreStore};
pub use scheduler::{Instrument, NoteScheduler, Trigger};
pub use sync::{
    Bucket, DrawSurface, FrameHandle, FrameScheduler, FrameSnapshot, KeyWidget, NoteRect,
    SyncLoop, VoiceSplit, CULL_BEHIND_SECONDS, VISIBLE_SECONDS,
};

/// Parse a Standard MIDI File from a file path.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Score, ParseError> {
    let data = std::fs::read(path)?;
    parse_bytes(&data)
}

/// Convert a parsed score to a JSON string.
/// Useful for passing data across an embedding boundary.
pub fn score_to_json(score: &Score) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(score)
}

/// Serialize a frame snapshot for a host UI layer.
pub fn snapshot_to_json(snapshot: &FrameSnapshot) -> String {
    serde_json::to_string(snapshot).unwrap_or_else(|e| {
        log::error!("frame snapshot failed to serialize: {e}");
        "{}".to_string()
    })
}
