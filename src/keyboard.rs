//! Keyboard layout engine — pure geometry mapping pitches to horizontal
//! positions on a piano strip.
//!
//! The formulas here reproduce the key widget's own layout model exactly,
//! so the falling-note rectangles generated by the sync loop line up with
//! the real keys drawn beneath them. The widget sizes everything from the
//! white-key count; each pitch's offset comes from a within-octave
//! positional weight table scaled by octave index.

use serde::Serialize;

use crate::model::Score;

/// Horizontal position of each chromatic step within an octave, in
/// white-key units. Accidentals sit between the naturals they neighbor.
const PITCH_POSITIONS: [f64; 12] = [
    0.0,  // C
    0.55, // C#
    1.0,  // D
    1.8,  // D#
    2.0,  // E
    3.0,  // F
    3.5,  // F#
    4.0,  // G
    4.7,  // G#
    5.0,  // A
    5.85, // A#
    6.0,  // B
];

/// Accidental key width as a fraction of a white key's width.
pub const ACCIDENTAL_WIDTH_RATIO: f64 = 0.65;

/// Lowest pitch of a full 88-key piano (A0).
pub const KEYBOARD_MIN_PITCH: u8 = 21;

/// Highest pitch of a full 88-key piano (C8).
pub const KEYBOARD_MAX_PITCH: u8 = 108;

/// Extra pitches of breathing room on each side of a score's range.
const RANGE_MARGIN: u8 = 2;

/// Whether a pitch is an accidental (black key).
pub fn is_accidental(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

/// Absolute horizontal position of a pitch in white-key units, counted
/// from MIDI pitch 0. The same formula places white and black keys, which
/// is what keeps their edges aligned with the mirrored key widget.
fn absolute_position(pitch: u8) -> f64 {
    let octave = f64::from(pitch / 12);
    octave * 7.0 + PITCH_POSITIONS[(pitch % 12) as usize]
}

/// Per-pitch horizontal placement, as percentages of the keyboard width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyGeometry {
    pub pitch: u8,
    pub accidental: bool,
    /// Left edge as a percentage of the visible keyboard width
    pub left_pct: f64,
    /// Width as a percentage of the visible keyboard width
    pub width_pct: f64,
}

/// The pitch span currently relevant for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveNoteRange {
    pub low: u8,
    pub high: u8,
}

impl ActiveNoteRange {
    /// Full 88-key range.
    pub fn full() -> Self {
        Self {
            low: KEYBOARD_MIN_PITCH,
            high: KEYBOARD_MAX_PITCH,
        }
    }

    /// Derive the display range from a score: the score's pitch extremes
    /// padded by two semitones, clamped to the 88 keys, then widened until
    /// both boundaries land on natural pitches for clean visual edges.
    /// An empty score shows the whole keyboard.
    pub fn from_score(score: &Score) -> Self {
        let Some((min, max)) = score.pitch_range() else {
            return Self::full();
        };
        let mut low = min.saturating_sub(RANGE_MARGIN).max(KEYBOARD_MIN_PITCH);
        let mut high = (max + RANGE_MARGIN).min(KEYBOARD_MAX_PITCH);
        while is_accidental(low) && low > KEYBOARD_MIN_PITCH {
            low -= 1;
        }
        while is_accidental(high) && high < KEYBOARD_MAX_PITCH {
            high += 1;
        }
        Self { low, high }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.low <= pitch && pitch <= self.high
    }
}

/// Compute the geometry of every key in `[min_pitch, max_pitch]`.
///
/// Pure and deterministic. White-key widths sum to exactly 100% of the
/// range; a degenerate single-key range is guarded against dividing by a
/// zero white-key count.
pub fn layout(min_pitch: u8, max_pitch: u8) -> Vec<KeyGeometry> {
    let (min_pitch, max_pitch) = if min_pitch <= max_pitch {
        (min_pitch, max_pitch)
    } else {
        (max_pitch, min_pitch)
    };

    let white_count = (min_pitch..=max_pitch)
        .filter(|&p| !is_accidental(p))
        .count()
        .max(1);
    let white_width = 100.0 / white_count as f64;
    let origin = absolute_position(min_pitch);

    (min_pitch..=max_pitch)
        .map(|pitch| {
            let accidental = is_accidental(pitch);
            KeyGeometry {
                pitch,
                accidental,
                left_pct: (absolute_position(pitch) - origin) * white_width,
                width_pct: if accidental {
                    white_width * ACCIDENTAL_WIDTH_RATIO
                } else {
                    white_width
                },
            }
        })
        .collect()
}

/// A computed layout bound to its range, with by-pitch lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardLayout {
    pub range: ActiveNoteRange,
    pub keys: Vec<KeyGeometry>,
}

impl KeyboardLayout {
    /// Layout for the full 88-key keyboard.
    pub fn full() -> Self {
        let range = ActiveNoteRange::full();
        Self {
            keys: layout(range.low, range.high),
            range,
        }
    }

    /// Layout sized to a score's active note range. Recomputed once per
    /// loaded score; the range never changes during playback.
    pub fn for_score(score: &Score) -> Self {
        let range = ActiveNoteRange::from_score(score);
        Self {
            keys: layout(range.low, range.high),
            range,
        }
    }

    /// Geometry for a pitch, or `None` when it is outside the range.
    pub fn key(&self, pitch: u8) -> Option<&KeyGeometry> {
        if !self.range.contains(pitch) {
            return None;
        }
        self.keys.get((pitch - self.range.low) as usize)
    }
}
