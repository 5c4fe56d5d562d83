//! Standard MIDI File parser — converts raw SMF bytes into the Score model.
//!
//! The container is decoded with `midly`; this module's job is pairing
//! note-on/note-off events into [`NoteEvent`]s on the shared tick timeline
//! and deriving the score-level timing metadata (PPQ, base tempo, totals).

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::ParseError;
use crate::model::{note_name, NoteEvent, Score, DEFAULT_BPM, DEFAULT_TICKS_PER_QUARTER};

/// Parse raw Standard MIDI File bytes into a [`Score`].
///
/// Fails with [`ParseError`] when the bytes are not a valid SMF container
/// or the container holds no tracks. Pure transformation, no side effects.
pub fn parse_bytes(data: &[u8]) -> Result<Score, ParseError> {
    let smf = Smf::parse(data)?;
    if smf.tracks.is_empty() {
        return Err(ParseError::NoTracks);
    }

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ppq) if ppq.as_int() > 0 => ppq.as_int() as u32,
        Timing::Metrical(_) => DEFAULT_TICKS_PER_QUARTER,
        Timing::Timecode(..) => {
            // SMPTE-timed files are rare for piano scores; fall back to the
            // default metrical resolution rather than refusing the file.
            log::warn!("SMPTE timing not supported, assuming {DEFAULT_TICKS_PER_QUARTER} PPQ");
            DEFAULT_TICKS_PER_QUARTER
        }
    };

    let mut bpm: Option<f64> = None;
    // Notes paired with their note-on arrival index, which decides tie
    // order at a shared start tick (note-offs can arrive in any order).
    let mut notes: Vec<(u64, NoteEvent)> = Vec::new();
    let mut on_seq: u64 = 0;
    let mut last_event_tick: u64 = 0;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;
        // Open notes keyed by (channel, key). A queue per key handles
        // overlapping re-triggers of the same pitch: first on, first off.
        let mut open: HashMap<(u8, u8), Vec<(u64, u8, u64)>> = HashMap::new();

        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry((channel.as_int(), key.as_int()))
                            .or_default()
                            .push((tick, vel.as_int(), on_seq));
                        on_seq += 1;
                    }
                    // Note-on with velocity 0 is a note-off by convention.
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some(queue) = open.get_mut(&(channel.as_int(), key.as_int())) {
                            if !queue.is_empty() {
                                let (start, vel, seq) = queue.remove(0);
                                notes.push((
                                    seq,
                                    make_note(key.as_int(), start, tick, vel, track_idx),
                                ));
                            }
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    // First tempo marking in the file wins; a single base
                    // tempo is assumed for the whole score.
                    if bpm.is_none() && us_per_quarter.as_int() > 0 {
                        bpm = Some(60_000_000.0 / f64::from(us_per_quarter.as_int()));
                    }
                }
                _ => {}
            }
        }

        // Close notes the track never terminated at the track's end.
        let mut dangling: Vec<((u8, u8), (u64, u8, u64))> = open
            .into_iter()
            .flat_map(|(k, queue)| queue.into_iter().map(move |v| (k, v)))
            .collect();
        // HashMap drain order is arbitrary; restore note-on order.
        dangling.sort_by_key(|(_, (_, _, seq))| *seq);
        for ((_, key), (start, vel, seq)) in dangling {
            notes.push((seq, make_note(key, start, tick, vel, track_idx)));
        }

        last_event_tick = last_event_tick.max(tick);
    }

    let bpm = bpm.unwrap_or(DEFAULT_BPM);

    // Notes sharing a start tick keep their note-on order; across tracks
    // the on-sequence is monotone, so earlier tracks sort first on ties.
    notes.sort_by_key(|(seq, n)| (n.start_tick, *seq));
    let mut notes: Vec<NoteEvent> = notes.into_iter().map(|(_, note)| note).collect();

    // Total ticks covers every note's end tick; an empty note list falls
    // back to the last event tick of any track (end-of-track markers).
    let total_ticks = notes
        .iter()
        .map(NoteEvent::end_tick)
        .max()
        .unwrap_or(last_event_tick);

    let ticks_per_second = bpm * ticks_per_quarter as f64 / 60.0;
    for note in &mut notes {
        note.start_seconds = note.start_tick as f64 / ticks_per_second;
        note.duration_seconds = note.duration_ticks as f64 / ticks_per_second;
    }

    Ok(Score {
        notes,
        ticks_per_quarter,
        bpm,
        duration_seconds: total_ticks as f64 / ticks_per_second,
        total_ticks,
    })
}

fn make_note(pitch: u8, start: u64, end: u64, velocity: u8, track_idx: usize) -> NoteEvent {
    NoteEvent {
        pitch,
        name: note_name(pitch),
        start_tick: start,
        // Zero-length notes (off at the same tick) still occupy one tick.
        duration_ticks: end.saturating_sub(start).max(1),
        start_seconds: 0.0,
        duration_seconds: 0.0,
        velocity: f32::from(velocity) / 127.0,
        voice: track_idx,
    }
}
