//! Note scheduler — binds score events to instrument trigger calls on the
//! shared tick timeline.
//!
//! Audio and visuals both derive from the same tick coordinate, which is
//! what eliminates drift between what is heard and what is drawn. The
//! whole schedule is built up front from the parsed score; at runtime a
//! monotone cursor fires each entry exactly once, so clock jitter near a
//! note boundary can never double-trigger a (pitch, startTick) pair.

use crate::model::Score;

/// Capability for making sound. Sample loading lives behind this seam and
/// may partially fail (missing samples) without blocking playback.
pub trait Instrument {
    /// Trigger a pitch for `duration_seconds`, starting at `at_seconds` on
    /// the host's audio clock, with normalized velocity.
    fn trigger_on_off(&mut self, name: &str, duration_seconds: f64, at_seconds: f64, velocity: f32);

    /// Start a pitch sounding immediately (user pressed a key).
    fn trigger_attack(&mut self, name: &str);

    /// Stop a pitch immediately.
    fn trigger_release(&mut self, name: &str);

    /// Release the underlying audio resources.
    fn dispose(&mut self);
}

/// One pre-bound trigger: a note event reduced to what the instrument
/// needs at fire time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub pitch: u8,
    pub name: String,
    pub velocity: f32,
}

impl Trigger {
    fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }
}

/// The complete, pre-built (tick, trigger) schedule plus its fire cursor.
#[derive(Debug, Default)]
pub struct NoteScheduler {
    schedule: Vec<Trigger>,
    // Which triggers have ever fired. The fire cursor alone cannot answer
    // this: rewinds move it in both directions without sounding anything.
    fired: Vec<bool>,
    next: usize,
    last_tick: f64,
}

impl NoteScheduler {
    /// Empty scheduler for a session with no score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full schedule from a parsed score. The score's notes are
    /// already sorted by start tick, so the schedule is too.
    pub fn build(score: &Score) -> Self {
        let schedule: Vec<Trigger> = score
            .notes
            .iter()
            .map(|n| Trigger {
                start_tick: n.start_tick,
                duration_ticks: n.duration_ticks,
                pitch: n.pitch,
                name: n.name.clone(),
                velocity: n.velocity,
            })
            .collect();
        Self {
            fired: vec![false; schedule.len()],
            schedule,
            next: 0,
            last_tick: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Index of the next unfired trigger.
    pub fn cursor(&self) -> usize {
        self.next
    }

    /// Fire every trigger whose start tick has been reached. `tps` is the
    /// current effective tick rate, used to express durations in seconds
    /// at the current tempo; `at_seconds` is the host audio-clock time the
    /// attacks should land on.
    pub fn fire_due(&mut self, tick: f64, tps: f64, at_seconds: f64, instrument: &mut dyn Instrument) {
        self.last_tick = tick;
        while let Some(trigger) = self.schedule.get(self.next) {
            if trigger.start_tick as f64 > tick {
                break;
            }
            let duration_seconds = if tps > 0.0 {
                trigger.duration_ticks as f64 / tps
            } else {
                0.0
            };
            instrument.trigger_on_off(&trigger.name, duration_seconds, at_seconds, trigger.velocity);
            self.fired[self.next] = true;
            self.next += 1;
        }
    }

    /// Reposition the fire cursor after a seek. Triggers before `tick`
    /// are treated as already played; triggers after it become pending
    /// again (or for a forward seek, are skipped without sounding).
    pub fn rewind_to(&mut self, tick: f64) {
        self.next = self
            .schedule
            .partition_point(|t| (t.start_tick as f64) < tick);
        self.last_tick = tick;
    }

    /// Atomically drop all pending triggers and silence everything that
    /// was fired but is still sounding. Must run before installing a new
    /// score so a previous file cannot keep sounding after a reload.
    pub fn cancel(&mut self, instrument: &mut dyn Instrument) {
        for (trigger, fired) in self.schedule.iter().zip(&self.fired) {
            if *fired && trigger.end_tick() as f64 > self.last_tick {
                instrument.trigger_release(&trigger.name);
            }
        }
        self.schedule.clear();
        self.fired.clear();
        self.next = 0;
        self.last_tick = 0.0;
    }
}
