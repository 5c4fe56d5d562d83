//! End-to-end playback tests — drive a `Player` session through load,
//! transport commands and frame pumping with fake host collaborators.

use notefall::{
    parse_bytes, Bucket, DrawSurface, FrameHandle, FrameScheduler, Instrument, KeyWidget,
    MemoryStore, NoteRect, ParseError, PlayState, Player, ScoreStore,
};
use pretty_assertions::assert_eq;

// ─── SMF builder (same shape as parse_tests) ─────────────────────────

fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        out.push(0);
        return;
    }
    let mut buf = [0u8; 5];
    let mut i = 0;
    while value > 0 {
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if i > 0 {
            buf[i] |= 0x80;
        }
        i += 1;
    }
    for j in (0..i).rev() {
        out.push(buf[j]);
    }
}

fn track(events: &[(u32, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    for (delta, bytes) in events {
        write_vlq(&mut data, *delta);
        data.extend_from_slice(bytes);
    }
    data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    data
}

fn smf(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&ppq.to_be_bytes());
    for track_data in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        out.extend_from_slice(track_data);
    }
    out
}

/// 120 BPM, PPQ 192: C4 on [0,96), E4 on [96,192).
fn two_note_file() -> Vec<u8> {
    let tempo: &[u8] = &[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]; // 500000 us/quarter
    smf(
        192,
        &[track(&[
            (0, tempo),
            (0, &[0x90, 60, 100]),
            (96, &[0x80, 60, 0]),
            (0, &[0x90, 64, 100]),
            (96, &[0x80, 64, 0]),
        ])],
    )
}

// ─── Fake host collaborators ──────────────────────────────────────────

#[derive(Default)]
struct FakeInstrument {
    attacks: Vec<(String, f64)>,
    pressed: Vec<String>,
    releases: Vec<String>,
    disposed: bool,
}

impl Instrument for FakeInstrument {
    fn trigger_on_off(&mut self, name: &str, duration_seconds: f64, _at: f64, _velocity: f32) {
        self.attacks.push((name.to_string(), duration_seconds));
    }
    fn trigger_attack(&mut self, name: &str) {
        self.pressed.push(name.to_string());
    }
    fn trigger_release(&mut self, name: &str) {
        self.releases.push(name.to_string());
    }
    fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[derive(Default)]
struct FakeFrames {
    next_handle: FrameHandle,
    requested: Vec<FrameHandle>,
    cancelled: Vec<FrameHandle>,
}

impl FrameScheduler for FakeFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_handle += 1;
        self.requested.push(self.next_handle);
        self.next_handle
    }
    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.cancelled.push(handle);
    }
}

#[derive(Default)]
struct FakeWidget {
    sets: Vec<Vec<u8>>,
}

impl KeyWidget for FakeWidget {
    fn set_active_pitches(&mut self, pitches: &[u8]) {
        self.sets.push(pitches.to_vec());
    }
}

struct FakeSurface {
    fills: Vec<(Bucket, Vec<NoteRect>)>,
}

impl DrawSurface for FakeSurface {
    fn is_available(&self) -> bool {
        true
    }
    fn viewport(&self) -> (f64, f64) {
        (800.0, 480.0)
    }
    fn fill_rects(&mut self, bucket: Bucket, rects: &[NoteRect]) {
        self.fills.push((bucket, rects.to_vec()));
    }
}

struct Session {
    player: Player,
    instrument: FakeInstrument,
    frames: FakeFrames,
    widget: FakeWidget,
    store: MemoryStore,
}

impl Session {
    fn load(bytes: &[u8]) -> Self {
        let mut s = Session {
            player: Player::new(),
            instrument: FakeInstrument::default(),
            frames: FakeFrames::default(),
            widget: FakeWidget::default(),
            store: MemoryStore::new(1 << 20),
        };
        s.player
            .load("song.mid", bytes, &mut s.instrument, &mut s.store)
            .expect("load should succeed");
        s
    }

    fn frame(&mut self, now: f64) -> notefall::FrameSnapshot {
        self.player.frame(
            now,
            None,
            &mut self.widget,
            &mut self.instrument,
            &mut self.frames,
        )
    }
}

// ─── Scenario tests ───────────────────────────────────────────────────

#[test]
fn active_set_follows_the_two_note_scenario() {
    let mut s = Session::load(&two_note_file());
    // Score: 192 total ticks, 0.5s, 384 ticks/s.
    s.player.play(&mut s.frames);

    let snap = s.frame(0.0);
    assert_eq!(snap.active_pitches, vec![60]);

    // tick 96 = 0.25 display seconds
    s.player.seek(0.25);
    let snap = s.frame(0.0);
    assert_eq!(snap.tick, 96.0);
    assert_eq!(snap.active_pitches, vec![64]);

    // tick 200 is past both notes
    s.player.seek(200.0 / 384.0);
    let snap = s.frame(0.0);
    assert_eq!(snap.active_pitches, Vec::<u8>::new());
}

#[test]
fn double_speed_advances_twice_as_far_per_second() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    s.frame(0.0);
    s.frame(1.0);
    let tick_1x = s.player.clock().current_tick();
    assert!((tick_1x - 384.0).abs() < 1e-9);

    let mut fast = Session::load(&two_note_file());
    fast.player.set_speed(2.0);
    fast.player.play(&mut fast.frames);
    fast.frame(0.0);
    fast.frame(1.0);
    assert!((fast.player.clock().current_tick() - tick_1x * 2.0).abs() < 1e-9);
}

#[test]
fn seek_round_trips_display_seconds() {
    let mut s = Session::load(&two_note_file());
    s.player.seek(0.3);
    let snap = s.frame(0.0);
    assert!((snap.display_seconds - 0.3).abs() < 1e-6);
}

#[test]
fn playback_triggers_each_note_once() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    // Pump frames over one real second in uneven steps.
    for now in [0.0, 0.13, 0.26, 0.27, 0.5, 0.9, 1.0] {
        s.frame(now);
    }
    let names: Vec<&str> = s.instrument.attacks.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["C4", "E4"]);
    // 96 ticks at 384 ticks/s = 0.25 seconds.
    assert!((s.instrument.attacks[0].1 - 0.25).abs() < 1e-9);
}

#[test]
fn forward_seek_skips_notes_without_sounding_them() {
    let mut s = Session::load(&two_note_file());
    s.player.seek(0.4); // past both note starts
    s.player.play(&mut s.frames);
    s.frame(0.0);
    assert!(s.instrument.attacks.is_empty());
}

#[test]
fn skip_backward_clamps_to_start() {
    let mut s = Session::load(&two_note_file());
    s.player.seek(0.3);
    s.player.skip_backward(); // 0.3 - 5.0 clamps to 0
    assert_eq!(s.player.clock().current_tick(), 0.0);
}

#[test]
fn skip_forward_past_end_shows_no_notes() {
    let mut s = Session::load(&two_note_file());
    s.player.skip_forward(); // 5s into a 0.5s score
    s.player.play(&mut s.frames);
    let snap = s.frame(0.0);
    assert_eq!(snap.visible_notes, 0);
    assert_eq!(snap.active_pitches, Vec::<u8>::new());
    assert!((snap.display_seconds - 5.0).abs() < 1e-6);
}

#[test]
fn pause_freezes_the_clock() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    s.frame(0.0);
    s.frame(0.1);
    s.player.pause();
    let tick = s.player.clock().current_tick();
    s.frame(0.2);
    s.frame(0.3);
    assert_eq!(s.player.clock().current_tick(), tick);
    assert_eq!(s.player.state(), PlayState::Paused);
}

#[test]
fn toggle_play_round_trips() {
    let mut s = Session::load(&two_note_file());
    s.player.toggle_play(&mut s.frames);
    assert_eq!(s.player.state(), PlayState::Playing);
    s.player.toggle_play(&mut s.frames);
    assert_eq!(s.player.state(), PlayState::Paused);
}

// ─── Frame scheduling & drawing ───────────────────────────────────────

#[test]
fn playing_keeps_exactly_one_frame_request_outstanding() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    assert_eq!(s.frames.requested.len(), 1);

    s.frame(0.0);
    assert_eq!(s.frames.requested.len(), 2);

    s.player.pause();
    s.frame(0.1);
    // Paused: no re-request.
    assert_eq!(s.frames.requested.len(), 2);
}

#[test]
fn frame_draws_one_batch_per_bucket() {
    let left = track(&[(0, &[0x90, 48, 90]), (96, &[0x80, 48, 0])]);
    let right = track(&[(0, &[0x91, 72, 90]), (96, &[0x81, 72, 0])]);
    let bytes = smf(192, &[right, left]);

    let mut s = Session::load(&bytes);
    s.player.play(&mut s.frames);
    let mut surface = FakeSurface { fills: Vec::new() };
    let snap = s.player.frame(
        0.0,
        Some(&mut surface),
        &mut s.widget,
        &mut s.instrument,
        &mut s.frames,
    );
    assert!(snap.drew);
    assert_eq!(surface.fills.len(), 2);
    assert_eq!(surface.fills[0].0, Bucket::Primary);
    assert_eq!(surface.fills[0].1.len(), 1);
    assert_eq!(surface.fills[1].0, Bucket::Secondary);
    assert_eq!(surface.fills[1].1.len(), 1);
}

// ─── Key widget input ─────────────────────────────────────────────────

#[test]
fn widget_presses_route_to_the_instrument() {
    let mut s = Session::load(&two_note_file());
    s.player.press_key(60, &mut s.instrument);
    s.player.release_key(60, &mut s.instrument);
    assert_eq!(s.instrument.pressed, vec!["C4".to_string()]);
    assert_eq!(s.instrument.releases, vec!["C4".to_string()]);
    // Manual keys never touch the schedule.
    assert!(s.instrument.attacks.is_empty());
}

// ─── Reload & teardown ────────────────────────────────────────────────

#[test]
fn reload_cancels_sounding_notes_from_previous_score() {
    // One very long note so it is still sounding when we reload.
    let long = smf(
        192,
        &[track(&[(0, &[0x90, 60, 100]), (19200, &[0x80, 60, 0])])],
    );
    let mut s = Session::load(&long);
    s.player.play(&mut s.frames);
    s.frame(0.0);
    assert_eq!(s.instrument.attacks.len(), 1);

    s.player
        .load("next.mid", &two_note_file(), &mut s.instrument, &mut s.store)
        .unwrap();
    assert_eq!(s.instrument.releases, vec!["C4".to_string()]);
    assert_eq!(s.player.state(), PlayState::Stopped);
}

#[test]
fn reload_after_backward_seek_still_releases_sounding_note() {
    let long = smf(
        192,
        &[track(&[(0, &[0x90, 60, 100]), (19200, &[0x80, 60, 0])])],
    );
    let mut s = Session::load(&long);
    s.player.play(&mut s.frames);
    s.frame(0.0);
    s.frame(0.5); // the long note fires and is sounding
    assert_eq!(s.instrument.attacks.len(), 1);

    // A backward seek must not make the reload forget it.
    s.player.seek(0.0);
    s.player
        .load("next.mid", &two_note_file(), &mut s.instrument, &mut s.store)
        .unwrap();
    assert_eq!(s.instrument.releases, vec!["C4".to_string()]);
}

#[test]
fn failed_load_keeps_previous_session() {
    let mut s = Session::load(&two_note_file());
    let err = s
        .player
        .load("bad.mid", b"garbage", &mut s.instrument, &mut s.store)
        .unwrap_err();
    assert!(matches!(err, ParseError::InvalidContainer(_)));
    assert!(s.player.score().is_some());
    // Old schedule untouched: playing still triggers.
    s.player.play(&mut s.frames);
    s.frame(0.0);
    assert_eq!(s.instrument.attacks.len(), 1);
}

#[test]
fn teardown_stops_cancels_and_disposes() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    let outstanding = *s.frames.requested.last().unwrap();

    let mut instrument = std::mem::take(&mut s.instrument);
    s.player.teardown(&mut instrument, &mut s.frames);

    assert_eq!(s.player.state(), PlayState::Stopped);
    assert!(instrument.disposed);
    assert_eq!(s.frames.cancelled, vec![outstanding]);
    assert!(s.player.score().is_none());
}

#[test]
fn frames_after_teardown_still_update_scrubber_only() {
    let mut s = Session::load(&two_note_file());
    let mut instrument = std::mem::take(&mut s.instrument);
    s.player.teardown(&mut instrument, &mut s.frames);

    let snap = s.frame(1.0);
    assert_eq!(snap.visible_notes, 0);
    assert_eq!(snap.display_time, "0:00");
}

// ─── Persistence ──────────────────────────────────────────────────────

#[test]
fn load_persists_bytes_for_resume() {
    let bytes = two_note_file();
    let s = Session::load(&bytes);
    assert_eq!(s.store.retrieve(), Some(("song.mid".to_string(), bytes)));
}

#[test]
fn storage_quota_failure_does_not_block_loading() {
    let mut player = Player::new();
    let mut instrument = FakeInstrument::default();
    let mut store = MemoryStore::new(4); // too small for any real file
    player
        .load("song.mid", &two_note_file(), &mut instrument, &mut store)
        .expect("quota failure must not fail the load");
    assert!(player.score().is_some());
    assert_eq!(store.retrieve(), None);
}

// ─── Snapshot JSON ────────────────────────────────────────────────────

#[test]
fn snapshot_serializes_for_host_ui() {
    let mut s = Session::load(&two_note_file());
    s.player.play(&mut s.frames);
    let snap = s.frame(0.0);
    let json = notefall::snapshot_to_json(&snap);
    assert!(json.contains("\"display_seconds\""));
    assert!(json.contains("\"active_pitches\""));
    assert!(json.contains("\"display_time\""));

    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(parsed["active_pitches"].is_array());
}

#[test]
fn parse_bytes_is_reusable_outside_the_player() {
    let score = parse_bytes(&two_note_file()).unwrap();
    assert_eq!(score.notes.len(), 2);
    assert_eq!(score.pitch_range(), Some((60, 64)));
}
