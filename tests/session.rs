use std::time::{Duration, Instant};

use chordgrid::{
    ChordLabel, Config, Grid, GridConfig, PitchRange, Sequencer, Timbre, ToggleOutcome, Tone,
    ToneSettings, ToneSink,
};

#[derive(Default)]
struct Recorder {
    tones: Vec<Tone>,
}

impl Recorder {
    fn take(&mut self) -> Vec<Tone> {
        std::mem::take(&mut self.tones)
    }
}

impl ToneSink for Recorder {
    fn emit(&mut self, tone: Tone) {
        self.tones.push(tone);
    }
}

fn locked_bass() -> Sequencer<Recorder> {
    let config = Config {
        tempo_bpm: 120.0,
        ..Config::default()
    };
    Sequencer::new(&config, Recorder::default()).unwrap()
}

fn free_grid() -> Sequencer<Recorder> {
    let config = Config {
        tempo_bpm: 120.0,
        locked_notes: vec![],
        ..Config::default()
    };
    Sequencer::new(&config, Recorder::default()).unwrap()
}

#[test]
fn build_a_progression_over_a_locked_bass() {
    let mut seq = locked_bass();

    // C2 is locked in bar 1: add E and G
    seq.toggle_note(0, 16);
    assert_eq!(seq.chord_label(0), None);
    seq.toggle_note(0, 19);
    assert_eq!(seq.chord_label(0), Some(ChordLabel::Major(0)));

    // A2 in bar 2: add C3, E3
    seq.toggle_note(1, 12);
    seq.toggle_note(1, 16);
    assert_eq!(seq.chord_label(1).map(|l| l.to_string()).as_deref(), Some("A Minor"));

    // F2 in bar 3: add A2, C3, Eb3 makes it complex
    seq.toggle_note(2, 9);
    seq.toggle_note(2, 12);
    seq.toggle_note(2, 15);
    assert_eq!(seq.chord_label(2), Some(ChordLabel::Complex));

    assert_eq!(
        seq.progression(),
        "1: C Major | 2: A Minor | 3: Complex/Inversion | 4: -"
    );
}

#[test]
fn locked_note_survives_any_toggle_sequence() {
    let mut seq = locked_bass();
    let range = seq.grid().range();
    for round in 0..3 {
        for note in 0..range.total_notes() as u8 {
            let bar = (note as usize + round) % seq.bars();
            seq.toggle_note(bar, note);
            for bar in 0..seq.bars() {
                let locked = seq.grid().locked_note(bar).unwrap();
                assert!(seq.active_notes(bar).contains(locked));
                assert!(seq.active_notes(bar).len() <= 4);
            }
        }
    }
}

#[test]
fn locked_toggle_gives_feedback_without_changing_state() {
    let mut seq = locked_bass();
    seq.toggle_note(0, 4);
    seq.sink_mut().take();

    let before = seq.active_notes(0).clone();
    for _ in 0..3 {
        assert_eq!(seq.toggle_note(0, 0), ToggleOutcome::Locked(0));
    }
    assert_eq!(seq.active_notes(0), &before);

    let tones = seq.sink_mut().take();
    assert_eq!(tones.len(), 3);
    assert!(tones.iter().all(|t| t.timbre == Timbre::Square));
}

#[test]
fn clear_returns_to_initial_sets() {
    let mut seq = locked_bass();
    for bar in 0..4 {
        for note in [12, 16, 19] {
            seq.toggle_note(bar, note);
        }
    }
    seq.clear();
    for bar in 0..4 {
        let locked = seq.grid().locked_note(bar).unwrap();
        assert_eq!(seq.active_notes(bar).iter().collect::<Vec<_>>(), vec![locked]);
        assert_eq!(seq.chord_label(bar), None);
    }

    let mut seq = free_grid();
    seq.toggle_note(3, 1);
    seq.clear();
    assert!((0..4).all(|bar| seq.active_notes(bar).is_empty()));
}

#[test]
fn playback_loops_bars_and_stops() {
    let mut seq = free_grid();
    for note in [0, 4, 7] {
        seq.toggle_note(0, note);
    }
    seq.toggle_note(2, 9);
    seq.sink_mut().take();

    let t0 = Instant::now();
    seq.start_at(t0);
    assert_eq!(seq.cursor(), Some(0));
    let first = seq.sink_mut().take();
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|t| t.timbre == Timbre::Triangle));

    for n in 1..=10u64 {
        assert!(seq.poll_at(t0 + Duration::from_secs(2 * n)));
        assert_eq!(seq.cursor(), Some(n as usize % 4));
    }

    seq.stop();
    seq.stop();
    assert_eq!(seq.cursor(), None);
    seq.sink_mut().take();
    assert!(!seq.poll_at(t0 + Duration::from_secs(600)));
    assert!(seq.sink().tones.is_empty());
}

#[test]
fn edits_during_playback_are_heard_next_bar() {
    let mut seq = free_grid();
    let t0 = Instant::now();
    seq.start_at(t0);
    assert!(seq.sink_mut().take().is_empty());

    seq.toggle_note(1, 24);
    let preview = seq.sink_mut().take();
    assert_eq!(preview.len(), 1);
    assert_eq!(preview[0].timbre, Timbre::Sine);

    seq.poll_at(t0 + Duration::from_secs(2));
    let bar_two = seq.sink_mut().take();
    assert_eq!(bar_two.len(), 1);
    assert_eq!(bar_two[0].frequency_hz, seq.grid().range().frequency_of(24));
}

#[test]
fn session_expiry_stops_playback() {
    let mut seq = locked_bass();
    seq.start();
    assert!(seq.is_playing());
    seq.session_expired();
    assert!(!seq.is_playing());
    assert_eq!(seq.cursor(), None);
    seq.session_expired();
    assert_eq!(seq.cursor(), None);
}

#[test]
fn uncapped_grid_from_explicit_config() {
    let grid = Grid::new(GridConfig {
        bars: 2,
        range: PitchRange::new(3, 1),
        max_voices: None,
        locked_notes: vec![],
    })
    .unwrap();
    let mut seq = Sequencer::with_grid(grid, 100.0, ToneSettings::default(), Recorder::default());
    for note in 0..13u8 {
        assert_eq!(seq.toggle_note(1, note), ToggleOutcome::Added(note));
    }
    assert_eq!(seq.active_notes(1).len(), 13);
    assert_eq!(seq.chord_label(1), Some(ChordLabel::Complex));
}

#[test]
fn non_finite_settings_are_rejected_before_playback() {
    let config = Config::from_toml_str("tempo_bpm = nan").unwrap();
    assert!(Sequencer::new(&config, Recorder::default()).is_err());

    let config = Config::from_toml_str(
        "[tones.harmony]\nduration_secs = inf\ntimbre = \"triangle\"\nvolume = 0.25\n",
    )
    .unwrap();
    assert!(Sequencer::new(&config, Recorder::default()).is_err());
}
