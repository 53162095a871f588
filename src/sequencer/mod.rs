/// Core sequencer - the grid, playback and tone port behind one interface
use std::time::Instant;
use tracing::debug;

pub mod grid;
pub mod playback;

use crate::audio::ToneSink;
use crate::chord::ChordLabel;
use crate::config::{Config, ToneSettings};
use crate::error::Result;
use grid::{Grid, NoteSet, ToggleOutcome};
use playback::PlaybackEngine;

/// A harmony session: user edits, chord feedback and looped playback.
///
/// All methods run on the caller's thread. The host forwards user events here
/// and calls [`Sequencer::poll`] regularly while playing.
pub struct Sequencer<S: ToneSink> {
    grid: Grid,
    playback: PlaybackEngine,
    tones: ToneSettings,
    sink: S,
}

impl<S: ToneSink> Sequencer<S> {
    pub fn new(config: &Config, sink: S) -> Result<Self> {
        let grid = Grid::new(config.grid_config()?)?;
        Ok(Self::with_grid(grid, config.tempo_bpm, config.tones, sink))
    }

    pub fn with_grid(grid: Grid, tempo: f32, tones: ToneSettings, sink: S) -> Self {
        Self {
            grid,
            playback: PlaybackEngine::new(tempo, tones.harmony),
            tones,
            sink,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn bars(&self) -> usize {
        self.grid.bars()
    }

    /// Toggle a note and give audible feedback: a preview of the note when
    /// the bar changed, the locked tone when the note cannot be removed.
    pub fn toggle_note(&mut self, bar: usize, note: u8) -> ToggleOutcome {
        let outcome = self.grid.toggle(bar, note);
        let frequency = self.grid.range().frequency_of(note);
        match outcome {
            ToggleOutcome::Locked(_) => {
                debug!("bar {} note {} is locked", bar, note);
                self.sink.emit(self.tones.locked.tone(frequency));
            }
            ToggleOutcome::Added(_) | ToggleOutcome::Removed(_) | ToggleOutcome::Replaced { .. } => {
                self.sink.emit(self.tones.preview.tone(frequency));
            }
            ToggleOutcome::Ignored => {}
        }
        outcome
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    pub fn active_notes(&self, bar: usize) -> &NoteSet {
        self.grid.active_notes(bar)
    }

    pub fn chord_label(&self, bar: usize) -> Option<ChordLabel> {
        self.grid.chord_label(bar)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.playback.cursor()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_running()
    }

    pub fn tempo(&self) -> f32 {
        self.playback.tempo()
    }

    pub fn set_tempo(&mut self, tempo: f32) {
        self.playback.set_tempo(tempo);
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.playback.start(now, &self.grid, &mut self.sink);
    }

    /// Advance one bar right away, as if the step timer had fired.
    pub fn tick(&mut self) -> Option<usize> {
        self.playback.tick(&self.grid, &mut self.sink)
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    /// The host's session timer ran out. Same as [`Sequencer::stop`].
    pub fn session_expired(&mut self) {
        debug!("session expired");
        self.stop();
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Drive the step timer and the sink's own bookkeeping.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        let ticked = self.playback.poll(now, &self.grid, &mut self.sink);
        self.sink.poll(now);
        ticked
    }

    /// All bar labels on one line, e.g. `1: C Major | 2: - | 3: A Minor`.
    pub fn progression(&self) -> String {
        (0..self.grid.bars())
            .map(|bar| match self.grid.chord_label(bar) {
                Some(label) => format!("{}: {}", bar + 1, label),
                None => format!("{}: -", bar + 1),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
