/// Playback engine - bar cursor, step timing and tone triggers
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::grid::Grid;
use crate::audio::{ToneSink, ToneSpec};

pub const MIN_TEMPO: f32 = 40.0;
pub const MAX_TEMPO: f32 = 240.0;
pub const DEFAULT_TEMPO: f32 = 90.0;
const BEATS_PER_BAR: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    /// `next_tick` is the armed deadline for the following bar.
    Playing { cursor: usize, next_tick: Instant },
}

/// Loops over the grid's bars, one bar per step, until stopped.
///
/// The engine owns no thread or timer. The host calls [`PlaybackEngine::poll`]
/// from its event loop and the engine fires a tick whenever the armed deadline
/// has passed. Stopping drops the deadline, so there is nothing to cancel twice.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    state: PlaybackState,
    tempo: f32,
    step_duration: Duration,
    tone: ToneSpec,
}

impl PlaybackEngine {
    pub fn new(tempo: f32, tone: ToneSpec) -> Self {
        let tempo = clamp_tempo(tempo).unwrap_or(DEFAULT_TEMPO);
        Self {
            state: PlaybackState::Stopped,
            tempo,
            step_duration: step_duration_for(tempo),
            tone,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PlaybackState::Playing { .. })
    }

    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            PlaybackState::Playing { cursor, .. } => Some(cursor),
            PlaybackState::Stopped => None,
        }
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Takes effect at the next `start`; a running loop keeps its step length.
    /// A non-finite tempo is ignored.
    pub fn set_tempo(&mut self, tempo: f32) {
        if let Some(tempo) = clamp_tempo(tempo) {
            self.tempo = tempo;
        }
    }

    /// Length of one bar at the tempo playback was (or will be) started with.
    pub fn step_duration(&self) -> Duration {
        self.step_duration
    }

    /// Begin at bar 0, sounding it immediately. No-op while already playing.
    pub fn start<S: ToneSink + ?Sized>(&mut self, now: Instant, grid: &Grid, sink: &mut S) {
        if self.is_running() {
            return;
        }

        self.step_duration = step_duration_for(self.tempo);
        self.state = PlaybackState::Playing {
            cursor: 0,
            next_tick: now + self.step_duration,
        };
        info!(
            "Playback started at {} BPM ({:.2}s per bar)",
            self.tempo,
            self.step_duration.as_secs_f32()
        );
        self.sound_bar(0, grid, sink);
    }

    /// Advance to the next bar and sound it. Returns the new cursor, or `None`
    /// when stopped.
    pub fn tick<S: ToneSink + ?Sized>(&mut self, grid: &Grid, sink: &mut S) -> Option<usize> {
        let PlaybackState::Playing { cursor, next_tick } = self.state else {
            return None;
        };

        let cursor = (cursor + 1) % grid.bars();
        self.state = PlaybackState::Playing { cursor, next_tick };
        self.sound_bar(cursor, grid, sink);
        Some(cursor)
    }

    /// Fire the tick due at `now`, if any. Returns whether a tick fired.
    ///
    /// A late poll fires a single tick; if the host fell more than a whole step
    /// behind, the schedule is re-anchored at `now` instead of catching up.
    pub fn poll<S: ToneSink + ?Sized>(&mut self, now: Instant, grid: &Grid, sink: &mut S) -> bool {
        let PlaybackState::Playing { next_tick, .. } = self.state else {
            return false;
        };
        if now < next_tick {
            return false;
        }

        let mut next = next_tick + self.step_duration;
        if next <= now {
            next = now + self.step_duration;
        }
        self.tick(grid, sink);
        if let PlaybackState::Playing { cursor, .. } = self.state {
            self.state = PlaybackState::Playing {
                cursor,
                next_tick: next,
            };
        }
        true
    }

    /// Time until the next tick, for hosts that sleep between polls.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        match self.state {
            PlaybackState::Playing { next_tick, .. } => {
                Some(next_tick.saturating_duration_since(now))
            }
            PlaybackState::Stopped => None,
        }
    }

    /// Stop and reset the cursor. Returns whether playback was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = PlaybackState::Stopped;
        if was_running {
            info!("Playback stopped");
        }
        was_running
    }

    fn sound_bar<S: ToneSink + ?Sized>(&self, bar: usize, grid: &Grid, sink: &mut S) {
        let range = grid.range();
        let notes = grid.active_notes(bar);
        debug!("bar {}: sounding {} notes", bar, notes.len());
        for note in notes {
            sink.emit(self.tone.tone(range.frequency_of(note)));
        }
    }
}

/// One bar of four beats at `tempo`.
pub fn step_duration_for(tempo: f32) -> Duration {
    let tempo = clamp_tempo(tempo).unwrap_or(DEFAULT_TEMPO);
    Duration::from_secs_f32(60.0 / tempo * BEATS_PER_BAR)
}

fn clamp_tempo(tempo: f32) -> Option<f32> {
    tempo.is_finite().then(|| tempo.clamp(MIN_TEMPO, MAX_TEMPO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Timbre, Tone};
    use crate::sequencer::grid::GridConfig;

    #[derive(Default)]
    struct Recorder(Vec<Tone>);

    impl ToneSink for Recorder {
        fn emit(&mut self, tone: Tone) {
            self.0.push(tone);
        }
    }

    fn harmony() -> ToneSpec {
        ToneSpec {
            duration_secs: 3.0,
            timbre: Timbre::Triangle,
            volume: 0.25,
        }
    }

    fn grid() -> Grid {
        let mut grid = Grid::new(GridConfig::default()).unwrap();
        grid.toggle(0, 0);
        grid.toggle(0, 4);
        grid.toggle(0, 7);
        grid.toggle(2, 9);
        grid
    }

    #[test]
    fn test_step_duration() {
        assert_eq!(step_duration_for(120.0), Duration::from_secs(2));
        assert_eq!(step_duration_for(60.0), Duration::from_secs(4));
    }

    #[test]
    fn test_start_sounds_bar_zero() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        assert_eq!(engine.cursor(), None);

        engine.start(Instant::now(), &grid, &mut sink);
        assert_eq!(engine.cursor(), Some(0));
        assert_eq!(sink.0.len(), 3);
        assert!(sink.0.iter().all(|t| t.timbre == Timbre::Triangle && t.duration_secs == 3.0));
    }

    #[test]
    fn test_ticks_wrap_cursor() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        engine.start(Instant::now(), &grid, &mut sink);
        for n in 1..=9 {
            assert_eq!(engine.tick(&grid, &mut sink), Some(n % 4));
            assert_eq!(engine.cursor(), Some(n % 4));
        }
    }

    #[test]
    fn test_tick_reads_grid_live() {
        let mut grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        engine.start(Instant::now(), &grid, &mut sink);

        grid.toggle(1, 12);
        sink.0.clear();
        engine.tick(&grid, &mut sink);
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].frequency_hz, grid.range().frequency_of(12));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        assert!(!engine.stop());

        engine.start(Instant::now(), &grid, &mut sink);
        assert!(engine.stop());
        assert!(!engine.stop());
        assert_eq!(engine.cursor(), None);

        sink.0.clear();
        assert_eq!(engine.tick(&grid, &mut sink), None);
        assert!(!engine.poll(Instant::now() + Duration::from_secs(60), &grid, &mut sink));
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_poll_follows_deadline() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        let t0 = Instant::now();
        engine.start(t0, &grid, &mut sink);

        assert!(!engine.poll(t0 + Duration::from_millis(1999), &grid, &mut sink));
        assert_eq!(engine.cursor(), Some(0));
        assert!(engine.poll(t0 + Duration::from_secs(2), &grid, &mut sink));
        assert_eq!(engine.cursor(), Some(1));
        assert!(!engine.poll(t0 + Duration::from_millis(3000), &grid, &mut sink));
        assert!(engine.poll(t0 + Duration::from_millis(4100), &grid, &mut sink));
        assert_eq!(engine.cursor(), Some(2));
        // on schedule: next deadline stays at t0 + 6s
        assert_eq!(
            engine.time_until_tick(t0 + Duration::from_secs(5)),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_poll_after_stall_does_not_burst() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        let t0 = Instant::now();
        engine.start(t0, &grid, &mut sink);

        let late = t0 + Duration::from_secs(30);
        assert!(engine.poll(late, &grid, &mut sink));
        assert!(!engine.poll(late, &grid, &mut sink));
        assert_eq!(engine.cursor(), Some(1));
        assert_eq!(engine.time_until_tick(late), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_start_while_playing_is_noop() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        engine.start(Instant::now(), &grid, &mut sink);
        engine.tick(&grid, &mut sink);
        engine.start(Instant::now(), &grid, &mut sink);
        assert_eq!(engine.cursor(), Some(1));
    }

    #[test]
    fn test_tempo_applies_on_next_start() {
        let grid = grid();
        let mut sink = Recorder::default();
        let mut engine = PlaybackEngine::new(120.0, harmony());
        engine.start(Instant::now(), &grid, &mut sink);
        engine.set_tempo(60.0);
        assert_eq!(engine.step_duration(), Duration::from_secs(2));
        engine.stop();
        engine.start(Instant::now(), &grid, &mut sink);
        assert_eq!(engine.step_duration(), Duration::from_secs(4));
    }

    #[test]
    fn test_tempo_is_clamped() {
        let engine = PlaybackEngine::new(1000.0, harmony());
        assert_eq!(engine.tempo(), MAX_TEMPO);
        let engine = PlaybackEngine::new(1.0, harmony());
        assert_eq!(engine.tempo(), MIN_TEMPO);
    }

    #[test]
    fn test_non_finite_tempo() {
        let mut engine = PlaybackEngine::new(f32::NAN, harmony());
        assert_eq!(engine.tempo(), DEFAULT_TEMPO);
        assert_eq!(engine.step_duration(), step_duration_for(DEFAULT_TEMPO));

        engine.set_tempo(120.0);
        engine.set_tempo(f32::INFINITY);
        engine.set_tempo(f32::NAN);
        assert_eq!(engine.tempo(), 120.0);
    }
}
