/// Chordgrid - a harmony grid with live chord feedback
///
/// This library provides the core of a bar-by-bar harmony toy:
/// - Pitch model mapping grid indices to names and frequencies
/// - Chord classification of each bar's notes (major/minor triads)
/// - Grid state with a voice ceiling and optional locked bass notes
/// - Playback engine that loops the bars at a fixed tempo
/// - Tone output through cpal or an external MIDI device

pub mod audio;
pub mod chord;
pub mod config;
pub mod error;
pub mod midi;
pub mod pitch;
pub mod sequencer;

// Re-export commonly used types
pub use audio::{Silent, SynthOutput, Timbre, Tone, ToneSink, ToneSpec};
pub use chord::{classify, ChordLabel};
pub use config::{Config, ToneSettings};
pub use error::{HarmonyError, Result};
pub use midi::MidiOutputDevice;
pub use pitch::{NoteName, PitchRange};
pub use sequencer::grid::{Grid, GridConfig, NoteSet, ToggleOutcome};
pub use sequencer::playback::{PlaybackEngine, PlaybackState};
pub use sequencer::Sequencer;
