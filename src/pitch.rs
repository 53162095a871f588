/// Pitch model - maps grid pitch indices to names, octaves and frequencies
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEMITONES: u8 = 12;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch class of a grid index. Index 0 is always a C.
pub fn pitch_class(index: u8) -> u8 {
    index % SEMITONES
}

pub fn midi_to_frequency(midi: f32) -> f32 {
    440.0 * 2.0_f32.powf((midi - 69.0) / 12.0)
}

/// Nearest MIDI note for a frequency, clamped to the MIDI range.
pub fn frequency_to_midi(frequency: f32) -> u8 {
    if frequency <= 0.0 {
        return 0;
    }
    let midi = 69.0 + 12.0 * (frequency / 440.0).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

/// The playable span of the grid: `octaves` full octaves starting at the C of
/// `base_octave`, plus the C on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    pub base_octave: i8,
    pub octaves: u8,
}

impl PitchRange {
    pub fn new(base_octave: i8, octaves: u8) -> Self {
        Self {
            base_octave,
            octaves,
        }
    }

    pub fn total_notes(&self) -> usize {
        SEMITONES as usize * self.octaves as usize + 1
    }

    pub fn contains(&self, index: u8) -> bool {
        (index as usize) < self.total_notes()
    }

    /// MIDI number of index 0 (36 for a C2 base, 48 for C3).
    pub fn base_midi(&self) -> i32 {
        (self.base_octave as i32 + 1) * SEMITONES as i32
    }

    pub fn midi_of(&self, index: u8) -> i32 {
        self.base_midi() + index as i32
    }

    pub fn frequency_of(&self, index: u8) -> f32 {
        midi_to_frequency(self.midi_of(index) as f32)
    }

    pub fn name_of(&self, index: u8) -> NoteName {
        NoteName {
            name: NOTE_NAMES[pitch_class(index) as usize],
            octave: self.base_octave + (index / SEMITONES) as i8,
        }
    }

    /// Parse a note name such as `"F#2"` into an index within this range.
    /// Flats are accepted and spelled as the enharmonic sharp.
    pub fn index_of(&self, note: &str) -> Option<u8> {
        let note = note.trim();
        let mut chars = note.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let natural: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };
        let octave: i32 = octave_str.parse().ok()?;

        let midi = (octave + 1) * SEMITONES as i32 + natural + accidental;
        let index = midi - self.base_midi();
        if index < 0 || index as usize >= self.total_notes() {
            return None;
        }
        Some(index as u8)
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteName {
    pub name: &'static str,
    pub octave: i8,
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}
