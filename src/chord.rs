//! Chord classification for a bar's active notes.
//!
//! Only major and minor triads are named. The match is an exact comparison of
//! pitch-class sets, so voicing and inversion never change the result, and any
//! extra pitch class (sevenths, added tones) falls through to
//! [`ChordLabel::Complex`].

use crate::pitch::{pitch_class, NOTE_NAMES, SEMITONES};
use std::fmt;

const MAJOR: [u8; 3] = [0, 4, 7];
const MINOR: [u8; 3] = [0, 3, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordLabel {
    Major(u8),
    Minor(u8),
    /// Three or more pitch classes that are not a major or minor triad.
    Complex,
    /// At least three notes but fewer than three distinct pitch classes.
    Unknown,
}

impl ChordLabel {
    pub fn root(&self) -> Option<u8> {
        match self {
            ChordLabel::Major(root) | ChordLabel::Minor(root) => Some(*root),
            ChordLabel::Complex | ChordLabel::Unknown => None,
        }
    }

    pub fn is_triad(&self) -> bool {
        self.root().is_some()
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordLabel::Major(root) => write!(f, "{} Major", NOTE_NAMES[*root as usize]),
            ChordLabel::Minor(root) => write!(f, "{} Minor", NOTE_NAMES[*root as usize]),
            ChordLabel::Complex => f.write_str("Complex/Inversion"),
            ChordLabel::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Pitch-class set as a 12-bit mask, bit `n` set for pitch class `n`.
fn class_mask(classes: impl IntoIterator<Item = u8>) -> u16 {
    classes
        .into_iter()
        .fold(0u16, |mask, pc| mask | 1 << (pc % SEMITONES))
}

fn triad_mask(root: u8, intervals: &[u8; 3]) -> u16 {
    class_mask(intervals.iter().map(|i| root + i))
}

/// Classify a set of grid pitch indices.
///
/// Returns `None` when fewer than three notes are given. Roots are tried in
/// ascending order with major before minor, so the result is deterministic for
/// any input.
pub fn classify<I>(notes: I) -> Option<ChordLabel>
where
    I: IntoIterator<Item = u8>,
{
    let mut count = 0usize;
    let mask = class_mask(notes.into_iter().inspect(|_| count += 1).map(pitch_class));

    if count < 3 {
        return None;
    }
    if mask.count_ones() < 3 {
        return Some(ChordLabel::Unknown);
    }

    for root in 0..SEMITONES {
        if mask == triad_mask(root, &MAJOR) {
            return Some(ChordLabel::Major(root));
        }
        if mask == triad_mask(root, &MINOR) {
            return Some(ChordLabel::Minor(root));
        }
    }

    Some(ChordLabel::Complex)
}
