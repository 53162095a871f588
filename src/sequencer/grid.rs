/// Grid state - per-bar note sets, locked notes and the voice ceiling
use std::collections::BTreeSet;
use tracing::debug;

use crate::chord::{classify, ChordLabel};
use crate::error::{HarmonyError, Result};
use crate::pitch::PitchRange;

/// The active pitch indices of one bar. Iteration is always ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteSet {
    notes: BTreeSet<u8>,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, note: u8) -> bool {
        self.notes.contains(&note)
    }

    pub fn insert(&mut self, note: u8) -> bool {
        self.notes.insert(note)
    }

    pub fn remove(&mut self, note: u8) -> bool {
        self.notes.remove(&note)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.iter().copied()
    }

    pub fn union(&self, other: &NoteSet) -> NoteSet {
        self.notes.union(&other.notes).copied().collect()
    }

    pub fn difference(&self, other: &NoteSet) -> NoteSet {
        self.notes.difference(&other.notes).copied().collect()
    }

    /// Lowest note that is not `keep`.
    fn lowest_except(&self, keep: Option<u8>) -> Option<u8> {
        self.iter().find(|&n| Some(n) != keep)
    }
}

impl FromIterator<u8> for NoteSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self {
            notes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a NoteSet {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter().copied()
    }
}

/// What a toggle did to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added(u8),
    Removed(u8),
    /// The bar was full; `evicted` made room for `added`.
    Replaced { added: u8, evicted: u8 },
    /// The note is locked in this bar; nothing changed.
    Locked(u8),
    /// Out-of-range input in a release build, or nothing could be evicted.
    Ignored,
}

impl ToggleOutcome {
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ToggleOutcome::Added(_) | ToggleOutcome::Removed(_) | ToggleOutcome::Replaced { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub bars: usize,
    pub range: PitchRange,
    /// `None` means no ceiling.
    pub max_voices: Option<usize>,
    /// Locked note per bar; shorter than `bars` leaves the rest unlocked.
    pub locked_notes: Vec<Option<u8>>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bars: 4,
            range: PitchRange::default(),
            max_voices: Some(4),
            locked_notes: Vec::new(),
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.bars == 0 {
            return Err(HarmonyError::Config("bars must be at least 1".into()));
        }
        if self.range.octaves == 0 || self.range.octaves > 10 {
            return Err(HarmonyError::Config(format!(
                "octaves must be between 1 and 10, got {}",
                self.range.octaves
            )));
        }
        if self.range.midi_of(0) < 0 || self.range.midi_of(self.range.total_notes() as u8 - 1) > 127 {
            return Err(HarmonyError::Config(format!(
                "range starting at octave {} leaves the MIDI range",
                self.range.base_octave
            )));
        }
        if self.locked_notes.len() > self.bars {
            return Err(HarmonyError::Config(format!(
                "{} locked notes given for {} bars",
                self.locked_notes.len(),
                self.bars
            )));
        }
        for (bar, locked) in self.locked_notes.iter().enumerate() {
            if let Some(note) = locked {
                if !self.range.contains(*note) {
                    return Err(HarmonyError::Config(format!(
                        "locked note {} in bar {} is outside the range",
                        note,
                        bar + 1
                    )));
                }
            }
        }
        match self.max_voices {
            Some(0) => Err(HarmonyError::Config("max_voices must be at least 1".into())),
            Some(1) if self.locked_notes.iter().any(Option::is_some) => Err(HarmonyError::Config(
                "max_voices must be at least 2 when notes are locked".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// The bar grid. Every bar's chord label is recomputed whenever its note set
/// changes, so `chord_label` never disagrees with `active_notes`.
#[derive(Debug, Clone)]
pub struct Grid {
    range: PitchRange,
    max_voices: Option<usize>,
    locked: Vec<Option<u8>>,
    bars: Vec<NoteSet>,
    labels: Vec<Option<ChordLabel>>,
}

impl Grid {
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate()?;

        let mut locked = config.locked_notes;
        locked.resize(config.bars, None);

        let mut grid = Self {
            range: config.range,
            max_voices: config.max_voices,
            locked,
            bars: vec![NoteSet::new(); config.bars],
            labels: vec![None; config.bars],
        };
        grid.clear();
        Ok(grid)
    }

    pub fn bars(&self) -> usize {
        self.bars.len()
    }

    pub fn range(&self) -> PitchRange {
        self.range
    }

    pub fn max_voices(&self) -> Option<usize> {
        self.max_voices
    }

    pub fn locked_note(&self, bar: usize) -> Option<u8> {
        self.locked[bar]
    }

    pub fn is_locked(&self, bar: usize, note: u8) -> bool {
        self.locked[bar] == Some(note)
    }

    pub fn active_notes(&self, bar: usize) -> &NoteSet {
        &self.bars[bar]
    }

    pub fn chord_label(&self, bar: usize) -> Option<ChordLabel> {
        self.labels[bar]
    }

    /// Add or remove `note` in `bar`.
    ///
    /// Adding to a full bar first evicts the lowest note that is not locked.
    /// `bar` and `note` must be in range: debug builds panic, release builds
    /// return [`ToggleOutcome::Ignored`].
    pub fn toggle(&mut self, bar: usize, note: u8) -> ToggleOutcome {
        debug_assert!(bar < self.bars.len(), "bar {} out of range", bar);
        debug_assert!(self.range.contains(note), "pitch index {} out of range", note);
        if bar >= self.bars.len() || !self.range.contains(note) {
            return ToggleOutcome::Ignored;
        }

        let locked = self.locked[bar];
        if locked == Some(note) {
            return ToggleOutcome::Locked(note);
        }

        let set = &mut self.bars[bar];
        let outcome = if set.remove(note) {
            ToggleOutcome::Removed(note)
        } else if self.max_voices.is_some_and(|max| set.len() >= max) {
            match set.lowest_except(locked) {
                Some(evicted) => {
                    set.remove(evicted);
                    set.insert(note);
                    ToggleOutcome::Replaced {
                        added: note,
                        evicted,
                    }
                }
                None => return ToggleOutcome::Ignored,
            }
        } else {
            set.insert(note);
            ToggleOutcome::Added(note)
        };

        self.labels[bar] = classify(self.bars[bar].iter());
        debug!(
            "bar {} toggle {}: {:?}, label {:?}",
            bar,
            self.range.name_of(note),
            outcome,
            self.labels[bar]
        );
        outcome
    }

    /// Reset every bar to its locked note (or nothing) and drop all labels.
    pub fn clear(&mut self) {
        for (set, locked) in self.bars.iter_mut().zip(&self.locked) {
            *set = locked.iter().copied().collect();
        }
        for label in &mut self.labels {
            *label = None;
        }
    }

    /// The initial contents of a bar: its locked note alone, or empty.
    pub fn initial_notes(&self, bar: usize) -> NoteSet {
        self.locked[bar].iter().copied().collect()
    }
}
