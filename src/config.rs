/// Configuration - session settings read from TOML
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::audio::{Timbre, ToneSpec};
use crate::error::{HarmonyError, Result};
use crate::pitch::PitchRange;
use crate::sequencer::grid::GridConfig;

/// Session configuration, read from TOML. Every key is optional.
///
/// ```toml
/// tempo_bpm = 90.0
/// bars = 4
/// base_octave = 2
/// octaves = 2
/// max_voices = 4          # 0 = unlimited
/// locked_notes = ["C2", "A2", "F2", "G2"]   # "-" leaves a bar unlocked
/// session_minutes = 5     # 0 = no countdown
///
/// [tones.harmony]
/// duration_secs = 3.0
/// timbre = "triangle"
/// volume = 0.25
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tempo_bpm: f32,
    pub bars: usize,
    pub base_octave: i8,
    pub octaves: u8,
    pub max_voices: usize,
    pub locked_notes: Vec<String>,
    pub session_minutes: u32,
    pub tones: ToneSettings,
}

/// The three kinds of tone the core asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Short, quiet tone when a note is toggled.
    pub preview: ToneSpec,
    /// Sustained tone for each note during playback.
    pub harmony: ToneSpec,
    /// Feedback when the user tries to toggle a locked note.
    pub locked: ToneSpec,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            preview: ToneSpec {
                duration_secs: 0.4,
                timbre: Timbre::Sine,
                volume: 0.15,
            },
            harmony: ToneSpec {
                duration_secs: 3.0,
                timbre: Timbre::Triangle,
                volume: 0.25,
            },
            locked: ToneSpec {
                duration_secs: 0.15,
                timbre: Timbre::Square,
                volume: 0.1,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tempo_bpm: 90.0,
            bars: 4,
            base_octave: 2,
            octaves: 2,
            max_voices: 4,
            locked_notes: ["C2", "A2", "F2", "G2"].map(String::from).to_vec(),
            session_minutes: 5,
            tones: ToneSettings::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn range(&self) -> PitchRange {
        PitchRange::new(self.base_octave, self.octaves)
    }

    pub fn session_duration(&self) -> Option<Duration> {
        (self.session_minutes > 0).then(|| Duration::from_secs(self.session_minutes as u64 * 60))
    }

    /// Reject numbers that would poison the timing arithmetic. TOML accepts
    /// `nan` and `inf`, and neither survives a clamp.
    pub fn validate(&self) -> Result<()> {
        if !self.tempo_bpm.is_finite() {
            return Err(HarmonyError::Config(format!("tempo_bpm must be finite, got {}", self.tempo_bpm)));
        }
        let tones = [
            ("preview", &self.tones.preview),
            ("harmony", &self.tones.harmony),
            ("locked", &self.tones.locked),
        ];
        for (kind, spec) in tones {
            if !spec.duration_secs.is_finite() || !spec.volume.is_finite() {
                return Err(HarmonyError::Config(format!(
                    "tones.{} needs a finite duration_secs and volume",
                    kind
                )));
            }
        }
        Ok(())
    }

    /// Resolve note names and limits into a grid configuration.
    pub fn grid_config(&self) -> Result<GridConfig> {
        self.validate()?;
        let range = self.range();
        let locked_notes = self
            .locked_notes
            .iter()
            .map(|name| match name.trim() {
                "" | "-" => Ok(None),
                name => range.index_of(name).map(Some).ok_or_else(|| {
                    HarmonyError::Config(format!("locked note '{}' is not in the grid range", name))
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GridConfig {
            bars: self.bars,
            range,
            max_voices: (self.max_voices > 0).then_some(self.max_voices),
            locked_notes,
        })
    }
}
