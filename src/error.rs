//! Error types for the fallible edges of the crate.
//!
//! The grid, classifier and playback engine are total and never return these.
//! Only configuration loading and device acquisition (audio, MIDI) can fail.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarmonyError {
    /// A configuration value that cannot describe a playable grid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Failed to query audio output config: {0}")]
    AudioConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// MIDI backend failure. midir's error types are generic over the
    /// connection, so they are carried as text.
    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("Invalid MIDI port index {0}")]
    InvalidPort(usize),
}

pub type Result<T> = std::result::Result<T, HarmonyError>;
