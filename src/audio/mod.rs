/// Tone emission - the port the core plays through, and a cpal-backed synth
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{HarmonyError, Result};

mod voice;

use voice::Voice;

/// Oscillator shape for a tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timbre {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Timbre {
    /// One sample of the waveform at `phase` in `[0, 1)`.
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Timbre::Sine => (phase * std::f32::consts::TAU).sin(),
            Timbre::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
            Timbre::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Timbre::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// A single fire-and-forget tone request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_secs: f32,
    pub timbre: Timbre,
    /// Linear gain in `[0, 1]`.
    pub volume: f32,
}

/// How a class of tones sounds, independent of pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub duration_secs: f32,
    pub timbre: Timbre,
    pub volume: f32,
}

impl ToneSpec {
    pub fn tone(&self, frequency_hz: f32) -> Tone {
        Tone {
            frequency_hz,
            duration_secs: self.duration_secs.max(0.0),
            timbre: self.timbre,
            volume: self.volume.clamp(0.0, 1.0),
        }
    }
}

/// Anything that can sound a tone.
///
/// `emit` never reports failure back to the caller. `poll` lets sinks with
/// time-based bookkeeping (pending note-offs) run on the host loop.
pub trait ToneSink {
    fn emit(&mut self, tone: Tone);

    fn poll(&mut self, _now: Instant) {}
}

impl<T: ToneSink + ?Sized> ToneSink for &mut T {
    fn emit(&mut self, tone: Tone) {
        (**self).emit(tone);
    }

    fn poll(&mut self, now: Instant) {
        (**self).poll(now);
    }
}

impl<T: ToneSink + ?Sized> ToneSink for Box<T> {
    fn emit(&mut self, tone: Tone) {
        (**self).emit(tone);
    }

    fn poll(&mut self, now: Instant) {
        (**self).poll(now);
    }
}

/// Fan a tone out to two sinks.
impl<A: ToneSink, B: ToneSink> ToneSink for (A, B) {
    fn emit(&mut self, tone: Tone) {
        self.0.emit(tone);
        self.1.emit(tone);
    }

    fn poll(&mut self, now: Instant) {
        self.0.poll(now);
        self.1.poll(now);
    }
}

/// Sink that drops every tone.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ToneSink for Silent {
    fn emit(&mut self, _tone: Tone) {}
}

/// Upper bound on simultaneously sounding voices; the oldest is dropped first.
const MAX_VOICES: usize = 32;
const MASTER_GAIN: f32 = 0.5;

enum DeviceState {
    Idle,
    Running(cpal::Stream),
    Unavailable,
}

/// Audio output using cpal.
///
/// The device is opened on first use rather than at construction, so a
/// session without sound never touches the audio host. If opening fails the
/// output goes quiet for the rest of the session.
pub struct SynthOutput {
    device: DeviceState,
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: f32,
}

impl SynthOutput {
    pub fn new() -> Self {
        Self {
            device: DeviceState::Idle,
            voices: Arc::new(Mutex::new(Vec::new())),
            sample_rate: 44_100.0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.device, DeviceState::Running(_))
    }

    /// Open and start the default output stream if it is not running yet.
    pub fn acquire(&mut self) -> Result<()> {
        match self.device {
            DeviceState::Running(_) => return Ok(()),
            DeviceState::Idle | DeviceState::Unavailable => {}
        }

        match Self::setup_audio_stream(Arc::clone(&self.voices)) {
            Ok((stream, sample_rate)) => {
                self.sample_rate = sample_rate;
                self.device = DeviceState::Running(stream);
                Ok(())
            }
            Err(e) => {
                self.device = DeviceState::Unavailable;
                Err(e)
            }
        }
    }

    fn setup_audio_stream(voices: Arc<Mutex<Vec<Voice>>>) -> Result<(cpal::Stream, f32)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(HarmonyError::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut voices = lock_voices(&voices);
                    for frame in data.chunks_mut(channels) {
                        let mut mix = 0.0;
                        for voice in voices.iter_mut() {
                            mix += voice.next_sample();
                        }
                        let value = (mix * MASTER_GAIN).clamp(-1.0, 1.0);
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                    voices.retain(|v| !v.is_finished());
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            )?,
            other => {
                return Err(HarmonyError::UnsupportedSampleFormat(format!("{:?}", other)));
            }
        };

        stream.play()?;
        info!("Audio output started at {} Hz, {} channels", sample_rate, channels);
        Ok((stream, sample_rate))
    }

    pub fn active_voices(&self) -> usize {
        lock_voices(&self.voices).len()
    }
}

impl ToneSink for SynthOutput {
    fn emit(&mut self, tone: Tone) {
        if let DeviceState::Idle = self.device {
            if let Err(e) = self.acquire() {
                warn!("Audio output unavailable, continuing silently: {}", e);
            }
        }
        if !self.is_running() {
            return;
        }

        let voice = Voice::new(tone, self.sample_rate);
        let mut voices = lock_voices(&self.voices);
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(voice);
    }
}

impl Default for SynthOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio callback must never panic, so a poisoned pool is recovered.
fn lock_voices(voices: &Mutex<Vec<Voice>>) -> MutexGuard<'_, Vec<Voice>> {
    voices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
