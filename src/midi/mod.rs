/// MIDI output using midir
use midir::{MidiOutput, MidiOutputConnection};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::{Tone, ToneSink};
use crate::error::{HarmonyError, Result};
use crate::pitch::frequency_to_midi;

const CLIENT_NAME: &str = "Chordgrid MIDI Output";
const CHANNEL: u8 = 0;

/// Sends tones to an external MIDI device as note on/off pairs.
///
/// Note-offs are kept as deadlines and released from [`ToneSink::poll`], so the
/// device is only ever touched from the host loop. At most one note-off is
/// pending per note: sounding a note again restarts it.
pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    pending_offs: Vec<(Instant, u8)>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            pending_offs: Vec::new(),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| HarmonyError::Midi(format!("Failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(HarmonyError::InvalidPort(port_index))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "chordgrid")
            .map_err(|e| HarmonyError::Midi(format!("Failed to connect: {}", e)))?;

        self.release_all();
        self.connection = Some(connection);
        info!("Connected MIDI output '{}'", name);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<()> {
        self.send(&[0x90 | CHANNEL, note, velocity])
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<()> {
        self.send(&[0x80 | CHANNEL, note, 0])
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message)
                .map_err(|e| HarmonyError::Midi(format!("Failed to send {:02X?}: {}", message, e)))?;
        }
        Ok(())
    }

    /// Send note-off for every sounding note immediately.
    pub fn release_all(&mut self) {
        for (_, note) in std::mem::take(&mut self.pending_offs) {
            if let Err(e) = self.send_note_off(note) {
                warn!("{}", e);
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.release_all();
        self.connection = None;
    }

    pub fn pending_notes(&self) -> usize {
        self.pending_offs.len()
    }

    /// Record the note-off for `tone`. Returns the note and whether an earlier
    /// instance of it was still sounding; that instance's note-off is dropped.
    fn schedule(&mut self, tone: Tone, now: Instant) -> (u8, bool) {
        let note = frequency_to_midi(tone.frequency_hz);
        let hold = Duration::try_from_secs_f32(tone.duration_secs.max(0.0)).unwrap_or(Duration::ZERO);

        let before = self.pending_offs.len();
        self.pending_offs.retain(|&(_, pending)| pending != note);
        let retriggered = self.pending_offs.len() != before;

        self.pending_offs.push((now + hold, note));
        (note, retriggered)
    }
}

/// Velocity for a linear volume; a zero velocity would read as note-off.
fn velocity_of(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 127.0).round().max(1.0) as u8
}

impl ToneSink for MidiOutputDevice {
    fn emit(&mut self, tone: Tone) {
        if !self.is_connected() {
            return;
        }
        let (note, retriggered) = self.schedule(tone, Instant::now());
        if retriggered {
            if let Err(e) = self.send_note_off(note) {
                warn!("{}", e);
            }
        }
        debug!("MIDI note on {} ({:.1} Hz)", note, tone.frequency_hz);
        if let Err(e) = self.send_note_on(note, velocity_of(tone.volume)) {
            warn!("{}", e);
        }
    }

    fn poll(&mut self, now: Instant) {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_offs)
            .into_iter()
            .partition(|(off_at, _)| *off_at <= now);
        self.pending_offs = pending;
        for (_, note) in due {
            if let Err(e) = self.send_note_off(note) {
                warn!("{}", e);
            }
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiOutputDevice {
    fn drop(&mut self) {
        self.release_all();
    }
}
