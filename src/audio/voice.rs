use super::{Timbre, Tone};

/// Attack length in seconds; keeps note starts click-free.
const ATTACK_SECS: f32 = 0.01;

/// One sounding tone inside the synth's voice pool.
#[derive(Debug, Clone)]
pub(crate) struct Voice {
    timbre: Timbre,
    phase: f32,
    phase_increment: f32,
    volume: f32,
    attack_samples: u32,
    total_samples: u32,
    position: u32,
}

impl Voice {
    pub(crate) fn new(tone: Tone, sample_rate: f32) -> Self {
        let total_samples = (tone.duration_secs * sample_rate).max(1.0) as u32;
        let attack_samples = ((ATTACK_SECS * sample_rate) as u32).clamp(1, total_samples);
        Self {
            timbre: tone.timbre,
            phase: 0.0,
            phase_increment: tone.frequency_hz / sample_rate,
            volume: tone.volume,
            attack_samples,
            total_samples,
            position: 0,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.position >= self.total_samples
    }

    /// Linear attack then a linear fade to silence at the end of the tone.
    fn envelope(&self) -> f32 {
        if self.position < self.attack_samples {
            self.position as f32 / self.attack_samples as f32
        } else {
            let release = self.total_samples - self.attack_samples;
            if release == 0 {
                return 0.0;
            }
            1.0 - (self.position - self.attack_samples) as f32 / release as f32
        }
    }

    pub(crate) fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let sample = self.timbre.sample(self.phase) * self.volume * self.envelope();
        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.position += 1;
        sample
    }
}
