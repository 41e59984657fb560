//! Additive bell synthesizer.
//!
//! A bell is four sine partials (each with vibrato, a warming low-pass and
//! its own envelope) summed into a master bus. The bus gets an overall
//! envelope and feeds a three-line feedback delay network whose wet output is
//! mixed back with the dry signal.

mod envelope;
mod params;
mod reverb;
mod voice;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioDestination, VoiceId};
use crate::error::SynthError;
use crate::policy::BellType;

pub use envelope::{Adsr, MasterEnvelope, StopRamp};
pub use params::{BellParams, Partial, ReverbParams, DELAY_RATIOS, RAMP_FLOOR, REVERB_TAIL_S};
pub use reverb::FeedbackDelayNetwork;
pub use voice::{BellVoice, MIN_SAMPLE_RATE};

/// Synthesizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Sample rate for offline rendering.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Fade applied by [`BellSynthesizer::stop`].
    #[serde(default = "default_stop_ramp_ms")]
    pub stop_ramp_ms: u64,
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_stop_ramp_ms() -> u64 {
    100
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            stop_ramp_ms: default_stop_ramp_ms(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BellSynthesizer {
    config: SynthConfig,
}

impl BellSynthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Fixed sound length of a bell type, in seconds.
    pub fn duration_s(&self, bell: BellType) -> f64 {
        BellParams::for_bell(bell).duration_s
    }

    /// Build a voice starting at `start_time` (seconds on a clock running at
    /// `sample_rate`).
    pub fn build_voice(
        &self,
        bell: BellType,
        start_time: f64,
        sample_rate: u32,
        volume: f32,
    ) -> Result<BellVoice, SynthError> {
        let start_frame = (start_time.max(0.0) * sample_rate as f64).round() as u64;
        BellVoice::new(bell, BellParams::for_bell(bell), sample_rate, start_frame, volume)
    }

    /// Build a voice and connect it to `destination`. A start time already in
    /// the past is moved up to the destination's current time.
    pub fn create_voice<D: AudioDestination + ?Sized>(
        &self,
        bell: BellType,
        start_time: f64,
        volume: f32,
        destination: &mut D,
    ) -> Result<VoiceId, SynthError> {
        let start = start_time.max(destination.current_time());
        let voice = self.build_voice(bell, start, destination.sample_rate(), volume)?;
        destination.connect(voice)
    }

    /// Ramp a connected voice to silence over the configured stop ramp.
    pub fn stop<D: AudioDestination + ?Sized>(&self, destination: &mut D, id: VoiceId) -> bool {
        let now = destination.current_time();
        destination.stop_voice(id, now, self.config.stop_ramp_ms as f64 / 1000.0)
    }

    /// Render one complete ring without a destination, e.g. for caching.
    pub fn render_offline(&self, bell: BellType) -> Result<Vec<f32>, SynthError> {
        let mut voice = self.build_voice(bell, 0.0, self.config.sample_rate, 1.0)?;
        let mut buffer = vec![0.0f32; voice.total_frames() as usize];
        voice.render_into(0, &mut buffer);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn offline_render_length_and_decay() {
        let synth = BellSynthesizer::new(SynthConfig {
            sample_rate: 8_000,
            stop_ramp_ms: 100,
        });
        for bell in [BellType::Big, BellType::Small] {
            let buf = synth.render_offline(bell).unwrap();
            let expected = (synth.duration_s(bell) * 8_000.0) as usize;
            assert_eq!(buf.len(), expected);

            let head = rms(&buf[..8_000]);
            let tail = rms(&buf[buf.len() - 800..]);
            assert!(head > 0.05, "{bell}: head rms {head}");
            assert!(tail < 1e-4, "{bell}: tail rms {tail}");
            assert!(buf.iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn big_and_small_differ() {
        let synth = BellSynthesizer::new(SynthConfig {
            sample_rate: 8_000,
            stop_ramp_ms: 100,
        });
        let big = synth.build_voice(BellType::Big, 1.0, 8_000, 1.0).unwrap();
        let small = synth.build_voice(BellType::Small, 1.0, 8_000, 1.0).unwrap();
        assert_eq!(big.start_frame(), 8_000);
        assert!(big.total_frames() > small.total_frames());
    }
}
