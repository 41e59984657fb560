use std::f64::consts::TAU;
use std::fmt;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Q_BUTTERWORTH_F32};

use super::envelope::{Adsr, MasterEnvelope, StopRamp};
use super::params::BellParams;
use super::reverb::FeedbackDelayNetwork;
use crate::error::SynthError;
use crate::policy::BellType;

/// Lowest sample rate the parameter tables are designed for.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Headroom applied to the normalized partial sum.
const OUTPUT_GAIN: f32 = 0.7;

/// One partial: vibrato sine -> low-pass -> envelope.
struct PartialVoice {
    freq_hz: f64,
    phase: f64,
    filter: DirectForm2Transposed<f32>,
    envelope: Adsr,
}

impl PartialVoice {
    fn sample(&mut self, t: f64, params: &BellParams, sample_rate: f64) -> f32 {
        let vibrato = 1.0 + params.vibrato_depth * (TAU * params.vibrato_hz * t).sin();
        self.phase = (self.phase + TAU * self.freq_hz * vibrato / sample_rate) % TAU;
        let tone = self.filter.run(self.phase.sin() as f32);
        tone * self.envelope.level_at(t)
    }
}

/// An ephemeral synthesis instance for a single ring.
///
/// Time-stamped to one start frame on the destination clock with a fixed
/// length, so teardown can be scheduled without measuring the signal. Never
/// reused across rings.
pub struct BellVoice {
    bell: BellType,
    params: BellParams,
    sample_rate: u32,
    start_frame: u64,
    total_frames: u64,
    partials: Vec<PartialVoice>,
    master: MasterEnvelope,
    reverb: FeedbackDelayNetwork,
    volume: f32,
    normalize: f32,
    stop: Option<StopRamp>,
    finished: bool,
}

impl BellVoice {
    pub fn new(
        bell: BellType,
        params: BellParams,
        sample_rate: u32,
        start_frame: u64,
        volume: f32,
    ) -> Result<Self, SynthError> {
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(SynthError::InvalidSampleRate(sample_rate));
        }
        let fs = sample_rate as f32;
        let cutoff = params.lowpass_hz.min(fs * 0.45);
        let coeffs = Coefficients::<f32>::from_params(
            biquad::Type::LowPass,
            fs.hz(),
            cutoff.hz(),
            Q_BUTTERWORTH_F32,
        )
        .map_err(|e| SynthError::Filter(format!("{e:?}")))?;

        let release_s = params.release_s();
        let partials = params
            .partials
            .iter()
            .map(|p| PartialVoice {
                freq_hz: params.fundamental_hz * p.ratio,
                phase: 0.0,
                filter: DirectForm2Transposed::<f32>::new(coeffs),
                envelope: Adsr {
                    peak: p.gain,
                    attack_s: params.attack_s,
                    decay_s: params.decay_s,
                    sustain: p.gain * params.sustain_level,
                    hold_s: params.hold_s,
                    release_s: release_s * p.release_scale,
                },
            })
            .collect();

        let dry_end_s = params.dry_end_s();
        Ok(Self {
            bell,
            params,
            sample_rate,
            start_frame,
            total_frames: (params.duration_s * sample_rate as f64).round() as u64,
            partials,
            master: MasterEnvelope {
                attack_s: params.master_attack_s,
                release_start_s: dry_end_s - params.master_release_s,
                release_end_s: dry_end_s,
            },
            reverb: FeedbackDelayNetwork::new(&params.reverb, sample_rate),
            volume: volume.clamp(0.0, 1.0),
            normalize: OUTPUT_GAIN / params.gain_sum(),
            stop: None,
            finished: false,
        })
    }

    pub fn bell_type(&self) -> BellType {
        self.bell
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Destination frame after which the voice is silent for good.
    pub fn end_frame(&self) -> u64 {
        let natural = self.start_frame + self.total_frames;
        match self.stop {
            Some(ramp) => natural.min(self.start_frame + ramp.end_frame()),
            None => natural,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_frame as f64 / self.sample_rate as f64
    }

    pub fn duration_s(&self) -> f64 {
        self.params.duration_s
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_some()
    }

    /// Fade out over `ramp_frames` starting at destination frame `at_frame`.
    /// A voice stopped before its start never sounds.
    pub fn stop_at(&mut self, at_frame: u64, ramp_frames: u64) {
        if at_frame <= self.start_frame {
            self.finished = true;
            return;
        }
        let local = at_frame - self.start_frame;
        let ramp = StopRamp {
            start_frame: local,
            frames: ramp_frames,
        };
        self.stop = Some(match self.stop {
            Some(existing) if existing.end_frame() <= ramp.end_frame() => existing,
            _ => ramp,
        });
    }

    /// Mix this voice into `out`, whose first sample is destination frame
    /// `block_start`.
    pub fn render_into(&mut self, block_start: u64, out: &mut [f32]) {
        if self.finished {
            return;
        }
        let end = self.end_frame();
        for (i, slot) in out.iter_mut().enumerate() {
            let frame = block_start + i as u64;
            if frame < self.start_frame {
                continue;
            }
            if frame >= end {
                self.finished = true;
                break;
            }
            *slot += self.next_sample(frame - self.start_frame);
        }
    }

    fn next_sample(&mut self, local: u64) -> f32 {
        let sr = self.sample_rate as f64;
        let t = local as f64 / sr;
        let params = &self.params;
        let dry: f32 = self
            .partials
            .iter_mut()
            .map(|p| p.sample(t, params, sr))
            .sum();
        let bus = dry * self.normalize * self.master.level_at(t);
        let wet = self.reverb.process(bus);
        let mix = self.params.reverb.wet_mix;
        let gain = self.stop.map_or(1.0, |ramp| ramp.gain_at(local));
        (bus * (1.0 - mix) + wet * mix) * self.volume * gain
    }
}

impl fmt::Debug for BellVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BellVoice")
            .field("bell", &self.bell)
            .field("sample_rate", &self.sample_rate)
            .field("start_frame", &self.start_frame)
            .field("total_frames", &self.total_frames)
            .field("volume", &self.volume)
            .field("stop", &self.stop)
            .field("finished", &self.finished)
            .finish()
    }
}
