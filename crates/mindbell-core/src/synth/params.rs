//! Bell parameter tables.
//!
//! Big and small bells share one construction algorithm; only these tables
//! differ.

use crate::policy::BellType;

/// Silence after the dry signal ends, left for the reverb to ring out.
pub const REVERB_TAIL_S: f64 = 2.5;

/// Relative level an exponential ramp reaches before being cut to zero
/// (-80 dB).
pub const RAMP_FLOOR: f32 = 1.0e-4;

/// Delay lengths of the three feedback lines relative to the first.
pub const DELAY_RATIOS: [f64; 3] = [1.0, 1.41, 1.73];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    /// Frequency as a multiple of the fundamental.
    pub ratio: f64,
    /// Peak level relative to the strongest partial.
    pub gain: f32,
    /// Fraction of the full release time this partial takes to die away.
    pub release_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub base_delay_ms: f64,
    pub feedback: f32,
    pub wet_mix: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BellParams {
    pub fundamental_hz: f64,
    pub partials: [Partial; 4],
    pub attack_s: f64,
    pub decay_s: f64,
    pub sustain_level: f32,
    pub hold_s: f64,
    pub master_attack_s: f64,
    pub master_release_s: f64,
    pub vibrato_hz: f64,
    /// Peak frequency deviation as a fraction of the partial frequency.
    pub vibrato_depth: f64,
    pub lowpass_hz: f32,
    pub reverb: ReverbParams,
    pub duration_s: f64,
}

impl BellParams {
    pub fn for_bell(bell: BellType) -> Self {
        match bell {
            BellType::Big => Self::big(),
            BellType::Small => Self::small(),
        }
    }

    pub fn big() -> Self {
        Self {
            fundamental_hz: 196.0,
            partials: [
                Partial { ratio: 1.0, gain: 1.0, release_scale: 1.0 },
                Partial { ratio: 2.76, gain: 0.6, release_scale: 0.8 },
                Partial { ratio: 5.40, gain: 0.4, release_scale: 0.55 },
                Partial { ratio: 8.93, gain: 0.25, release_scale: 0.35 },
            ],
            attack_s: 0.008,
            decay_s: 1.8,
            sustain_level: 0.4,
            hold_s: 2.0,
            master_attack_s: 0.004,
            master_release_s: 8.0,
            vibrato_hz: 4.5,
            vibrato_depth: 0.0025,
            lowpass_hz: 3_800.0,
            reverb: ReverbParams {
                base_delay_ms: 37.0,
                feedback: 0.62,
                wet_mix: 0.35,
            },
            duration_s: 47.0,
        }
    }

    pub fn small() -> Self {
        Self {
            fundamental_hz: 523.25,
            partials: [
                Partial { ratio: 1.0, gain: 1.0, release_scale: 1.0 },
                Partial { ratio: 2.0, gain: 0.5, release_scale: 0.75 },
                Partial { ratio: 3.01, gain: 0.3, release_scale: 0.5 },
                Partial { ratio: 4.17, gain: 0.2, release_scale: 0.3 },
            ],
            attack_s: 0.005,
            decay_s: 1.0,
            sustain_level: 0.35,
            hold_s: 1.0,
            master_attack_s: 0.003,
            master_release_s: 5.0,
            vibrato_hz: 4.5,
            vibrato_depth: 0.002,
            lowpass_hz: 6_000.0,
            reverb: ReverbParams {
                base_delay_ms: 29.0,
                feedback: 0.55,
                wet_mix: 0.25,
            },
            duration_s: 32.0,
        }
    }

    /// End of the dry signal; everything after is reverb tail.
    pub fn dry_end_s(&self) -> f64 {
        self.duration_s - REVERB_TAIL_S
    }

    /// Full release time of the strongest partial.
    pub fn release_s(&self) -> f64 {
        self.dry_end_s() - self.attack_s - self.decay_s - self.hold_s
    }

    pub fn gain_sum(&self) -> f32 {
        self.partials.iter().map(|p| p.gain).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_match_bell_types() {
        assert_eq!(BellParams::for_bell(BellType::Big).duration_s, 47.0);
        assert_eq!(BellParams::for_bell(BellType::Small).duration_s, 32.0);
    }

    #[test]
    fn envelope_phases_fit_inside_duration() {
        for p in [BellParams::big(), BellParams::small()] {
            assert!(p.release_s() > 10.0);
            assert!(p.master_release_s < p.dry_end_s());
            assert!(p.reverb.feedback < 1.0);
        }
    }
}
