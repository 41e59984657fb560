//! Amplitude envelopes.
//!
//! Curves are evaluated analytically at a voice-local time instead of being
//! stepped sample by sample, so a voice can be started (or resumed) at any
//! frame and still follow the exact curve scheduled for it.

use super::params::RAMP_FLOOR;

/// Exponential ramp from `from` to `to`, `progress` in 0..=1.
fn exp_ramp(from: f32, to: f32, progress: f64) -> f32 {
    let from = from.max(RAMP_FLOOR);
    let to = to.max(RAMP_FLOOR);
    from * (to / from).powf(progress.clamp(0.0, 1.0) as f32)
}

/// Attack -> exponential decay -> sustain -> long exponential release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub peak: f32,
    pub attack_s: f64,
    pub decay_s: f64,
    /// Absolute sustain level (already scaled by `peak`).
    pub sustain: f32,
    pub hold_s: f64,
    pub release_s: f64,
}

impl Adsr {
    pub fn level_at(&self, t: f64) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        if t < self.attack_s {
            return self.peak * (t / self.attack_s) as f32;
        }
        let t = t - self.attack_s;
        if t < self.decay_s {
            return exp_ramp(self.peak, self.sustain, t / self.decay_s);
        }
        let t = t - self.decay_s;
        if t < self.hold_s {
            return self.sustain;
        }
        let t = t - self.hold_s;
        if t < self.release_s {
            return exp_ramp(self.sustain, self.peak * RAMP_FLOOR, t / self.release_s);
        }
        0.0
    }

    pub fn end_s(&self) -> f64 {
        self.attack_s + self.decay_s + self.hold_s + self.release_s
    }
}

/// Master bus envelope: short linear attack, flat, exponential release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterEnvelope {
    pub attack_s: f64,
    pub release_start_s: f64,
    pub release_end_s: f64,
}

impl MasterEnvelope {
    pub fn level_at(&self, t: f64) -> f32 {
        if t < 0.0 || t >= self.release_end_s {
            0.0
        } else if t < self.attack_s {
            (t / self.attack_s) as f32
        } else if t < self.release_start_s {
            1.0
        } else {
            let span = self.release_end_s - self.release_start_s;
            exp_ramp(1.0, RAMP_FLOOR, (t - self.release_start_s) / span)
        }
    }
}

/// Linear fade to silence used when a voice is stopped early.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRamp {
    /// Voice-local frame at which the fade begins.
    pub start_frame: u64,
    pub frames: u64,
}

impl StopRamp {
    pub fn gain_at(&self, frame: u64) -> f32 {
        if frame < self.start_frame {
            1.0
        } else if self.frames == 0 {
            0.0
        } else {
            let done = (frame - self.start_frame) as f32 / self.frames as f32;
            (1.0 - done).max(0.0)
        }
    }

    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adsr() -> Adsr {
        Adsr {
            peak: 0.5,
            attack_s: 0.01,
            decay_s: 1.0,
            sustain: 0.2,
            hold_s: 1.0,
            release_s: 10.0,
        }
    }

    #[test]
    fn adsr_phases() {
        let env = adsr();
        assert_eq!(env.level_at(-1.0), 0.0);
        assert!((env.level_at(0.005) - 0.25).abs() < 1e-4);
        assert!((env.level_at(0.01) - 0.5).abs() < 1e-4);
        let mid_decay = env.level_at(0.51);
        assert!(mid_decay < 0.5 && mid_decay > 0.2);
        assert!((env.level_at(1.5) - 0.2).abs() < 1e-6);
        assert!(env.level_at(2.01 + 5.0) < 0.2);
        assert!(env.level_at(env.end_s() - 1e-6) < 1e-3);
        assert_eq!(env.level_at(env.end_s() + 0.1), 0.0);
    }

    #[test]
    fn release_is_monotonic() {
        let env = adsr();
        let mut last = f32::MAX;
        for i in 0..100 {
            let level = env.level_at(2.01 + i as f64 * 0.1);
            assert!(level <= last);
            last = level;
        }
    }

    #[test]
    fn master_envelope() {
        let env = MasterEnvelope {
            attack_s: 0.01,
            release_start_s: 5.0,
            release_end_s: 10.0,
        };
        assert_eq!(env.level_at(1.0), 1.0);
        assert!(env.level_at(7.5) < 0.05);
        assert_eq!(env.level_at(10.0), 0.0);
    }

    #[test]
    fn stop_ramp_fades_linearly() {
        let ramp = StopRamp {
            start_frame: 100,
            frames: 100,
        };
        assert_eq!(ramp.gain_at(50), 1.0);
        assert!((ramp.gain_at(150) - 0.5).abs() < 1e-6);
        assert_eq!(ramp.gain_at(200), 0.0);
        assert_eq!(ramp.end_frame(), 200);
    }
}
