//! Audio destinations.
//!
//! [`AudioDestination`] is the seam to the audio subsystem: it owns the
//! audio-rendering clock and accepts bell voices. All voices feed the same
//! destination but never touch each other's state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::SynthError;
use crate::policy::BellType;
use crate::synth::BellVoice;

/// Handle of a voice connected to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoiceId(pub u64);

pub trait AudioDestination {
    fn sample_rate(&self) -> u32;

    /// Audio-rendering clock, in seconds.
    fn current_time(&self) -> f64;

    /// False while the device is suspended (e.g. awaiting a user gesture).
    fn is_running(&self) -> bool {
        true
    }

    fn resume(&mut self) -> Result<(), SynthError> {
        Ok(())
    }

    fn connect(&mut self, voice: BellVoice) -> Result<VoiceId, SynthError>;

    /// Fade a voice out over `ramp_s` starting at `at_time`. Returns false
    /// for unknown ids.
    fn stop_voice(&mut self, id: VoiceId, at_time: f64, ramp_s: f64) -> bool;

    /// Release a voice immediately. Returns false for unknown ids.
    fn disconnect(&mut self, id: VoiceId) -> bool;

    fn active_voices(&self) -> usize;
}

impl<D: AudioDestination + ?Sized> AudioDestination for Box<D> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn resume(&mut self) -> Result<(), SynthError> {
        (**self).resume()
    }

    fn connect(&mut self, voice: BellVoice) -> Result<VoiceId, SynthError> {
        (**self).connect(voice)
    }

    fn stop_voice(&mut self, id: VoiceId, at_time: f64, ramp_s: f64) -> bool {
        (**self).stop_voice(id, at_time, ramp_s)
    }

    fn disconnect(&mut self, id: VoiceId) -> bool {
        (**self).disconnect(id)
    }

    fn active_voices(&self) -> usize {
        (**self).active_voices()
    }
}

/// Software mixer. Its clock advances with every frame rendered, and each
/// voice starts on its exact scheduled frame regardless of block size.
#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    frame: u64,
    voices: BTreeMap<VoiceId, BellVoice>,
    next_id: u64,
    max_voices: usize,
}

impl Mixer {
    pub const DEFAULT_MAX_VOICES: usize = 16;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame: 0,
            voices: BTreeMap::new(),
            next_id: 0,
            max_voices: Self::DEFAULT_MAX_VOICES,
        }
    }

    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = max_voices;
        self
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.contains_key(&id)
    }

    /// Overwrite `out` with the next block of mixed audio.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        for voice in self.voices.values_mut() {
            voice.render_into(self.frame, out);
        }
        self.voices.retain(|id, voice| {
            if voice.is_finished() {
                tracing::debug!(voice = id.0, bell = %voice.bell_type(), "voice finished");
            }
            !voice.is_finished()
        });
        self.frame += out.len() as u64;
    }

    /// Render and discard `seconds` of audio in blocks.
    pub fn advance(&mut self, seconds: f64) {
        let mut remaining = (seconds * self.sample_rate as f64).round() as usize;
        let mut block = [0.0f32; 512];
        while remaining > 0 {
            let n = remaining.min(block.len());
            self.render(&mut block[..n]);
            remaining -= n;
        }
    }

    fn frame_at(&self, time: f64) -> u64 {
        (time.max(0.0) * self.sample_rate as f64).round() as u64
    }
}

impl AudioDestination for Mixer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    fn connect(&mut self, voice: BellVoice) -> Result<VoiceId, SynthError> {
        if self.voices.len() >= self.max_voices {
            return Err(SynthError::CapacityExceeded(self.voices.len()));
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.insert(id, voice);
        Ok(id)
    }

    fn stop_voice(&mut self, id: VoiceId, at_time: f64, ramp_s: f64) -> bool {
        let at = self.frame_at(at_time);
        let ramp = (ramp_s * self.sample_rate as f64).round() as u64;
        match self.voices.get_mut(&id) {
            Some(voice) => {
                voice.stop_at(at, ramp);
                true
            }
            None => false,
        }
    }

    fn disconnect(&mut self, id: VoiceId) -> bool {
        self.voices.remove(&id).is_some()
    }

    fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

/// What a [`NullDestination`] remembers about a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceRecord {
    pub id: VoiceId,
    pub bell: BellType,
    pub start_time: f64,
    pub end_time: f64,
    pub stopped_at: Option<f64>,
}

/// Destination that discards audio.
///
/// Its audio clock follows a host [`Clock`], which makes it the fake
/// backend for deterministic tests and accelerated simulations. It can be
/// made unavailable to exercise synthesis-failure handling.
#[derive(Debug)]
pub struct NullDestination<C: Clock> {
    clock: C,
    sample_rate: u32,
    running: bool,
    available: bool,
    voices: BTreeMap<VoiceId, VoiceRecord>,
    history: Vec<VoiceRecord>,
    next_id: u64,
}

impl<C: Clock> NullDestination<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            sample_rate: 44_100,
            running: true,
            available: true,
            voices: BTreeMap::new(),
            history: Vec::new(),
            next_id: 0,
        }
    }

    /// Start suspended; [`AudioDestination::resume`] makes it audible.
    pub fn suspended(clock: C) -> Self {
        Self {
            running: false,
            ..Self::new(clock)
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Every voice ever connected, in connection order.
    pub fn history(&self) -> &[VoiceRecord] {
        &self.history
    }

    pub fn voice(&self, id: VoiceId) -> Option<&VoiceRecord> {
        self.voices.get(&id)
    }
}

impl<C: Clock> AudioDestination for NullDestination<C> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.clock.now_ms() as f64 / 1000.0
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn resume(&mut self) -> Result<(), SynthError> {
        if !self.available {
            return Err(SynthError::DestinationUnavailable(
                "device cannot be resumed".into(),
            ));
        }
        self.running = true;
        Ok(())
    }

    fn connect(&mut self, voice: BellVoice) -> Result<VoiceId, SynthError> {
        if !self.available {
            return Err(SynthError::DestinationUnavailable("no output device".into()));
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        let record = VoiceRecord {
            id,
            bell: voice.bell_type(),
            start_time: voice.start_time(),
            end_time: voice.start_time() + voice.duration_s(),
            stopped_at: None,
        };
        self.voices.insert(id, record);
        self.history.push(record);
        Ok(id)
    }

    fn stop_voice(&mut self, id: VoiceId, at_time: f64, _ramp_s: f64) -> bool {
        match self.voices.get_mut(&id) {
            Some(record) => {
                record.stopped_at = Some(at_time);
                if let Some(h) = self.history.iter_mut().rev().find(|h| h.id == id) {
                    h.stopped_at = Some(at_time);
                }
                true
            }
            None => false,
        }
    }

    fn disconnect(&mut self, id: VoiceId) -> bool {
        self.voices.remove(&id).is_some()
    }

    fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{BellSynthesizer, SynthConfig};

    #[test]
    fn mixer_clock_advances_with_rendering() {
        let mut mixer = Mixer::new(8_000);
        assert_eq!(mixer.current_time(), 0.0);
        mixer.advance(0.5);
        assert_eq!(mixer.frame(), 4_000);
        assert!((mixer.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn voice_starts_on_exact_frame_across_blocks() {
        let synth = BellSynthesizer::new(SynthConfig::default());
        let mut mixer = Mixer::new(8_000);
        // Start in the middle of the second 128-frame block.
        synth.create_voice(BellType::Small, 200.0 / 8_000.0, 1.0, &mut mixer).unwrap();
        let mut first = [0.0f32; 128];
        let mut second = [0.0f32; 128];
        mixer.render(&mut first);
        mixer.render(&mut second);
        assert!(first.iter().all(|&s| s == 0.0));
        assert!(second[..72].iter().all(|&s| s == 0.0));
        assert!(second[72..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn mixer_capacity_is_enforced() {
        let synth = BellSynthesizer::default();
        let mut mixer = Mixer::new(8_000).with_max_voices(1);
        synth.create_voice(BellType::Big, 0.0, 1.0, &mut mixer).unwrap();
        let err = synth.create_voice(BellType::Big, 0.0, 1.0, &mut mixer).unwrap_err();
        assert_eq!(err, SynthError::CapacityExceeded(1));
    }

    #[test]
    fn stopped_voice_is_released_after_ramp() {
        let synth = BellSynthesizer::default();
        let mut mixer = Mixer::new(8_000);
        let id = synth.create_voice(BellType::Big, 0.0, 1.0, &mut mixer).unwrap();
        mixer.advance(1.0);
        assert!(synth.stop(&mut mixer, id));
        let mut block = vec![0.0f32; 800];
        mixer.render(&mut block);
        assert!(block.iter().any(|&s| s != 0.0));
        mixer.render(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
        assert!(!mixer.contains(id));
        assert!(!synth.stop(&mut mixer, id));
    }
}
