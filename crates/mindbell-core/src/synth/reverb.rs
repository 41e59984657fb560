//! Three-line feedback delay network.
//!
//! Line lengths follow [`DELAY_RATIOS`] (1 : 1.41 : 1.73) so their echoes
//! rarely coincide. Lines are cross-coupled through a Householder matrix,
//! which is orthogonal: with `feedback < 1` the network always decays.

use std::collections::VecDeque;

use super::params::{ReverbParams, DELAY_RATIOS};

#[derive(Debug, Clone)]
struct DelayLine {
    buffer: VecDeque<f32>,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: VecDeque::from(vec![0.0; len.max(1)]),
        }
    }

    fn read(&self) -> f32 {
        self.buffer[0]
    }

    fn advance(&mut self, input: f32) {
        self.buffer.pop_front();
        self.buffer.push_back(input);
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackDelayNetwork {
    lines: [DelayLine; 3],
    feedback: f32,
}

impl FeedbackDelayNetwork {
    pub fn new(params: &ReverbParams, sample_rate: u32) -> Self {
        let base = params.base_delay_ms * sample_rate as f64 / 1000.0;
        let line = |ratio: f64| DelayLine::new((base * ratio).round() as usize);
        Self {
            lines: [
                line(DELAY_RATIOS[0]),
                line(DELAY_RATIOS[1]),
                line(DELAY_RATIOS[2]),
            ],
            feedback: params.feedback,
        }
    }

    /// Delay line lengths in samples.
    pub fn line_lengths(&self) -> [usize; 3] {
        [self.lines[0].len(), self.lines[1].len(), self.lines[2].len()]
    }

    /// Feed one dry sample, return one wet sample.
    pub fn process(&mut self, input: f32) -> f32 {
        let outs = [self.lines[0].read(), self.lines[1].read(), self.lines[2].read()];
        let sum: f32 = outs.iter().sum();
        let mix = sum * (2.0 / 3.0);
        for (line, out) in self.lines.iter_mut().zip(outs) {
            line.advance(input + self.feedback * (mix - out));
        }
        sum / 3.0
    }
}
