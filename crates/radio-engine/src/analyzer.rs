//! Spectrum analyzer: smoothed magnitudes for the bar visualization.
//!
//! Only even bins below the midpoint are refreshed; those are the only ones
//! the renderer draws, so the odd and upper half stay at their last value.

use crate::media::FrequencySource;

/// Byte-scale magnitude shown while nothing is playing.
pub const IDLE_LEVEL: u8 = 20;

/// Weight of the previous smoothed value.
pub const SMOOTHING: f32 = 0.8;
/// Weight of the fresh reading.
pub const LIVE_WEIGHT: f32 = 0.2;

/// One analyzer reading: raw byte magnitudes and the smoothed series.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub raw: &'a [u8],
    pub smoothed: &'a [f32],
}

impl Sample<'_> {
    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }
}

/// Constant low-magnitude filler series.
#[derive(Debug, Clone)]
pub struct IdlePattern {
    raw: Vec<u8>,
    smoothed: Vec<f32>,
}

impl IdlePattern {
    pub fn new(bins: usize) -> Self {
        Self {
            raw: vec![IDLE_LEVEL; bins],
            smoothed: vec![f32::from(IDLE_LEVEL); bins],
        }
    }

    pub fn sample(&self) -> Sample<'_> {
        Sample {
            raw: &self.raw,
            smoothed: &self.smoothed,
        }
    }
}

pub struct SpectrumAnalyzer<A> {
    node: A,
    raw: Vec<u8>,
    smoothed: Vec<f32>,
    idle: IdlePattern,
}

impl<A: FrequencySource> SpectrumAnalyzer<A> {
    pub fn new(node: A) -> Self {
        let bins = node.bin_count();
        Self {
            node,
            raw: vec![0; bins],
            smoothed: vec![0.0; bins],
            idle: IdlePattern::new(bins),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.raw.len()
    }

    /// Read the analyser when `active`, otherwise return the idle filler.
    /// The smoothed series is untouched while idle.
    pub fn sample(&mut self, active: bool) -> Sample<'_> {
        if !active {
            return self.idle.sample();
        }

        self.node.byte_frequency_data(&mut self.raw);
        let center = self.raw.len() / 2;
        for i in (0..center).step_by(2) {
            self.smoothed[i] = self.smoothed[i] * SMOOTHING + f32::from(self.raw[i]) * LIVE_WEIGHT;
        }

        Sample {
            raw: &self.raw,
            smoothed: &self.smoothed,
        }
    }
}
