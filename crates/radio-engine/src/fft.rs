//! FFT analysis node fed from a PCM ring buffer.
//!
//! Produces the same byte-scaled frequency data a browser analyser does:
//! Blackman window, magnitude normalized by the window length, temporal
//! smoothing, then a linear map of `[MIN_DB, MAX_DB]` onto `0..=255`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::media::FrequencySource;

pub const MIN_DB: f32 = -100.0;
pub const MAX_DB: f32 = -30.0;
pub const TIME_SMOOTHING: f32 = 0.8;

/// Mono PCM samples shared between a decoder and the analyser.
#[derive(Clone)]
pub struct PcmRing {
    inner: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl PcmRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push_samples(&self, samples: &[f32]) {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for &s in samples {
            if buf.len() == self.capacity {
                buf.pop_front();
            }
            buf.push_back(s);
        }
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the newest `out.len()` samples into `out`, zero-filling the
    /// front when fewer are buffered.
    pub fn latest(&self, out: &mut [f32]) {
        let buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let n = out.len().min(buf.len());
        let pad = out.len() - n;
        out[..pad].fill(0.0);
        for (dst, src) in out[pad..].iter_mut().zip(buf.iter().skip(buf.len() - n)) {
            *dst = *src;
        }
    }
}

pub struct FftAnalyser {
    fft_size: usize,
    ring: PcmRing,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl FftAnalyser {
    /// `fft_size` must be a power of two.
    pub fn new(fft_size: usize, ring: PcmRing) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        Self {
            fft_size,
            ring,
            fft,
            window: blackman(fft_size),
            frame: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn ring(&self) -> &PcmRing {
        &self.ring
    }
}

impl FrequencySource for FftAnalyser {
    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.ring.latest(&mut self.frame);
        for ((c, &s), &w) in self.spectrum.iter_mut().zip(&self.frame).zip(&self.window) {
            *c = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let scale = 1.0 / self.fft_size as f32;
        let range = MAX_DB - MIN_DB;
        for (k, byte) in out.iter_mut().take(self.smoothed.len()).enumerate() {
            let magnitude = self.spectrum[k].norm() * scale;
            let value = TIME_SMOOTHING * self.smoothed[k] + (1.0 - TIME_SMOOTHING) * magnitude;
            self.smoothed[k] = if value.is_finite() { value } else { 0.0 };

            *byte = if self.smoothed[k] <= 0.0 {
                0
            } else {
                let db = 20.0 * self.smoothed[k].log10();
                (255.0 * (db - MIN_DB) / range).clamp(0.0, 255.0) as u8
            };
        }
    }
}

fn blackman(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42f32, 0.5f32, 0.08f32);
    let n_f = n as f32;
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n_f;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
