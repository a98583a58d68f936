//! Spectrum analyser
//!
//! Audio passes through untouched while the most recent `fft_size` samples
//! are kept. Reading frequency data windows them (Blackman), transforms
//! them, smooths the magnitudes over time and converts to dB.

use std::sync::Arc;

use dasp_graph::Buffer;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{silence, BlockContext, ParamValues, Refusal, Render};

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

pub struct AnalyserUnit {
    fft_size: usize,
    smoothing: f32,
    /// Ring of the last `fft_size` input samples
    history: Vec<f32>,
    write: usize,
    smoothed: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    frame: Vec<Complex<f32>>,
}

impl AnalyserUnit {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            history: vec![0.0; DEFAULT_FFT_SIZE],
            write: 0,
            smoothed: vec![0.0; DEFAULT_FFT_SIZE / 2],
            fft: planner.plan_fft_forward(DEFAULT_FFT_SIZE),
            frame: vec![Complex::new(0.0, 0.0); DEFAULT_FFT_SIZE],
        }
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    #[inline]
    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_fft_size(&mut self, size: usize) -> Result<(), Refusal> {
        if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
            return Err(Refusal::InvalidState("fft size must be a power of two in 32..=32768"));
        }
        if size == self.fft_size {
            return Ok(());
        }

        let old = self.fft_size;
        let mut history = vec![0.0; size];
        let keep = old.min(size);
        for i in 0..keep {
            // newest samples land at the end of the new ring
            history[size - keep + i] = self.history[(self.write + old - keep + i) % old];
        }

        self.fft_size = size;
        self.history = history;
        self.write = 0;
        self.smoothed = vec![0.0; size / 2];
        self.fft = FftPlanner::new().plan_fft_forward(size);
        self.frame = vec![Complex::new(0.0, 0.0); size];
        Ok(())
    }

    pub fn set_smoothing(&mut self, smoothing: f32) -> Result<(), Refusal> {
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(Refusal::InvalidState("smoothing must be within 0..=1"));
        }
        self.smoothing = smoothing;
        Ok(())
    }

    /// Compute the current spectrum in dB into `out`.
    ///
    /// Slots past the bin count are set to negative infinity.
    pub fn frequency_data(&mut self, out: &mut [f32]) {
        let n = self.fft_size;
        for (i, slot) in self.frame.iter_mut().enumerate() {
            let sample = self.history[(self.write + i) % n];
            *slot = Complex::new(sample * blackman(i, n), 0.0);
        }
        self.fft.process(&mut self.frame);

        let tau = self.smoothing;
        let scale = 1.0 / n as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.frame[k].norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }

        for (k, slot) in out.iter_mut().enumerate() {
            *slot = match self.smoothed.get(k) {
                Some(&m) => 20.0 * m.log10(),
                None => f32::NEG_INFINITY,
            };
        }
    }
}

impl Default for AnalyserUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn blackman(i: usize, n: usize) -> f32 {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let x = core::f32::consts::TAU * i as f32 / n as f32;
    A0 - A1 * x.cos() + A2 * (2.0 * x).cos()
}

impl Render for AnalyserUnit {
    fn render(&mut self, _ctx: &BlockContext, _params: &ParamValues, inputs: &[Buffer], outputs: &mut [Buffer]) {
        let Some(input) = inputs.first() else {
            silence(outputs);
            return;
        };
        for &s in input.iter() {
            self.history[self.write] = s;
            self.write = (self.write + 1) % self.fft_size;
        }
        for output in outputs.iter_mut() {
            output.copy_from_slice(input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_peaks_in_its_bin() {
        let ctx = BlockContext { sample_rate: 48_000, time: 0.0 };
        let mut unit = AnalyserUnit::new();
        unit.set_fft_size(64).unwrap();
        unit.set_smoothing(0.0).unwrap();

        // bin 8 of a 64-point transform
        let mut input = Buffer::SILENT;
        for (i, s) in input.iter_mut().enumerate() {
            *s = (core::f32::consts::TAU * 8.0 * i as f32 / 64.0).sin();
        }
        let mut out = [Buffer::SILENT];
        unit.render(&ctx, &ParamValues::default(), &[input], &mut out);

        let mut spectrum = [0.0; 40];
        unit.frequency_data(&mut spectrum);
        let peak = (0..32).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b])).unwrap();
        assert_eq!(peak, 8);
        assert!(spectrum[32..].iter().all(|v| *v == f32::NEG_INFINITY));
    }

    #[test]
    fn rejects_unsupported_sizes() {
        let mut unit = AnalyserUnit::new();
        assert!(unit.set_fft_size(16).is_err());
        assert!(unit.set_fft_size(1000).is_err());
        assert!(unit.set_smoothing(1.5).is_err());
        assert_eq!(unit.fft_size(), DEFAULT_FFT_SIZE);
    }
}
