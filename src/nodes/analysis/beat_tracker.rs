//! Tempo estimation from a stream of spectra.
//!
//! Onsets are found with spectral flux against an adaptive threshold. The
//! interval between consecutive onsets votes for a tempo in a decaying
//! histogram, and a beat timer runs at the winning tempo, re-aligning itself
//! whenever an onset lands.

use std::collections::VecDeque;

/// Flux values kept for the adaptive threshold, about one second at 43 fps
const HISTORY_LEN: usize = 43;
const MIN_HISTORY: usize = 8;
const THRESHOLD_STDDEVS: f32 = 1.5;
const FLUX_FLOOR: f32 = 1e-3;
/// Seconds after an onset during which no other onset is accepted
const REFRACTORY: f64 = 0.1;

const MIN_BPM: f64 = 85.0;
const MAX_BPM: f64 = 170.0;
const HISTOGRAM_DECAY: f32 = 0.9;

/// Estimates tempo and counts beats.
#[derive(Clone, Debug)]
pub struct BeatTracker {
    previous: Vec<f32>,
    history: VecDeque<f32>,
    last_onset: Option<f64>,
    /// Votes per tenth of a BPM, starting at `MIN_BPM`
    histogram: Vec<f32>,
    win_bpm_int: u32,
    last_beat: Option<f64>,
    beat_counter: u64,
}

impl BeatTracker {
    pub fn new() -> Self {
        let bins = ((MAX_BPM - MIN_BPM) * 10.0) as usize;
        Self {
            previous: Vec::new(),
            history: VecDeque::with_capacity(HISTORY_LEN + 1),
            last_onset: None,
            histogram: vec![0.0; bins],
            win_bpm_int: 0,
            last_beat: None,
            beat_counter: 0,
        }
    }

    /// Winning tempo in BPM, 0 until two onsets were seen
    pub fn bpm(&self) -> f64 {
        f64::from(self.win_bpm_int) / 10.0
    }

    pub fn beat_counter(&self) -> u64 {
        self.beat_counter
    }

    /// Feed one spectrum (dB per bin) taken at `time` seconds.
    ///
    /// Returns whether a beat was counted.
    pub fn update(&mut self, spectrum_db: &[f32], time: f64) -> bool {
        let onset = self.detect_onset(spectrum_db, time);
        if onset {
            self.vote(time);
        }
        self.advance_beat(onset, time)
    }

    fn detect_onset(&mut self, spectrum_db: &[f32], time: f64) -> bool {
        let current = spectrum_db
            .iter()
            .map(|&db| if db.is_finite() { 10f32.powf(db / 20.0) } else { 0.0 })
            .collect::<Vec<_>>();

        let flux = if self.previous.len() == current.len() && !current.is_empty() {
            let rising: f32 = current
                .iter()
                .zip(&self.previous)
                .map(|(now, before)| (now - before).max(0.0))
                .sum();
            rising / current.len() as f32
        } else {
            0.0
        };
        self.previous = current;

        let mut onset = false;
        if self.history.len() >= MIN_HISTORY {
            let n = self.history.len() as f32;
            let mean = self.history.iter().sum::<f32>() / n;
            let variance = self.history.iter().map(|f| (f - mean).powi(2)).sum::<f32>() / n;
            let threshold = mean + THRESHOLD_STDDEVS * variance.sqrt();
            let rested = self.last_onset.map_or(true, |t| time - t >= REFRACTORY);
            onset = flux > threshold && flux > FLUX_FLOOR && rested;
        }

        self.history.push_back(flux);
        if self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
        onset
    }

    fn vote(&mut self, time: f64) {
        let previous = self.last_onset.replace(time);
        let Some(previous) = previous else {
            return;
        };
        let interval = time - previous;
        if interval <= 0.0 {
            return;
        }

        let mut bpm = 60.0 / interval;
        while bpm < MIN_BPM {
            bpm *= 2.0;
        }
        while bpm >= MAX_BPM {
            bpm /= 2.0;
        }

        let last = self.histogram.len() - 1;
        let bin = (((bpm - MIN_BPM) * 10.0).round() as usize).min(last);
        self.histogram.iter_mut().for_each(|v| *v *= HISTOGRAM_DECAY);
        self.histogram[bin] += 1.0;

        let winner = self
            .histogram
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        self.win_bpm_int = (MIN_BPM * 10.0) as u32 + winner as u32;
    }

    fn advance_beat(&mut self, onset: bool, time: f64) -> bool {
        if self.win_bpm_int == 0 {
            return false;
        }
        let period = 60.0 / self.bpm();

        let mut counted = false;
        if let Some(last) = self.last_beat {
            if time - last >= period {
                self.last_beat = Some(last + period);
                self.beat_counter += 1;
                counted = true;
            }
        }

        if onset {
            // an onset in the second half of the period is the next beat
            // arriving early, in the first half it is the current one late
            let phase = self.last_beat.map_or(1.0, |last| (time - last) / period);
            if phase > 0.5 {
                self.beat_counter += 1;
                counted = true;
            }
            self.last_beat = Some(time);
        }
        counted
    }
}

impl Default for BeatTracker {
    fn default() -> Self {
        Self::new()
    }
}
