//! Spectrum analyser node

use tracing::{debug, warn};

use crate::context::{AudioContext, UnitCommand, UnitId};
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::{PinId, PinType, Pins, Value};
use crate::unit::UnitSpec;

pub const NAME: &str = "AnalyserNode (Audio)";

pub const DEFAULT_BUCKETS: usize = 2048;
/// Bucket count used when the requested one is not supported
pub const FALLBACK_BUCKETS: usize = 32;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

const MIN_BUCKETS: usize = 16;
const MAX_BUCKETS: usize = 16384;

/// Bucket count for a requested `FFTSize` value.
///
/// Powers of two between 16 and 16384 are taken as they are, everything else
/// (missing, fractional, out of range) becomes [`FALLBACK_BUCKETS`].
pub fn bucket_count(requested: Option<f64>) -> usize {
    match requested {
        Some(n) if n.fract() == 0.0 && n >= MIN_BUCKETS as f64 && n <= MAX_BUCKETS as f64 => {
            let n = n as usize;
            if n.is_power_of_two() {
                n
            } else {
                FALLBACK_BUCKETS
            }
        }
        _ => FALLBACK_BUCKETS,
    }
}

/// Passes audio through and publishes its magnitude spectrum, in dB, on `FFT`.
///
/// The output always has exactly as many slices as there are buckets; a new
/// `FFTSize` resizes the read buffer and the pin together before the next
/// read.
pub struct Analyser {
    pins: Pins,
    audio: AudioCore,
    size_in: PinId,
    smoothing_in: PinId,
    fft_out: PinId,
    spectrum: Vec<f32>,
}

impl Analyser {
    pub fn new() -> Self {
        Self::with_fft_size(DEFAULT_BUCKETS)
    }

    /// Start out with `buckets` frequency bins instead of the default
    pub fn with_fft_size(buckets: usize) -> Self {
        let mut pins = Pins::new();
        let size_in = pins.add_input("FFTSize", vec![(buckets as f64).into()], PinType::Value);
        let smoothing_in = pins.add_input("Smoothing", vec![DEFAULT_SMOOTHING.into()], PinType::Value);
        let fft_out = pins.add_output("FFT", Vec::new(), PinType::Value);

        Self {
            pins,
            audio: AudioCore::new(),
            size_in,
            smoothing_in,
            fft_out,
            spectrum: Vec::new(),
        }
    }

    /// Current number of frequency buckets
    pub fn buckets(&self) -> usize {
        self.spectrum.len()
    }

    /// The last spectrum read from the unit
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    fn update_size(&mut self, ctx: &mut dyn AudioContext, unit: UnitId) {
        let pin = &self.pins[self.size_in];
        if !pin.pin_is_changed() {
            return;
        }
        let requested = pin.number(0);
        let buckets = bucket_count(requested);
        if requested != Some(buckets as f64) {
            warn!(?requested, buckets, "unsupported fft size, falling back");
        }
        if buckets == self.spectrum.len() {
            return;
        }

        match ctx.send(unit, UnitCommand::SetFftSize(buckets * 2)) {
            Ok(()) => {
                debug!(unit = unit.index(), buckets, "resized analyser");
                self.spectrum = vec![f32::NEG_INFINITY; buckets];
                self.pins[self.fft_out].set_slice_count(buckets);
            }
            Err(e) => warn!(unit = unit.index(), buckets, error = %e, "failed to resize analyser"),
        }
    }

    fn update_smoothing(&self, ctx: &mut dyn AudioContext, unit: UnitId) {
        let pin = &self.pins[self.smoothing_in];
        if !pin.pin_is_changed() {
            return;
        }
        let smoothing = match pin.number(0) {
            Some(v) if v.is_finite() => (v as f32).clamp(0.0, 1.0),
            other => {
                warn!(value = ?other, "invalid smoothing, using default");
                DEFAULT_SMOOTHING
            }
        };
        if let Err(e) = ctx.send(unit, UnitCommand::SetSmoothing(smoothing)) {
            warn!(unit = unit.index(), smoothing, error = %e, "failed to set smoothing");
        }
    }

    fn read_spectrum(&mut self, ctx: &mut dyn AudioContext, unit: UnitId) {
        if self.spectrum.is_empty() {
            return;
        }
        if let Err(e) = ctx.float_frequency_data(unit, &mut self.spectrum) {
            warn!(unit = unit.index(), error = %e, "failed to read spectrum");
            return;
        }
        let values = self.spectrum.iter().map(|&db| Value::from(db)).collect();
        self.pins[self.fft_out].set_values(values);
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for Analyser {
    fn name(&self) -> &str {
        NAME
    }

    fn pins(&self) -> &Pins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    fn auto_evaluate(&self) -> bool {
        true
    }

    fn initialize(&mut self, ctx: &mut dyn AudioContext) -> Result<()> {
        self.audio.initialize(ctx, &UnitSpec::Analyser, &mut self.pins)
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        if let Some(unit) = self.audio.unit_id() {
            self.update_size(ctx, unit);
            self.update_smoothing(ctx, unit);
        }

        self.audio.sync_params(ctx, &self.pins);
        self.audio.sync_connections(ctx, &mut self.pins, links);

        if let Some(unit) = self.audio.unit_id() {
            self.read_spectrum(ctx, unit);
        }
        self.audio.mark_outputs_changed(&mut self.pins);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_counts() {
        assert_eq!(bucket_count(Some(2048.0)), 2048);
        assert_eq!(bucket_count(Some(16.0)), 16);
        assert_eq!(bucket_count(Some(16384.0)), 16384);
        assert_eq!(bucket_count(Some(1000.0)), FALLBACK_BUCKETS);
        assert_eq!(bucket_count(Some(8.0)), FALLBACK_BUCKETS);
        assert_eq!(bucket_count(Some(32768.0)), FALLBACK_BUCKETS);
        assert_eq!(bucket_count(Some(64.5)), FALLBACK_BUCKETS);
        assert_eq!(bucket_count(Some(f64::NAN)), FALLBACK_BUCKETS);
        assert_eq!(bucket_count(None), FALLBACK_BUCKETS);
    }
}
