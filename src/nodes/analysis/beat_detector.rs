//! Beat detector node

use tracing::warn;

use super::beat_tracker::BeatTracker;
use crate::context::{AudioContext, UnitCommand};
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::{PinId, PinType, Pins};
use crate::unit::UnitSpec;

pub const NAME: &str = "BeatDetector (Audio)";

const BUCKETS: usize = 1024;

/// Counts beats and estimates the tempo of whatever runs through it.
pub struct BeatDetector {
    pins: Pins,
    audio: AudioCore,
    counter_out: PinId,
    bpm_out: PinId,
    spectrum: Vec<f32>,
    tracker: Option<BeatTracker>,
}

impl BeatDetector {
    pub fn new() -> Self {
        let mut pins = Pins::new();
        let counter_out = pins.add_output("Beat Counter", vec![0.0.into()], PinType::Value);
        let bpm_out = pins.add_output("BPM", vec![0.0.into()], PinType::Value);

        Self {
            pins,
            audio: AudioCore::new(),
            counter_out,
            bpm_out,
            spectrum: vec![f32::NEG_INFINITY; BUCKETS],
            tracker: None,
        }
    }

    pub fn tracker(&self) -> Option<&BeatTracker> {
        self.tracker.as_ref()
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for BeatDetector {
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
        self.audio.initialize(ctx, &UnitSpec::Analyser, &mut self.pins)?;
        let Some(unit) = self.audio.unit_id() else {
            return Ok(());
        };

        let configured = ctx
            .send(unit, UnitCommand::SetFftSize(BUCKETS * 2))
            .and_then(|()| ctx.send(unit, UnitCommand::SetSmoothing(0.0)));
        if configured.is_err() {
            // the node is not added, so nothing else will release the unit
            self.audio.release(ctx);
        }
        configured
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        self.audio.sync_connections(ctx, &mut self.pins, links);

        if let Some(unit) = self.audio.unit_id() {
            match ctx.float_frequency_data(unit, &mut self.spectrum) {
                Ok(()) => {
                    let tracker = self.tracker.get_or_insert_with(BeatTracker::new);
                    tracker.update(&self.spectrum, ctx.current_time());
                    let (beats, bpm) = (tracker.beat_counter(), tracker.bpm());
                    self.pins[self.counter_out].set_value(0, beats as f64);
                    self.pins[self.bpm_out].set_value(0, bpm);
                }
                Err(e) => warn!(unit = unit.index(), error = %e, "failed to read spectrum"),
            }
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
