//! Gain node

use crate::context::AudioContext;
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::Pins;
use crate::unit::UnitSpec;

pub const NAME: &str = "Gain (Audio)";

/// Scales its input by the `gain` parameter.
pub struct Gain {
    pins: Pins,
    audio: AudioCore,
}

impl Gain {
    pub fn new() -> Self {
        Self {
            pins: Pins::new(),
            audio: AudioCore::new(),
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for Gain {
    fn name(&self) -> &str {
        NAME
    }

    fn pins(&self) -> &Pins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    fn initialize(&mut self, ctx: &mut dyn AudioContext) -> Result<()> {
        self.audio.initialize(ctx, &UnitSpec::Gain, &mut self.pins)
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        self.audio.sync_connections(ctx, &mut self.pins, links);
        self.audio.sync_params(ctx, &self.pins);
        self.audio.mark_outputs_changed(&mut self.pins);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}
