//! Audio destination node

use crate::context::AudioContext;
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::Pins;
use crate::unit::UnitSpec;

pub const NAME: &str = "AudioDestination (Audio)";

/// The context's output. Every destination node shares the same unit.
pub struct AudioDestination {
    pins: Pins,
    audio: AudioCore,
}

impl AudioDestination {
    pub fn new() -> Self {
        Self {
            pins: Pins::new(),
            audio: AudioCore::new(),
        }
    }
}

impl Default for AudioDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for AudioDestination {
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
        self.audio.initialize(ctx, &UnitSpec::Destination, &mut self.pins)
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        self.audio.sync_connections(ctx, &mut self.pins, links);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}
