//! Delay line node

use crate::context::AudioContext;
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::Pins;
use crate::unit::UnitSpec;

pub const NAME: &str = "Delay (Audio)";

/// Longest delay the node's unit is built for, in seconds
pub const MAX_DELAY: f32 = 10.0;

/// Delays its input by `delay Time` seconds.
///
/// Links out of a delay do not constrain evaluation order, so it may close a
/// feedback loop.
pub struct Delay {
    pins: Pins,
    audio: AudioCore,
    max_delay_time: f32,
}

impl Delay {
    pub fn new() -> Self {
        Self {
            pins: Pins::new(),
            audio: AudioCore::new(),
            max_delay_time: MAX_DELAY,
        }
    }

    /// Bound the delay line to `seconds` (builder pattern)
    pub fn with_max_delay(mut self, seconds: f32) -> Self {
        self.max_delay_time = seconds;
        self
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for Delay {
    fn name(&self) -> &str {
        NAME
    }

    fn pins(&self) -> &Pins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    fn delays_output(&self) -> bool {
        true
    }

    fn initialize(&mut self, ctx: &mut dyn AudioContext) -> Result<()> {
        let spec = UnitSpec::Delay {
            max_delay_time: self.max_delay_time,
        };
        self.audio.initialize(ctx, &spec, &mut self.pins)
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
