//! Media element source node

use tracing::{debug, warn};

use crate::context::AudioContext;
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::{PinId, PinType, Pins, Value, UNCONNECTED_AUDIO};
use crate::unit::{MediaElement, UnitSpec};

pub const NAME: &str = "MediaElementSource (Audio)";

/// Plays whatever media element arrives on its `Audio` input.
///
/// There is no unit until the first element shows up. A different element
/// replaces the unit; the same element arriving again changes nothing.
pub struct MediaElementSource {
    pins: Pins,
    audio: AudioCore,
    media_in: PinId,
    output: PinId,
    current: Option<MediaElement>,
}

impl MediaElementSource {
    pub fn new() -> Self {
        let mut pins = Pins::new();
        let media_in = pins.add_input("Audio", Vec::new(), PinType::Media);
        let output = pins.add_output("Output", vec![UNCONNECTED_AUDIO.into()], PinType::Audio);

        let mut audio = AudioCore::new();
        audio.adopt_output(output);

        Self {
            pins,
            audio,
            media_in,
            output,
            current: None,
        }
    }

    /// The element the current unit plays
    pub fn element(&self) -> Option<&MediaElement> {
        self.current.as_ref()
    }

    fn adopt_element(&mut self, ctx: &mut dyn AudioContext) {
        let pin = &self.pins[self.media_in];
        if !pin.pin_is_changed() {
            return;
        }
        let element = pin.get_value(0).and_then(Value::as_media).cloned();

        if let Some(element) = element {
            if self.current.as_ref() != Some(&element) {
                match self.audio.create_unit(ctx, &UnitSpec::MediaElementSource(element.clone())) {
                    Ok(unit) => {
                        debug!(unit = unit.id().index(), element = element.id(), "media element attached");
                        self.current = Some(element);
                        self.audio.invalidate_outputs(&mut self.pins);
                    }
                    Err(e) => warn!(element = element.id(), error = %e, "failed to create media element source"),
                }
            }
        }

        if let Some(unit) = self.audio.unit_id() {
            self.pins[self.output].set_value(0, unit);
        }
    }
}

impl Default for MediaElementSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for MediaElementSource {
    fn name(&self) -> &str {
        NAME
    }

    fn pins(&self) -> &Pins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    fn initialize(&mut self, _ctx: &mut dyn AudioContext) -> Result<()> {
        Ok(())
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        self.adopt_element(ctx);
        self.audio.sync_connections(ctx, &mut self.pins, links);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}
