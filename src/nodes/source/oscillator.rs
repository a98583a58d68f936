//! Oscillator node

use tracing::{debug, warn};

use crate::context::{AudioContext, UnitCommand, UnitId};
use crate::error::Result;
use crate::node::{AudioCore, LinkView, PatchNode};
use crate::pin::{PinId, PinType, Pins, Value};
use crate::unit::{OscillatorType, UnitSpec};

pub const NAME: &str = "Oscillator (Audio)";

/// Whether the oscillator unit has been started.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transport {
    Stopped,
    Running,
}

/// A periodic source with a waveform selector and an on/off switch.
///
/// Start and stop are one-shot controls on the unit, so they fire only when
/// `Enabled` crosses zero, never again while it stays on the same side.
pub struct Oscillator {
    pins: Pins,
    audio: AudioCore,
    type_in: PinId,
    enable_in: PinId,
    transport: Transport,
}

impl Oscillator {
    pub fn new() -> Self {
        let mut pins = Pins::new();
        let type_in = pins.add_input(
            "Type",
            vec![OscillatorType::Sine.as_str().into()],
            PinType::Enum(&OscillatorType::OPTIONS),
        );
        let enable_in = pins.add_input("Enabled", vec![1.0.into()], PinType::Value);

        Self {
            pins,
            audio: AudioCore::new(),
            type_in,
            enable_in,
            transport: Transport::Stopped,
        }
    }

    #[inline]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    fn update_type(&self, ctx: &mut dyn AudioContext, unit: UnitId) {
        let pin = &self.pins[self.type_in];
        if !pin.pin_is_changed() {
            return;
        }

        let requested = pin.get_value(0).and_then(Value::as_text);
        let kind = match requested.map(str::parse::<OscillatorType>) {
            Some(Ok(kind)) => kind,
            _ => {
                warn!(value = ?pin.get_value(0), "unknown oscillator type, using sine");
                OscillatorType::Sine
            }
        };

        if let Err(e) = ctx.send(unit, UnitCommand::SetOscillatorType(kind)) {
            warn!(kind = kind.as_str(), error = %e, "failed to set oscillator type");
        }
    }

    fn update_transport(&mut self, ctx: &mut dyn AudioContext, unit: UnitId) {
        let pin = &self.pins[self.enable_in];
        if !pin.pin_is_changed() {
            return;
        }

        let wanted = match pin.number(0) {
            Some(v) if v > 0.0 => Transport::Running,
            _ => Transport::Stopped,
        };
        if wanted == self.transport {
            return;
        }

        let command = match wanted {
            Transport::Running => UnitCommand::Start,
            Transport::Stopped => UnitCommand::Stop,
        };
        match ctx.send(unit, command) {
            Ok(()) => {
                debug!(unit = unit.index(), ?wanted, "oscillator transport");
                self.transport = wanted;
            }
            Err(e) => warn!(unit = unit.index(), error = %e, "failed to {}", command.name()),
        }
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchNode for Oscillator {
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
        self.audio.initialize(ctx, &UnitSpec::Oscillator, &mut self.pins)
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        if let Some(unit) = self.audio.unit_id() {
            self.update_type(ctx, unit);
            self.update_transport(ctx, unit);
        }

        self.audio.sync_params(ctx, &self.pins);
        self.audio.sync_connections(ctx, &mut self.pins, links);
        self.audio.mark_outputs_changed(&mut self.pins);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}
