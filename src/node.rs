//! Core node trait and the audio state every audio node shares.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::context::{AudioContext, UnitId};
use crate::error::Result;
use crate::factory::{self, AudioUnit};
use crate::pin::{PinId, PinType, Pins, Value, UNCONNECTED_AUDIO};
use crate::unit::UnitSpec;

/// Unique identifier for a node within a [`Patch`](crate::Patch).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Where one link leaving an output pin ends up, resolved for the current tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LinkTarget {
    pub node: NodeId,
    pub pin: PinId,
    /// Live unit of the destination node, if it has one yet
    pub unit: Option<UnitId>,
    /// Position of `pin` among the destination's audio inputs
    pub input_index: Option<usize>,
}

/// The outgoing links of one node, as the scheduler sees them right now.
#[derive(Clone, Debug, Default)]
pub struct LinkView {
    outgoing: HashMap<PinId, Vec<LinkTarget>>,
}

impl LinkView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, from: PinId, target: LinkTarget) {
        self.outgoing.entry(from).or_default().push(target);
    }

    pub fn targets(&self, from: PinId) -> &[LinkTarget] {
        self.outgoing.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A node in a dataflow patch.
///
/// The scheduler calls [`initialize`](Self::initialize) once when the node is
/// added, then [`evaluate`](Self::evaluate) on every tick the node is
/// eligible for. Evaluation never fails outward: problems are logged and the
/// node keeps going with whatever still works.
pub trait PatchNode {
    /// Display name, e.g. `Oscillator (Audio)`
    fn name(&self) -> &str;

    fn pins(&self) -> &Pins;

    fn pins_mut(&mut self) -> &mut Pins;

    /// Evaluate every tick, not only when an input changed.
    fn auto_evaluate(&self) -> bool {
        false
    }

    /// Links leaving this node do not constrain evaluation order.
    fn delays_output(&self) -> bool {
        false
    }

    fn initialize(&mut self, ctx: &mut dyn AudioContext) -> Result<()>;

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView);

    /// Native audio state, for nodes that own a unit.
    fn audio(&self) -> Option<&AudioCore> {
        None
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        None
    }

    /// Release native resources before the node leaves the patch.
    fn dispose(&mut self, ctx: &mut dyn AudioContext) {
        if let Some(audio) = self.audio_mut() {
            audio.release(ctx);
        }
    }
}

/// Binding of a parameter pin to the backend parameter it drives.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParamBinding {
    pub pin: PinId,
    pub name: &'static str,
}

/// A node's native unit plus the pins mirroring its topology.
///
/// Audio pin *i* always corresponds to native channel *i*.
#[derive(Debug, Default)]
pub struct AudioCore {
    unit: Option<AudioUnit>,
    pub(crate) audio_inputs: Vec<PinId>,
    pub(crate) audio_outputs: Vec<PinId>,
    pub(crate) params: Vec<ParamBinding>,
}

impl AudioCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the unit and derive all pins from it.
    pub fn initialize(&mut self, ctx: &mut dyn AudioContext, spec: &UnitSpec, pins: &mut Pins) -> Result<()> {
        self.create_unit(ctx, spec)?;
        self.derive_audio_pins(pins);
        self.derive_param_pins(pins);
        Ok(())
    }

    /// Create the native unit, replacing (and releasing) any previous one.
    ///
    /// The old unit's edges go with it; callers replacing a unit must
    /// [`invalidate_outputs`](Self::invalidate_outputs) so they get rebuilt.
    pub fn create_unit(&mut self, ctx: &mut dyn AudioContext, spec: &UnitSpec) -> Result<&AudioUnit> {
        let unit = factory::create_unit(ctx, spec)?;
        if self.unit.is_some() {
            self.release(ctx);
        }
        Ok(self.unit.insert(unit))
    }

    pub fn unit(&self) -> Option<&AudioUnit> {
        self.unit.as_ref()
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        self.unit.as_ref().map(AudioUnit::id)
    }

    pub fn audio_inputs(&self) -> &[PinId] {
        &self.audio_inputs
    }

    pub fn audio_outputs(&self) -> &[PinId] {
        &self.audio_outputs
    }

    pub fn params(&self) -> &[ParamBinding] {
        &self.params
    }

    /// Position of `pin` among the audio inputs, i.e. its native input index.
    pub fn input_index(&self, pin: PinId) -> Option<usize> {
        self.audio_inputs.iter().position(|&p| p == pin)
    }

    /// One audio input pin per native input, one audio output pin per native
    /// output, in channel order. Output pins publish the unit itself.
    pub fn derive_audio_pins(&mut self, pins: &mut Pins) {
        debug_assert!(
            self.audio_inputs.is_empty() && self.audio_outputs.is_empty(),
            "audio pins derived twice"
        );
        let Some(unit) = &self.unit else {
            warn!("deriving audio pins without a unit");
            return;
        };

        for i in 0..unit.num_inputs() {
            let pin = pins.add_input(format!("Input {}", i + 1), vec![UNCONNECTED_AUDIO.into()], PinType::Audio);
            self.audio_inputs.push(pin);
        }
        for i in 0..unit.num_outputs() {
            let pin = pins.add_output(format!("Output {}", i + 1), vec![Value::Unit(unit.id())], PinType::Audio);
            self.audio_outputs.push(pin);
        }
    }

    /// One value input per unit parameter, starting at the parameter's default.
    pub fn derive_param_pins(&mut self, pins: &mut Pins) {
        debug_assert!(self.params.is_empty(), "parameter pins derived twice");
        let Some(unit) = &self.unit else {
            warn!("deriving parameter pins without a unit");
            return;
        };

        for param in unit.params() {
            let pin = pins.add_input(param.label(), vec![f64::from(param.default).into()], PinType::Value);
            self.params.push(ParamBinding { pin, name: param.name });
        }
    }

    /// Register an audio output that a node declared itself, for nodes whose
    /// unit does not exist at construction time.
    pub fn adopt_output(&mut self, pin: PinId) {
        self.audio_outputs.push(pin);
    }

    /// Input counterpart of [`adopt_output`](Self::adopt_output)
    pub fn adopt_input(&mut self, pin: PinId) {
        self.audio_inputs.push(pin);
    }

    /// Publish the current unit on every audio output and flag them changed,
    /// so downstream nodes re-evaluate.
    pub fn mark_outputs_changed(&self, pins: &mut Pins) {
        let unit = self.unit_id();
        for &id in &self.audio_outputs {
            let pin = &mut pins[id];
            if let Some(unit) = unit {
                pin.set_value(0, unit);
            }
            pin.mark_pin_as_changed();
        }
    }

    /// Flag every audio output for rewiring.
    pub fn invalidate_outputs(&self, pins: &mut Pins) {
        for &id in &self.audio_outputs {
            pins[id].invalidate_links();
        }
    }

    /// Disconnect every native output and drop the unit.
    pub fn release(&mut self, ctx: &mut dyn AudioContext) {
        let Some(unit) = self.unit.take() else {
            return;
        };
        for output in 0..unit.num_outputs() {
            if let Err(e) = ctx.disconnect(unit.id(), output) {
                warn!(unit = unit.id().index(), output, error = %e, "failed to disconnect while releasing unit");
            }
        }
        if let Err(e) = ctx.release(unit.id()) {
            warn!(unit = unit.id().index(), error = %e, "failed to release unit");
        }
        debug!(unit = unit.id().index(), kind = %unit.kind(), "released audio unit");
    }
}
