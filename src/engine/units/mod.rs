//! Block processors behind engine units.
//!
//! Each unit kind has one processor. The engine owns the buffers and hands a
//! processor its summed inputs and its outputs for one 64-sample block.

use dasp_graph::Buffer;

use crate::context::UnitCommand;
use crate::unit::{ParamDescriptor, UnitSpec};

pub mod analyser;
pub mod delay;
pub mod destination;
pub mod gain;
pub mod media;
pub mod oscillator;

pub use analyser::AnalyserUnit;
pub use delay::DelayUnit;
pub use destination::DestinationUnit;
pub use gain::GainUnit;
pub use media::MediaUnit;
pub use oscillator::OscillatorUnit;

/// What a processor knows about the block it renders.
#[derive(Clone, Copy, Debug)]
pub struct BlockContext {
    pub sample_rate: u32,
    /// Seconds rendered before this block
    pub time: f64,
}

/// Current values of a unit's parameters, clamped to their ranges.
#[derive(Clone, Debug, Default)]
pub struct ParamValues {
    values: Vec<(ParamDescriptor, f32)>,
}

impl ParamValues {
    pub fn new(params: Vec<ParamDescriptor>) -> Self {
        Self {
            values: params.into_iter().map(|p| (p, p.default)).collect(),
        }
    }

    /// Value of `name`, or 0 for a parameter the unit does not have
    pub fn get(&self, name: &str) -> f32 {
        self.values
            .iter()
            .find(|(p, _)| p.name == name)
            .map_or(0.0, |(p, v)| p.clamp(*v))
    }

    /// Store the raw value. Returns `false` for an unknown parameter.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match self.values.iter_mut().find(|(p, _)| p.name == name) {
            Some((_, v)) => {
                *v = value;
                true
            }
            None => false,
        }
    }

    /// The raw value as last set
    pub fn raw(&self, name: &str) -> Option<f32> {
        self.values.iter().find(|(p, _)| p.name == name).map(|(_, v)| *v)
    }
}

/// Why a processor refused a command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Refusal {
    Unsupported,
    InvalidState(&'static str),
}

#[enum_delegate::implement(Render, pub trait Render { fn render(&mut self, ctx: &BlockContext, params: &ParamValues, inputs: &[Buffer], outputs: &mut [Buffer]); })]
pub enum Processor {
    Oscillator(OscillatorUnit),
    Delay(DelayUnit),
    Gain(GainUnit),
    Analyser(AnalyserUnit),
    Media(MediaUnit),
    Destination(DestinationUnit),
}

/// Renders one block of a unit.
pub trait Render {
    fn render(&mut self, ctx: &BlockContext, params: &ParamValues, inputs: &[Buffer], outputs: &mut [Buffer]);
}

impl Processor {
    pub fn for_spec(spec: &UnitSpec, sample_rate: u32) -> Self {
        match spec {
            UnitSpec::Analyser => Processor::Analyser(AnalyserUnit::new()),
            UnitSpec::MediaElementSource(element) => Processor::Media(MediaUnit::new(element.clone())),
            UnitSpec::Destination => Processor::Destination(DestinationUnit),
            UnitSpec::Oscillator => Processor::Oscillator(OscillatorUnit::new()),
            UnitSpec::Delay { max_delay_time } => Processor::Delay(DelayUnit::new(*max_delay_time, sample_rate)),
            UnitSpec::Gain => Processor::Gain(GainUnit),
        }
    }

    pub fn command(&mut self, command: UnitCommand) -> Result<(), Refusal> {
        match (self, command) {
            (Processor::Oscillator(osc), UnitCommand::Start) => osc.start(),
            (Processor::Oscillator(osc), UnitCommand::Stop) => osc.stop(),
            (Processor::Oscillator(osc), UnitCommand::SetOscillatorType(kind)) => osc.set_type(kind),
            (Processor::Analyser(an), UnitCommand::SetFftSize(size)) => an.set_fft_size(size),
            (Processor::Analyser(an), UnitCommand::SetSmoothing(s)) => an.set_smoothing(s),
            _ => Err(Refusal::Unsupported),
        }
    }
}

/// Write silence into every buffer
pub(crate) fn silence(buffers: &mut [Buffer]) {
    for buffer in buffers.iter_mut() {
        buffer.iter_mut().for_each(|s| *s = 0.0);
    }
}
