//! The seam between patch nodes and the audio backend.
//!
//! Nodes never reach for a global audio context. Every operation that touches
//! the native graph goes through an [`AudioContext`] handed to them by the
//! caller, so the same nodes run against the built-in [`Engine`](crate::Engine)
//! or against a recording fake in tests.

use crate::error::Result;
use crate::unit::{ChannelLayout, OscillatorType, UnitSpec};

/// Handle of a unit inside one backend.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct UnitId(u32);

impl UnitId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Unit-specific controls, applied in the order they are sent.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum UnitCommand {
    /// Start a transport-bearing unit. Not idempotent on most backends.
    Start,
    Stop,
    SetOscillatorType(OscillatorType),
    /// FFT length of an analyser; it reports half as many frequency bins
    SetFftSize(usize),
    /// Time smoothing of analyser magnitudes, 0..=1
    SetSmoothing(f32),
}

impl UnitCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UnitCommand::Start => "start",
            UnitCommand::Stop => "stop",
            UnitCommand::SetOscillatorType(_) => "set oscillator type",
            UnitCommand::SetFftSize(_) => "set fft size",
            UnitCommand::SetSmoothing(_) => "set smoothing",
        }
    }
}

/// Control-rate access to a stateful audio backend.
///
/// All methods are synchronous and called from the single evaluation thread.
pub trait AudioContext {
    /// Create a unit. Unknown or unsupported kinds are an error, never a
    /// silently degraded unit.
    fn create_unit(&mut self, spec: &UnitSpec) -> Result<UnitId>;

    /// Channel counts of a live unit; fixed for its whole life.
    fn channel_layout(&self, unit: UnitId) -> Result<ChannelLayout>;

    /// Add the edge `(from, output) -> (to, input)`. Adding an existing edge
    /// is a no-op.
    fn connect(&mut self, from: UnitId, output: usize, to: UnitId, input: usize) -> Result<()>;

    /// Remove every edge leaving `output` of `unit`.
    fn disconnect(&mut self, unit: UnitId, output: usize) -> Result<()>;

    fn set_param(&mut self, unit: UnitId, name: &str, value: f32) -> Result<()>;

    fn param(&self, unit: UnitId, name: &str) -> Result<f32>;

    fn send(&mut self, unit: UnitId, command: UnitCommand) -> Result<()>;

    /// Copy the current frequency-domain snapshot (dB per bin) of an analyser
    /// into `out`. Slots past the unit's bin count are set to negative
    /// infinity.
    fn float_frequency_data(&mut self, unit: UnitId, out: &mut [f32]) -> Result<()>;

    /// Seconds of audio rendered so far
    fn current_time(&self) -> f64;

    /// Drop a unit and every edge touching it.
    fn release(&mut self, unit: UnitId) -> Result<()>;
}
