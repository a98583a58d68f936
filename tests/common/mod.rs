#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use audiopatch::{
    AudioContext, ChannelLayout, Error, LinkId, NodeId, Patch, Result, UnitCommand, UnitId, UnitKind, UnitSpec,
};

/// A backend call, as seen by [`RecordingContext`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create(UnitKind),
    Connect { from: UnitId, output: usize, to: UnitId, input: usize },
    Disconnect { unit: UnitId, output: usize },
    SetParam { unit: UnitId, name: String, value: f32 },
    Send { unit: UnitId, command: UnitCommand },
    Read { unit: UnitId, len: usize },
    Release(UnitId),
}

impl Call {
    /// Whether the call changes the native edge set
    pub fn is_rewire(&self) -> bool {
        matches!(self, Call::Connect { .. } | Call::Disconnect { .. })
    }
}

struct FakeUnit {
    kind: UnitKind,
    layout: ChannelLayout,
    params: HashMap<&'static str, f32>,
    bins: usize,
    released: bool,
}

/// An in-memory backend that records every call.
///
/// Analysers report `level_db` in each of their bins.
pub struct RecordingContext {
    units: Vec<FakeUnit>,
    edges: BTreeSet<(UnitId, usize, UnitId, usize)>,
    pub calls: Vec<Call>,
    /// Kinds `create_unit` refuses
    pub refuse: Vec<UnitKind>,
    pub fail_connect: bool,
    /// Refuse every `send`
    pub fail_send: bool,
    /// Report no channel layout for any unit
    pub fail_layout: bool,
    pub time: f64,
    pub level_db: f32,
}

/// Route `tracing` output to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

impl RecordingContext {
    pub fn new() -> Self {
        init_tracing();
        Self {
            units: Vec::new(),
            edges: BTreeSet::new(),
            calls: Vec::new(),
            refuse: Vec::new(),
            fail_connect: false,
            fail_send: false,
            fail_layout: false,
            time: 0.0,
            level_db: 0.0,
        }
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn edges_from(&self, unit: UnitId, output: usize) -> Vec<(UnitId, usize)> {
        self.edges
            .iter()
            .filter(|(u, o, _, _)| *u == unit && *o == output)
            .map(|&(_, _, to, input)| (to, input))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_released(&self, unit: UnitId) -> bool {
        self.units[unit.index() as usize].released
    }

    pub fn units_of(&self, kind: UnitKind) -> Vec<UnitId> {
        (0..self.units.len())
            .filter(|&i| self.units[i].kind == kind)
            .map(|i| UnitId::new(i as u32))
            .collect()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| f(c)).count()
    }

    fn live(&mut self, unit: UnitId) -> Result<&mut FakeUnit> {
        match self.units.get_mut(unit.index() as usize) {
            Some(u) if !u.released => Ok(u),
            _ => Err(Error::UnknownUnit(unit)),
        }
    }
}

impl AudioContext for RecordingContext {
    fn create_unit(&mut self, spec: &UnitSpec) -> Result<UnitId> {
        let kind = spec.kind();
        if self.refuse.contains(&kind) {
            return Err(Error::UnsupportedKind(kind.name().to_owned()));
        }
        self.calls.push(Call::Create(kind));
        self.units.push(FakeUnit {
            kind,
            layout: spec.channel_layout(),
            params: spec.params().iter().map(|p| (p.name, p.default)).collect(),
            bins: 1024,
            released: false,
        });
        Ok(UnitId::new(self.units.len() as u32 - 1))
    }

    fn channel_layout(&self, unit: UnitId) -> Result<ChannelLayout> {
        if self.fail_layout {
            return Err(Error::UnknownUnit(unit));
        }
        self.units
            .get(unit.index() as usize)
            .map(|u| u.layout)
            .ok_or(Error::UnknownUnit(unit))
    }

    fn connect(&mut self, from: UnitId, output: usize, to: UnitId, input: usize) -> Result<()> {
        let outputs = self.live(from)?.layout.outputs;
        let inputs = self.live(to)?.layout.inputs;
        if output >= outputs {
            return Err(Error::OutputOutOfRange { unit: from, index: output, count: outputs });
        }
        if input >= inputs {
            return Err(Error::InputOutOfRange { unit: to, index: input, count: inputs });
        }
        if self.fail_connect {
            return Err(Error::UnsupportedCommand { kind: UnitKind::Gain, command: "connect" });
        }
        self.calls.push(Call::Connect { from, output, to, input });
        self.edges.insert((from, output, to, input));
        Ok(())
    }

    fn disconnect(&mut self, unit: UnitId, output: usize) -> Result<()> {
        self.live(unit)?;
        self.calls.push(Call::Disconnect { unit, output });
        self.edges.retain(|(u, o, _, _)| !(*u == unit && *o == output));
        Ok(())
    }

    fn set_param(&mut self, unit: UnitId, name: &str, value: f32) -> Result<()> {
        let slot = self
            .live(unit)?
            .params
            .iter_mut()
            .find(|(n, _)| **n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::UnknownParam { unit, name: name.to_owned() })?;
        *slot = value;
        self.calls.push(Call::SetParam { unit, name: name.to_owned(), value });
        Ok(())
    }

    fn param(&self, unit: UnitId, name: &str) -> Result<f32> {
        self.units
            .get(unit.index() as usize)
            .and_then(|u| u.params.get(name).copied())
            .ok_or_else(|| Error::UnknownParam { unit, name: name.to_owned() })
    }

    fn send(&mut self, unit: UnitId, command: UnitCommand) -> Result<()> {
        let refuse = self.fail_send;
        let fake = self.live(unit)?;
        if refuse {
            return Err(Error::UnsupportedCommand { kind: fake.kind, command: command.name() });
        }
        match (fake.kind, command) {
            (UnitKind::Analyser, UnitCommand::SetFftSize(size)) => fake.bins = size / 2,
            (UnitKind::Analyser, UnitCommand::SetSmoothing(_)) => {}
            (UnitKind::Oscillator, UnitCommand::Start | UnitCommand::Stop | UnitCommand::SetOscillatorType(_)) => {}
            (kind, command) => return Err(Error::UnsupportedCommand { kind, command: command.name() }),
        }
        self.calls.push(Call::Send { unit, command });
        Ok(())
    }

    fn float_frequency_data(&mut self, unit: UnitId, out: &mut [f32]) -> Result<()> {
        let level = self.level_db;
        let fake = self.live(unit)?;
        if fake.kind != UnitKind::Analyser {
            return Err(Error::UnsupportedCommand { kind: fake.kind, command: "read frequency data" });
        }
        let bins = fake.bins;
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = if k < bins { level } else { f32::NEG_INFINITY };
        }
        self.calls.push(Call::Read { unit, len: out.len() });
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn release(&mut self, unit: UnitId) -> Result<()> {
        self.live(unit)?.released = true;
        self.edges.retain(|(from, _, to, _)| *from != unit && *to != unit);
        self.calls.push(Call::Release(unit));
        Ok(())
    }
}

/// Link two pins by name
pub fn link(patch: &mut Patch, from: NodeId, output: &str, to: NodeId, input: &str) -> LinkId {
    let a = patch.find_output(from, output).expect("no such output");
    let b = patch.find_input(to, input).expect("no such input");
    patch.connect(from, a, to, b).expect("link refused")
}

/// Write slice 0 of an input pin by name
pub fn set(patch: &mut Patch, node: NodeId, input: &str, value: impl Into<audiopatch::Value>) {
    let pin = patch.find_input(node, input).expect("no such input");
    patch.set_input(node, pin, value).expect("cannot set input");
}

/// The unit currently owned by a node
pub fn unit_of(patch: &Patch, node: NodeId) -> UnitId {
    patch
        .node(node)
        .and_then(|n| n.audio())
        .and_then(|a| a.unit_id())
        .expect("node has no unit")
}

pub fn output_numbers(patch: &Patch, node: NodeId, output: &str) -> Vec<f64> {
    let pin = patch.find_output(node, output).expect("no such output");
    patch
        .pin(node, pin)
        .map(|p| p.values().iter().filter_map(|v| v.as_number()).collect())
        .unwrap_or_default()
}
