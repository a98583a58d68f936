//! Built-in audio backend.
//!
//! A small block-based renderer implementing [`AudioContext`]. Units live in a
//! petgraph `StableGraph` whose edges carry `(output, input)` routes; every
//! [`render`](Engine::render) call processes one 64-sample block per unit in
//! topological order and hands the destination's input to an optional ring
//! buffer.
//!
//! A feedback loop through a delay unit renders with one block of latency;
//! loops without one are rendered in creation order with a warning.

use dasp_graph::Buffer;
use hashbrown::HashMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use rtrb::Producer;
use tracing::{debug, trace, warn};

use crate::context::{AudioContext, UnitCommand, UnitId};
use crate::error::{Error, Result};
use crate::unit::{ChannelLayout, UnitKind, UnitSpec};

#[cfg(feature = "cpal_sink")]
pub mod device;
pub mod units;

use units::{BlockContext, ParamValues, Processor, Refusal, Render};

/// Samples per channel in one rendered block
pub const BLOCK_SIZE: usize = Buffer::LEN;

/// Rendering configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Interleaved channels pushed to the output ring buffer; the mono
    /// destination signal is copied to each
    pub channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

struct UnitSlot {
    id: UnitId,
    kind: UnitKind,
    layout: ChannelLayout,
    params: ParamValues,
    processor: Processor,
    inputs: Vec<Buffer>,
    outputs: Vec<Buffer>,
}

/// Edge weight: which output of the source feeds which input of the target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Route {
    output: usize,
    input: usize,
}

/// The built-in backend.
///
/// # Example
///
/// ```
/// use audiopatch::{AudioContext, Engine, UnitCommand, UnitSpec};
///
/// let mut engine = Engine::new(48_000);
/// let osc = engine.create_unit(&UnitSpec::Oscillator).unwrap();
/// let out = engine.create_unit(&UnitSpec::Destination).unwrap();
/// engine.connect(osc, 0, out, 0).unwrap();
/// engine.send(osc, UnitCommand::Start).unwrap();
///
/// let block = engine.render();
/// assert!(block.iter().any(|s| *s != 0.0));
/// ```
pub struct Engine {
    config: EngineConfig,
    graph: StableGraph<UnitSlot, Route>,
    indices: HashMap<UnitId, NodeIndex>,
    next_unit: u32,
    destination: Option<UnitId>,
    order: Vec<NodeIndex>,
    order_dirty: bool,
    frames: u64,
    output: Option<Producer<f32>>,
    last_block: Buffer,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(EngineConfig {
            sample_rate,
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            graph: StableGraph::with_capacity(64, 64),
            indices: HashMap::new(),
            next_unit: 0,
            destination: None,
            order: Vec::new(),
            order_dirty: false,
            frames: 0,
            output: None,
            last_block: Buffer::SILENT,
        }
    }

    /// Number of interleaved output channels (builder pattern)
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.config.channels = channels.max(1);
        self
    }

    /// Push every rendered block, interleaved, into `producer`
    pub fn with_output(mut self, producer: Producer<f32>) -> Self {
        self.output = Some(producer);
        self
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Units alive in the engine, the destination included
    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Edges leaving `output` of `unit`, as `(target, input)` pairs
    pub fn edges_from(&self, unit: UnitId, output: usize) -> Vec<(UnitId, usize)> {
        let Some(&idx) = self.indices.get(&unit) else {
            return Vec::new();
        };
        let mut edges = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().output == output)
            .map(|e| (self.graph[e.target()].id, e.weight().input))
            .collect::<Vec<_>>();
        edges.sort();
        edges
    }

    pub fn kind(&self, unit: UnitId) -> Option<UnitKind> {
        self.indices.get(&unit).map(|&idx| self.graph[idx].kind)
    }

    /// Whether an oscillator unit is currently started
    pub fn is_running(&self, unit: UnitId) -> bool {
        match self.indices.get(&unit).map(|&idx| &self.graph[idx].processor) {
            Some(Processor::Oscillator(osc)) => osc.is_running(),
            _ => false,
        }
    }

    /// The destination's input from the most recent block
    pub fn last_block(&self) -> &Buffer {
        &self.last_block
    }

    /// Render one block and return what reached the destination.
    pub fn render(&mut self) -> &Buffer {
        if self.order_dirty {
            self.sort();
        }

        let ctx = BlockContext {
            sample_rate: self.config.sample_rate,
            time: self.current_time(),
        };

        for i in 0..self.order.len() {
            let idx = self.order[i];
            self.gather_inputs(idx);
            let slot = &mut self.graph[idx];
            slot.processor.render(&ctx, &slot.params, &slot.inputs, &mut slot.outputs);
        }

        self.last_block = self
            .destination
            .and_then(|id| self.indices.get(&id))
            .and_then(|&idx| self.graph[idx].inputs.first().cloned())
            .unwrap_or(Buffer::SILENT);
        self.push_output();

        self.frames += BLOCK_SIZE as u64;
        &self.last_block
    }

    /// Render `blocks` blocks back to back
    pub fn render_blocks(&mut self, blocks: usize) {
        for _ in 0..blocks {
            self.render();
        }
    }

    fn slot(&self, unit: UnitId) -> Result<&UnitSlot> {
        self.indices
            .get(&unit)
            .map(|&idx| &self.graph[idx])
            .ok_or(Error::UnknownUnit(unit))
    }

    fn slot_mut(&mut self, unit: UnitId) -> Result<&mut UnitSlot> {
        match self.indices.get(&unit) {
            Some(&idx) => Ok(&mut self.graph[idx]),
            None => Err(Error::UnknownUnit(unit)),
        }
    }

    fn index(&self, unit: UnitId) -> Result<NodeIndex> {
        self.indices.get(&unit).copied().ok_or(Error::UnknownUnit(unit))
    }

    /// Sum every edge into the inputs of `idx`.
    fn gather_inputs(&mut self, idx: NodeIndex) {
        let routes = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect::<Vec<_>>();

        let mut inputs = std::mem::take(&mut self.graph[idx].inputs);
        units::silence(&mut inputs);
        for (source, route) in routes {
            let (Some(from), Some(to)) = (self.graph[source].outputs.get(route.output), inputs.get_mut(route.input))
            else {
                continue;
            };
            for (acc, s) in to.iter_mut().zip(from.iter()) {
                *acc += s;
            }
        }
        self.graph[idx].inputs = inputs;
    }

    fn push_output(&mut self) {
        let Some(producer) = self.output.as_mut() else {
            return;
        };
        let channels = self.config.channels;
        if producer.slots() < BLOCK_SIZE * channels {
            trace!("output ring buffer full, dropping block");
            return;
        }
        for &s in self.last_block.iter() {
            for _ in 0..channels {
                let _ = producer.push(s);
            }
        }
    }

    /// Topological order of the units. Only when that fails are edges into
    /// delay units dropped, which turns each loop through a delay into one
    /// block of latency.
    fn sort(&mut self) {
        let order = self.topo_order(false).or_else(|_| self.topo_order(true));
        self.order = match order {
            Ok(order) => order,
            Err(unit) => {
                warn!(unit, "feedback loop without a delay, rendering in creation order");
                self.graph.node_indices().collect()
            }
        };
        self.order_dirty = false;
    }

    fn topo_order(&self, break_at_delays: bool) -> std::result::Result<Vec<NodeIndex>, u32> {
        let mut deps = DiGraphMap::<u32, ()>::new();
        for idx in self.graph.node_indices() {
            deps.add_node(idx.index() as u32);
        }
        for edge in self.graph.edge_references() {
            if break_at_delays && self.graph[edge.target()].kind == UnitKind::Delay {
                continue;
            }
            deps.add_edge(edge.source().index() as u32, edge.target().index() as u32, ());
        }

        toposort(&deps, None)
            .map(|order| order.into_iter().map(|i| NodeIndex::new(i as usize)).collect())
            .map_err(|cycle| cycle.node_id())
    }
}

impl AudioContext for Engine {
    fn create_unit(&mut self, spec: &UnitSpec) -> Result<UnitId> {
        if let (UnitSpec::Destination, Some(existing)) = (spec, self.destination) {
            return Ok(existing);
        }

        let id = UnitId::new(self.next_unit);
        self.next_unit += 1;
        let kind = spec.kind();
        let layout = spec.channel_layout();
        let slot = UnitSlot {
            id,
            kind,
            layout,
            params: ParamValues::new(spec.params()),
            processor: Processor::for_spec(spec, self.config.sample_rate),
            inputs: vec![Buffer::SILENT; layout.inputs],
            outputs: vec![Buffer::SILENT; layout.outputs],
        };

        let idx = self.graph.add_node(slot);
        self.indices.insert(id, idx);
        if kind == UnitKind::Destination {
            self.destination = Some(id);
        }
        self.order_dirty = true;

        debug!(unit = id.index(), %kind, "engine created unit");
        Ok(id)
    }

    fn channel_layout(&self, unit: UnitId) -> Result<ChannelLayout> {
        self.slot(unit).map(|s| s.layout)
    }

    fn connect(&mut self, from: UnitId, output: usize, to: UnitId, input: usize) -> Result<()> {
        let (a, b) = (self.index(from)?, self.index(to)?);
        let outputs = self.graph[a].layout.outputs;
        if output >= outputs {
            return Err(Error::OutputOutOfRange { unit: from, index: output, count: outputs });
        }
        let inputs = self.graph[b].layout.inputs;
        if input >= inputs {
            return Err(Error::InputOutOfRange { unit: to, index: input, count: inputs });
        }

        let route = Route { output, input };
        let exists = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .any(|e| e.target() == b && *e.weight() == route);
        if !exists {
            self.graph.add_edge(a, b, route);
            self.order_dirty = true;
            trace!(from = from.index(), output, to = to.index(), input, "engine connected");
        }
        Ok(())
    }

    fn disconnect(&mut self, unit: UnitId, output: usize) -> Result<()> {
        let idx = self.index(unit)?;
        let outputs = self.graph[idx].layout.outputs;
        if output >= outputs {
            return Err(Error::OutputOutOfRange { unit, index: output, count: outputs });
        }

        let stale = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().output == output)
            .map(|e| e.id())
            .collect::<Vec<_>>();
        for edge in stale {
            self.graph.remove_edge(edge);
        }
        self.order_dirty = true;
        Ok(())
    }

    fn set_param(&mut self, unit: UnitId, name: &str, value: f32) -> Result<()> {
        let slot = self.slot_mut(unit)?;
        if slot.params.set(name, value) {
            Ok(())
        } else {
            Err(Error::UnknownParam { unit, name: name.to_owned() })
        }
    }

    fn param(&self, unit: UnitId, name: &str) -> Result<f32> {
        self.slot(unit)?
            .params
            .raw(name)
            .ok_or_else(|| Error::UnknownParam { unit, name: name.to_owned() })
    }

    fn send(&mut self, unit: UnitId, command: UnitCommand) -> Result<()> {
        let slot = self.slot_mut(unit)?;
        let kind = slot.kind;
        slot.processor.command(command).map_err(|refusal| match refusal {
            Refusal::Unsupported => Error::UnsupportedCommand {
                kind,
                command: command.name(),
            },
            Refusal::InvalidState(reason) => Error::InvalidState {
                unit,
                action: command.name(),
                reason,
            },
        })
    }

    fn float_frequency_data(&mut self, unit: UnitId, out: &mut [f32]) -> Result<()> {
        let slot = self.slot_mut(unit)?;
        match &mut slot.processor {
            Processor::Analyser(analyser) => {
                analyser.frequency_data(out);
                Ok(())
            }
            _ => Err(Error::UnsupportedCommand {
                kind: slot.kind,
                command: "read frequency data",
            }),
        }
    }

    fn current_time(&self) -> f64 {
        self.frames as f64 / f64::from(self.config.sample_rate)
    }

    fn release(&mut self, unit: UnitId) -> Result<()> {
        if self.destination == Some(unit) {
            // shared by every destination node, lives as long as the engine
            return Ok(());
        }
        let idx = self.index(unit)?;
        self.graph.remove_node(idx);
        self.indices.remove(&unit);
        self.order_dirty = true;
        debug!(unit = unit.index(), "engine released unit");
        Ok(())
    }
}
