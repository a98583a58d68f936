//! Patch - owns nodes and links, drives evaluation ticks
//!
//! This is the scheduler side of the protocol in its smallest useful form:
//! it keeps the declarative link graph, legalizes new links, evaluates nodes
//! in dependency order and copies changed output values along links.

use hashbrown::HashMap;
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, trace, trace_span};

use crate::context::AudioContext;
use crate::error::{Error, Result};
use crate::node::{AudioCore, LinkTarget, LinkView, NodeId, PatchNode};
use crate::nodes;
use crate::pin::{Pin, PinDirection, PinId, PinType, Value};

/// Identifier of a link within a patch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LinkId(u32);

/// A directed link from an output pin to an input pin.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub from_pin: PinId,
    pub to: NodeId,
    pub to_pin: PinId,
}

/// A dataflow patch: nodes, the links between their pins, and the tick loop.
///
/// # Example
///
/// ```
/// use audiopatch::{Engine, Patch};
/// use audiopatch::nodes::{AudioDestination, Oscillator};
///
/// let mut engine = Engine::new(48_000);
/// let mut patch = Patch::new();
///
/// let osc = patch.add(&mut engine, Oscillator::new()).unwrap();
/// let out = patch.add(&mut engine, AudioDestination::new()).unwrap();
///
/// let from = patch.find_output(osc, "Output 1").unwrap();
/// let to = patch.find_input(out, "Input 1").unwrap();
/// patch.connect(osc, from, out, to).unwrap();
///
/// patch.tick(&mut engine);
/// engine.render();
/// ```
#[derive(Default)]
pub struct Patch {
    nodes: HashMap<NodeId, Box<dyn PatchNode>>,
    links: Vec<Link>,
    /// Evaluation order, kept topologically sorted
    order: Vec<NodeId>,
    next_node_id: u32,
    next_link_id: u32,
    ticks: u64,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a node and add it to the patch.
    ///
    /// A node that cannot build its unit is not added; the error is returned.
    pub fn add_node(&mut self, ctx: &mut dyn AudioContext, mut node: Box<dyn PatchNode>) -> Result<NodeId> {
        node.initialize(ctx)?;

        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        debug!(node = id.0, name = node.name(), "added node");

        self.nodes.insert(id, node);
        // a node without links can go anywhere in the order
        self.order.push(id);
        Ok(id)
    }

    pub fn add<N: PatchNode + 'static>(&mut self, ctx: &mut dyn AudioContext, node: N) -> Result<NodeId> {
        self.add_node(ctx, Box::new(node))
    }

    /// Add a node by its registry name, e.g. `Oscillator (Audio)`.
    pub fn add_node_by_name(&mut self, ctx: &mut dyn AudioContext, name: &str) -> Result<NodeId> {
        let node = nodes::create(name)?;
        self.add_node(ctx, node)
    }

    /// Remove a node, its links and its native unit.
    pub fn remove_node(&mut self, ctx: &mut dyn AudioContext, id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return Err(Error::UnknownNode(id));
        }

        let touching = self
            .links
            .iter()
            .filter(|l| l.from == id || l.to == id)
            .map(|l| l.id)
            .collect_vec();
        for link in touching {
            self.disconnect(link)?;
        }

        if let Some(mut node) = self.nodes.remove(&id) {
            node.dispose(ctx);
            debug!(node = id.0, name = node.name(), "removed node");
        }
        self.order.retain(|&n| n != id);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn PatchNode> {
        self.nodes.get(&id).map(|n| &**n)
    }

    pub fn pin(&self, node: NodeId, pin: PinId) -> Option<&Pin> {
        self.nodes.get(&node).and_then(|n| n.pins().get(pin))
    }

    pub fn find_input(&self, node: NodeId, name: &str) -> Option<PinId> {
        self.nodes.get(&node).and_then(|n| n.pins().input(name))
    }

    pub fn find_output(&self, node: NodeId, name: &str) -> Option<PinId> {
        self.nodes.get(&node).and_then(|n| n.pins().output(name))
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in evaluation order
    pub fn evaluation_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Link an output pin to an input pin.
    ///
    /// Value and media inputs hold a single link, so linking into an occupied
    /// one replaces the old link. Audio inputs sum any number of links.
    pub fn connect(&mut self, from: NodeId, from_pin: PinId, to: NodeId, to_pin: PinId) -> Result<LinkId> {
        let source = self
            .pin(from, from_pin)
            .ok_or(Error::UnknownPin { node: from, pin: from_pin })?;
        let target = self.pin(to, to_pin).ok_or(Error::UnknownPin { node: to, pin: to_pin })?;

        let illegal = |reason| Error::IllegalLink {
            from: source.to_string(),
            to: target.to_string(),
            reason,
        };
        if source.direction() != PinDirection::Output {
            return Err(illegal("source is not an output"));
        }
        if target.direction() != PinDirection::Input {
            return Err(illegal("target is not an input"));
        }
        if !target.pin_type().accepts(&source.pin_type()) {
            return Err(illegal("pin types are incompatible"));
        }
        let single_link = target.pin_type() != PinType::Audio;
        let values = source.values().to_vec();

        if let Some(existing) = self
            .links
            .iter()
            .find(|l| l.from == from && l.from_pin == from_pin && l.to == to && l.to_pin == to_pin)
        {
            return Ok(existing.id);
        }

        let replaced = if single_link {
            self.links.iter().find(|l| l.to == to && l.to_pin == to_pin).map(|l| l.id)
        } else {
            None
        };

        let id = LinkId(self.next_link_id);
        let link = Link { id, from, from_pin, to, to_pin };
        let mut candidate = self
            .links
            .iter()
            .filter(|l| Some(l.id) != replaced)
            .copied()
            .collect_vec();
        candidate.push(link);
        let order = self.sort(&candidate)?;

        if let Some(old) = replaced {
            self.disconnect(old)?;
        }
        self.next_link_id += 1;
        self.links.push(link);
        self.order = order;

        if let Some(pin) = self.pin_mut(from, from_pin) {
            pin.invalidate_links();
        }
        if let Some(pin) = self.pin_mut(to, to_pin) {
            pin.set_values(values);
        }

        debug!(link = id.0, from = from.0, to = to.0, "linked");
        Ok(id)
    }

    /// Remove a link. An input left without links goes back to its defaults.
    pub fn disconnect(&mut self, link: LinkId) -> Result<()> {
        let pos = self
            .links
            .iter()
            .position(|l| l.id == link)
            .ok_or(Error::UnknownLink(link))?;
        let link = self.links.remove(pos);

        if let Some(pin) = self.pin_mut(link.from, link.from_pin) {
            pin.invalidate_links();
        }
        let still_linked = self.links.iter().any(|l| l.to == link.to && l.to_pin == link.to_pin);
        if !still_linked {
            if let Some(pin) = self.pin_mut(link.to, link.to_pin) {
                pin.reset();
            }
        }

        debug!(link = link.id.0, from = link.from.0, to = link.to.0, "unlinked");
        Ok(())
    }

    /// Write a single value into slice 0 of an input pin.
    pub fn set_input(&mut self, node: NodeId, pin: PinId, value: impl Into<Value>) -> Result<()> {
        self.set_input_values(node, pin, vec![value.into()])
    }

    pub fn set_input_values(&mut self, node: NodeId, pin: PinId, values: Vec<Value>) -> Result<()> {
        let target = self.pin_mut(node, pin).ok_or(Error::UnknownPin { node, pin })?;
        target.set_values(values);
        Ok(())
    }

    /// Run one evaluation pass over the patch.
    ///
    /// A node is evaluated when it auto-evaluates, an input changed, or one of
    /// its audio outputs still needs rewiring.
    pub fn tick(&mut self, ctx: &mut dyn AudioContext) {
        let span = trace_span!("tick", n = self.ticks);
        let _enter = span.enter();

        for i in 0..self.order.len() {
            let id = self.order[i];
            let links = self.link_view(id);
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };

            let pins = node.pins();
            if !(node.auto_evaluate() || pins.has_changed_inputs() || pins.has_dirty_links()) {
                continue;
            }

            let unit_before = node.audio().and_then(AudioCore::unit_id);
            trace!(node = id.0, name = node.name(), "evaluate");
            node.evaluate(ctx, &links);
            node.pins_mut().consume_changes(PinDirection::Input);
            let unit_after = node.audio().and_then(AudioCore::unit_id);

            if unit_before != unit_after {
                self.invalidate_links_into(id);
            }
            self.propagate(id);
        }

        self.ticks += 1;
    }

    fn pin_mut(&mut self, node: NodeId, pin: PinId) -> Option<&mut Pin> {
        self.nodes.get_mut(&node).and_then(|n| n.pins_mut().get_mut(pin))
    }

    /// Topological order over `links`, ignoring links out of delaying nodes.
    fn sort(&self, links: &[Link]) -> Result<Vec<NodeId>> {
        let mut graph = DiGraphMap::<NodeId, ()>::new();
        for &id in self.nodes.keys().sorted() {
            graph.add_node(id);
        }
        for link in links {
            let delays = self.nodes.get(&link.from).map_or(false, |n| n.delays_output());
            if !delays {
                graph.add_edge(link.from, link.to, ());
            }
        }
        toposort(&graph, None).map_err(|cycle| Error::Cycle(cycle.node_id()))
    }

    fn link_view(&self, id: NodeId) -> LinkView {
        let mut view = LinkView::new();
        for link in self.links.iter().filter(|l| l.from == id) {
            let audio = self.nodes.get(&link.to).and_then(|n| n.audio());
            view.push(
                link.from_pin,
                LinkTarget {
                    node: link.to,
                    pin: link.to_pin,
                    unit: audio.and_then(AudioCore::unit_id),
                    input_index: audio.and_then(|a| a.input_index(link.to_pin)),
                },
            );
        }
        view
    }

    /// Copy changed outputs of `id` into the inputs they are linked to.
    fn propagate(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let updates = self
            .links
            .iter()
            .filter(|l| l.from == id)
            .filter_map(|l| {
                let pin = node.pins().get(l.from_pin)?;
                pin.pin_is_changed().then(|| (l.to, l.to_pin, pin.values().to_vec()))
            })
            .collect_vec();

        for (to, to_pin, values) in updates {
            if let Some(pin) = self.pin_mut(to, to_pin) {
                pin.set_values(values);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.pins_mut().consume_changes(PinDirection::Output);
        }
    }

    /// The unit behind `id` changed, so every edge into it is stale.
    fn invalidate_links_into(&mut self, id: NodeId) {
        let sources = self
            .links
            .iter()
            .filter(|l| l.to == id)
            .map(|l| (l.from, l.from_pin))
            .collect_vec();
        for (node, pin) in sources {
            if let Some(pin) = self.pin_mut(node, pin) {
                pin.invalidate_links();
            }
        }
    }
}
