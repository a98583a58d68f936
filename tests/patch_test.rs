mod common;

use audiopatch::nodes::{self, Analyser, AudioDestination, Delay, Gain, MediaElementSource, Oscillator};
use audiopatch::{
    AudioContext, AudioCore, Error, LinkView, MediaElement, PatchNode, Patch, PinId, PinType, Pins, Result, UnitKind,
    UnitSpec, Value,
};
use common::{link, set, unit_of, Call, RecordingContext};

#[test]
fn pin_types_are_legalized() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();
    let analyser = patch.add(&mut ctx, Analyser::new()).unwrap();

    let audio_out = patch.find_output(osc, "Output 1").unwrap();
    let audio_in = patch.find_input(gain, "Input 1").unwrap();
    let value_in = patch.find_input(gain, "gain").unwrap();
    let value_out = patch.find_output(analyser, "FFT").unwrap();

    assert!(matches!(patch.connect(osc, audio_out, gain, value_in), Err(Error::IllegalLink { .. })));
    assert!(matches!(patch.connect(analyser, value_out, gain, audio_in), Err(Error::IllegalLink { .. })));
    assert!(matches!(patch.connect(gain, audio_in, osc, audio_out), Err(Error::IllegalLink { .. })));
    assert!(patch.links().is_empty());

    assert!(patch.connect(analyser, value_out, gain, value_in).is_ok());
}

#[test]
fn value_inputs_take_one_link_audio_inputs_many() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let a = patch.add(&mut ctx, Analyser::new()).unwrap();
    let b = patch.add(&mut ctx, Analyser::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();

    link(&mut patch, a, "FFT", gain, "gain");
    link(&mut patch, b, "FFT", gain, "gain");
    assert_eq!(patch.links().len(), 1);
    assert_eq!(patch.links()[0].from, b);

    link(&mut patch, a, "Output 1", gain, "Input 1");
    link(&mut patch, b, "Output 1", gain, "Input 1");
    assert_eq!(patch.links().len(), 3);

    patch.tick(&mut ctx);
    let target = (unit_of(&patch, gain), 0);
    assert_eq!(ctx.edges_from(unit_of(&patch, a), 0), vec![target]);
    assert_eq!(ctx.edges_from(unit_of(&patch, b), 0), vec![target]);
}

#[test]
fn duplicate_links_are_collapsed() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();

    let first = link(&mut patch, osc, "Output 1", gain, "Input 1");
    let second = link(&mut patch, osc, "Output 1", gain, "Input 1");
    assert_eq!(first, second);
    assert_eq!(patch.links().len(), 1);
}

#[test]
fn cycles_need_a_delay() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let a = patch.add(&mut ctx, Gain::new()).unwrap();
    let b = patch.add(&mut ctx, Gain::new()).unwrap();
    let delay = patch.add(&mut ctx, Delay::new()).unwrap();

    link(&mut patch, a, "Output 1", b, "Input 1");
    let back = patch.find_output(b, "Output 1").unwrap();
    let into_a = patch.find_input(a, "Input 1").unwrap();
    assert!(matches!(patch.connect(b, back, a, into_a), Err(Error::Cycle(_))));
    assert_eq!(patch.links().len(), 1);

    link(&mut patch, b, "Output 1", delay, "Input 1");
    link(&mut patch, delay, "Output 1", a, "Input 1");
    patch.tick(&mut ctx);

    assert_eq!(ctx.edges_from(unit_of(&patch, delay), 0), vec![(unit_of(&patch, a), 0)]);
    assert_eq!(ctx.edges_from(unit_of(&patch, b), 0), vec![(unit_of(&patch, delay), 0)]);
}

#[test]
fn evaluation_follows_links() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let out = patch.add(&mut ctx, AudioDestination::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    link(&mut patch, gain, "Output 1", out, "Input 1");
    link(&mut patch, osc, "Output 1", gain, "Input 1");

    let order = patch.evaluation_order();
    let pos = |id| order.iter().position(|&n| n == id).unwrap();
    assert!(pos(osc) < pos(gain));
    assert!(pos(gain) < pos(out));
}

#[test]
fn unlinked_inputs_go_back_to_defaults() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();
    let l = link(&mut patch, osc, "Output 1", gain, "Input 1");

    patch.tick(&mut ctx);
    let input = patch.find_input(gain, "Input 1").unwrap();
    assert_eq!(
        patch.pin(gain, input).unwrap().get_value(0),
        Some(&Value::Unit(unit_of(&patch, osc)))
    );

    patch.disconnect(l).unwrap();
    assert_eq!(
        patch.pin(gain, input).unwrap().get_value(0),
        Some(&Value::from("Unconnected Audio"))
    );
}

#[test]
fn removing_a_node_releases_its_unit() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();
    let out = patch.add(&mut ctx, AudioDestination::new()).unwrap();
    link(&mut patch, osc, "Output 1", gain, "Input 1");
    link(&mut patch, gain, "Output 1", out, "Input 1");
    patch.tick(&mut ctx);

    let (osc_unit, gain_unit) = (unit_of(&patch, osc), unit_of(&patch, gain));
    patch.remove_node(&mut ctx, gain).unwrap();

    assert!(ctx.is_released(gain_unit));
    assert!(ctx.calls.contains(&Call::Disconnect { unit: gain_unit, output: 0 }));
    assert!(patch.links().is_empty());
    assert_eq!(patch.node_count(), 2);
    assert!(!patch.evaluation_order().contains(&gain));

    patch.tick(&mut ctx);
    assert!(ctx.edges_from(osc_unit, 0).is_empty());
    assert_eq!(ctx.edge_count(), 0);

    assert!(matches!(patch.remove_node(&mut ctx, gain), Err(Error::UnknownNode(_))));
}

#[test]
fn media_source_builds_its_unit_lazily() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let media = patch.add(&mut ctx, MediaElementSource::new()).unwrap();
    let gain = patch.add(&mut ctx, Gain::new()).unwrap();
    link(&mut patch, media, "Output", gain, "Input 1");

    patch.tick(&mut ctx);
    assert!(ctx.units_of(UnitKind::MediaElementSource).is_empty());

    let first = MediaElement::new(vec![0.5; 64], 48_000);
    set(&mut patch, media, "Audio", first.clone());
    patch.tick(&mut ctx);

    let units = ctx.units_of(UnitKind::MediaElementSource);
    assert_eq!(units.len(), 1);
    let gain_unit = unit_of(&patch, gain);
    assert_eq!(ctx.edges_from(units[0], 0), vec![(gain_unit, 0)]);
    let output = patch.find_output(media, "Output").unwrap();
    assert_eq!(patch.pin(media, output).unwrap().get_value(0), Some(&Value::Unit(units[0])));

    // the same element again changes nothing
    set(&mut patch, media, "Audio", first);
    patch.tick(&mut ctx);
    assert_eq!(ctx.units_of(UnitKind::MediaElementSource).len(), 1);

    set(&mut patch, media, "Audio", MediaElement::new(vec![0.25; 64], 48_000));
    patch.tick(&mut ctx);

    let units = ctx.units_of(UnitKind::MediaElementSource);
    assert_eq!(units.len(), 2);
    assert!(ctx.is_released(units[0]));
    assert!(ctx.edges_from(units[0], 0).is_empty());
    assert_eq!(ctx.edges_from(units[1], 0), vec![(gain_unit, 0)]);
}

/// A gain whose unit is rebuilt whenever `Rebuild` changes after the first
/// evaluation.
struct Rebuilding {
    pins: Pins,
    audio: AudioCore,
    rebuild: PinId,
    evaluated: bool,
}

impl Rebuilding {
    fn new() -> Self {
        let mut pins = Pins::new();
        let rebuild = pins.add_input("Rebuild", vec![0.0.into()], PinType::Value);
        Self { pins, audio: AudioCore::new(), rebuild, evaluated: false }
    }
}

impl PatchNode for Rebuilding {
    fn name(&self) -> &str {
        "Rebuilding"
    }

    fn pins(&self) -> &Pins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    fn initialize(&mut self, ctx: &mut dyn AudioContext) -> Result<()> {
        self.audio.initialize(ctx, &UnitSpec::Gain, &mut self.pins)
    }

    fn evaluate(&mut self, ctx: &mut dyn AudioContext, links: &LinkView) {
        if self.evaluated && self.pins[self.rebuild].pin_is_changed() {
            self.audio.create_unit(ctx, &UnitSpec::Gain).unwrap();
            self.audio.invalidate_outputs(&mut self.pins);
        }
        self.evaluated = true;
        self.audio.sync_connections(ctx, &mut self.pins, links);
    }

    fn audio(&self) -> Option<&AudioCore> {
        Some(&self.audio)
    }

    fn audio_mut(&mut self) -> Option<&mut AudioCore> {
        Some(&mut self.audio)
    }
}

#[test]
fn replaced_units_are_rewired_from_upstream() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let osc = patch.add(&mut ctx, Oscillator::new()).unwrap();
    let node = patch.add(&mut ctx, Rebuilding::new()).unwrap();
    link(&mut patch, osc, "Output 1", node, "Input 1");

    patch.tick(&mut ctx);
    let old = unit_of(&patch, node);
    let osc_unit = unit_of(&patch, osc);
    assert_eq!(ctx.edges_from(osc_unit, 0), vec![(old, 0)]);

    set(&mut patch, node, "Rebuild", 1.0);
    patch.tick(&mut ctx);
    let new = unit_of(&patch, node);
    assert_ne!(old, new);
    assert!(ctx.is_released(old));

    patch.tick(&mut ctx);
    assert_eq!(ctx.edges_from(osc_unit, 0), vec![(new, 0)]);
}

#[test]
fn registry_builds_every_variant() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    for name in nodes::NODE_NAMES {
        let id = patch.add_node_by_name(&mut ctx, name).unwrap();
        assert_eq!(patch.node(id).unwrap().name(), name);
    }
    assert_eq!(patch.node_count(), nodes::NODE_NAMES.len());

    assert!(matches!(
        patch.add_node_by_name(&mut ctx, "Convolver (Audio)"),
        Err(Error::UnknownNodeType(_))
    ));
}

#[test]
fn refused_units_fail_construction() {
    let mut ctx = RecordingContext::new();
    ctx.refuse.push(UnitKind::Oscillator);
    let mut patch = Patch::new();

    assert!(matches!(patch.add(&mut ctx, Oscillator::new()), Err(Error::UnsupportedKind(_))));
    assert_eq!(patch.node_count(), 0);
}

#[test]
fn failed_setup_releases_the_unit() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();

    ctx.fail_send = true;
    assert!(patch.add_node_by_name(&mut ctx, "BeatDetector (Audio)").is_err());
    let analysers = ctx.units_of(UnitKind::Analyser);
    assert_eq!(analysers.len(), 1);
    assert!(ctx.is_released(analysers[0]));

    ctx.fail_send = false;
    ctx.fail_layout = true;
    assert!(patch.add(&mut ctx, Gain::new()).is_err());
    let gains = ctx.units_of(UnitKind::Gain);
    assert_eq!(gains.len(), 1);
    assert!(ctx.is_released(gains[0]));

    assert_eq!(patch.node_count(), 0);
}

#[test]
fn derived_pins_follow_the_unit() {
    let mut ctx = RecordingContext::new();
    let mut patch = Patch::new();
    let delay = patch.add(&mut ctx, Delay::new()).unwrap();
    let node = patch.node(delay).unwrap();

    let names = node.pins().iter().map(|(_, p)| p.name().to_owned()).collect::<Vec<_>>();
    assert_eq!(names, ["Input 1", "Output 1", "delay Time"]);

    let audio = node.audio().unwrap();
    assert_eq!(audio.audio_inputs().len(), 1);
    assert_eq!(audio.audio_outputs().len(), 1);
    assert_eq!(audio.params()[0].name, "delayTime");
    assert_eq!(audio.unit().unwrap().param("delayTime").unwrap().max, 10.0);
    assert!(node.delays_output());
}
