//! Pins: the typed, sliced value slots a node exposes to the patch.

use std::fmt;

use delegate::delegate;

use crate::context::UnitId;
use crate::unit::MediaElement;

/// Value carried by the audio pin of an unconnected input.
pub const UNCONNECTED_AUDIO: &str = "Unconnected Audio";

/// One slice of a pin.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    /// An audio unit, as published by an audio output pin
    Unit(UnitId),
    Media(MediaElement),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_unit(&self) -> Option<UnitId> {
        match self {
            Value::Unit(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaElement> {
        match self {
            Value::Media(m) => Some(m),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<UnitId> for Value {
    fn from(v: UnitId) -> Self {
        Value::Unit(v)
    }
}

impl From<MediaElement> for Value {
    fn from(v: MediaElement) -> Self {
        Value::Media(v)
    }
}

/// What a pin carries, used to legalize links.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PinType {
    Value,
    /// Text value restricted to the listed options
    Enum(&'static [&'static str]),
    /// Audio stream; the value is the unit feeding it
    Audio,
    /// Media element handle
    Media,
}

impl PinType {
    /// Whether an output of type `from` may feed an input of this type.
    pub fn accepts(&self, from: &PinType) -> bool {
        match (self, from) {
            (PinType::Audio, PinType::Audio) => true,
            (PinType::Media, PinType::Media) => true,
            (PinType::Value | PinType::Enum(_), PinType::Value | PinType::Enum(_)) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PinType::Value => "Value",
            PinType::Enum(_) => "Enum",
            PinType::Audio => "Audio",
            PinType::Media => "Media",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PinDirection {
    Input,
    Output,
}

/// Whether the native edges of an audio output still match its links.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkState {
    Clean,
    Dirty,
}

/// Index of a pin within its node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PinId(pub(crate) usize);

impl PinId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named slot holding a spread of values.
#[derive(Clone, Debug)]
pub struct Pin {
    name: String,
    direction: PinDirection,
    pin_type: PinType,
    values: Vec<Value>,
    defaults: Vec<Value>,
    changed: bool,
    link_state: LinkState,
}

impl Pin {
    pub fn new(name: impl Into<String>, direction: PinDirection, pin_type: PinType, defaults: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            direction,
            pin_type,
            values: defaults.clone(),
            defaults,
            // fresh pins count as changed so the first evaluation sees them
            changed: true,
            link_state: LinkState::Clean,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PinDirection {
        self.direction
    }

    pub fn pin_type(&self) -> PinType {
        self.pin_type
    }

    pub fn is_audio_output(&self) -> bool {
        self.pin_type == PinType::Audio && self.direction == PinDirection::Output
    }

    /// Slice `index`, wrapping around the spread like the rest of the patch.
    pub fn get_value(&self, index: usize) -> Option<&Value> {
        if self.values.is_empty() {
            None
        } else {
            self.values.get(index % self.values.len())
        }
    }

    pub fn number(&self, index: usize) -> Option<f64> {
        self.get_value(index).and_then(Value::as_number)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn slice_count(&self) -> usize {
        self.values.len()
    }

    /// Write one slice, growing the spread if needed.
    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        if index >= self.values.len() {
            self.values.resize(index + 1, Value::Number(0.0));
        }
        if self.values[index] != value {
            self.values[index] = value;
            self.changed = true;
        }
    }

    pub fn set_values(&mut self, values: Vec<Value>) {
        self.values = values;
        self.changed = true;
    }

    pub fn set_slice_count(&mut self, count: usize) {
        if count != self.values.len() {
            self.values.resize(count, Value::Number(0.0));
            self.changed = true;
        }
    }

    /// Go back to the values the pin was created with.
    pub fn reset(&mut self) {
        self.values = self.defaults.clone();
        self.changed = true;
    }

    pub fn pin_is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_pin_as_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn consume_change(&mut self) {
        self.changed = false;
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn is_dirty(&self) -> bool {
        self.link_state == LinkState::Dirty
    }

    /// The pin's link set, or what it resolves to natively, changed.
    ///
    /// Only audio outputs track this; on every other pin it does nothing.
    pub fn invalidate_links(&mut self) {
        if self.is_audio_output() {
            self.link_state = LinkState::Dirty;
        }
    }

    /// Called by connection sync once the native edges match the links.
    pub(crate) fn mark_links_synced(&mut self) {
        self.link_state = LinkState::Clean;
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.pin_type.name())
    }
}

/// The ordered pin list of a node.
#[derive(Clone, Debug, Default)]
pub struct Pins {
    pins: Vec<Pin>,
}

impl Pins {
    pub fn new() -> Self {
        Self::default()
    }

    delegate! {
        to self.pins {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }

    pub fn add_input(&mut self, name: impl Into<String>, defaults: Vec<Value>, pin_type: PinType) -> PinId {
        self.push(Pin::new(name, PinDirection::Input, pin_type, defaults))
    }

    pub fn add_output(&mut self, name: impl Into<String>, defaults: Vec<Value>, pin_type: PinType) -> PinId {
        self.push(Pin::new(name, PinDirection::Output, pin_type, defaults))
    }

    fn push(&mut self, pin: Pin) -> PinId {
        self.pins.push(pin);
        PinId(self.pins.len() - 1)
    }

    pub fn get(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(id.0)
    }

    pub fn get_mut(&mut self, id: PinId) -> Option<&mut Pin> {
        self.pins.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PinId, &Pin)> {
        self.pins.iter().enumerate().map(|(i, p)| (PinId(i), p))
    }

    pub fn input(&self, name: &str) -> Option<PinId> {
        self.find(name, PinDirection::Input)
    }

    pub fn output(&self, name: &str) -> Option<PinId> {
        self.find(name, PinDirection::Output)
    }

    fn find(&self, name: &str, direction: PinDirection) -> Option<PinId> {
        self.iter()
            .find(|(_, p)| p.direction == direction && p.name == name)
            .map(|(id, _)| id)
    }

    pub fn has_changed_inputs(&self) -> bool {
        self.pins
            .iter()
            .any(|p| p.direction == PinDirection::Input && p.changed)
    }

    pub fn has_dirty_links(&self) -> bool {
        self.pins.iter().any(Pin::is_dirty)
    }

    pub(crate) fn consume_changes(&mut self, direction: PinDirection) {
        self.pins
            .iter_mut()
            .filter(|p| p.direction == direction)
            .for_each(Pin::consume_change);
    }
}

impl std::ops::Index<PinId> for Pins {
    type Output = Pin;

    fn index(&self, id: PinId) -> &Pin {
        &self.pins[id.0]
    }
}

impl std::ops::IndexMut<PinId> for Pins {
    fn index_mut(&mut self, id: PinId) -> &mut Pin {
        &mut self.pins[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_audio_outputs_go_dirty() {
        let mut pins = Pins::new();
        let audio_in = pins.add_input("Input 1", vec![UNCONNECTED_AUDIO.into()], PinType::Audio);
        let audio_out = pins.add_output("Output 1", vec![UnitId::new(3).into()], PinType::Audio);
        let value_out = pins.add_output("FFT", vec![], PinType::Value);

        for id in [audio_in, audio_out, value_out] {
            pins[id].invalidate_links();
        }

        assert_eq!(pins[audio_in].link_state(), LinkState::Clean);
        assert_eq!(pins[audio_out].link_state(), LinkState::Dirty);
        assert_eq!(pins[value_out].link_state(), LinkState::Clean);
    }

    #[test]
    fn spreads_wrap_and_resize() {
        let mut pin = Pin::new("FFT", PinDirection::Output, PinType::Value, vec![1.0.into(), 2.0.into()]);
        assert_eq!(pin.number(3), Some(2.0));

        pin.consume_change();
        pin.set_slice_count(4);
        assert!(pin.pin_is_changed());
        assert_eq!(pin.slice_count(), 4);
        assert_eq!(pin.number(3), Some(0.0));
    }

    #[test]
    fn rewriting_the_same_value_is_not_a_change() {
        let mut pin = Pin::new("Enabled", PinDirection::Input, PinType::Value, vec![1.0.into()]);
        pin.consume_change();
        pin.set_value(0, 1.0);
        assert!(!pin.pin_is_changed());
        pin.set_value(0, 0.0);
        assert!(pin.pin_is_changed());
    }

    #[test]
    fn enums_and_values_interconnect() {
        const OPTS: &[&str] = &["a", "b"];
        assert!(PinType::Enum(OPTS).accepts(&PinType::Value));
        assert!(!PinType::Audio.accepts(&PinType::Value));
        assert!(!PinType::Value.accepts(&PinType::Audio));
    }
}
