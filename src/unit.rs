//! Audio unit kinds and their static descriptions.
//!
//! Every unit the backend can create is one of the [`UnitKind`] variants. The
//! channel layout and mutable parameters of each kind are declared here as
//! plain tables, so pins can be derived without probing the backend object.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// The closed set of unit types a backend can create.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UnitKind {
    Analyser,
    MediaElementSource,
    Destination,
    Oscillator,
    Delay,
    Gain,
}

/// Fixed number of audio inputs and outputs of a unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChannelLayout {
    pub inputs: usize,
    pub outputs: usize,
}

impl ChannelLayout {
    pub const fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }
}

/// A named scalar parameter of a unit.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ParamDescriptor {
    /// Backend name, e.g. `delayTime`
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, default: f32, min: f32, max: f32) -> Self {
        Self { name, default, min, max }
    }

    /// Pin label for this parameter: a space goes in at every lower to upper
    /// case boundary, so `delayTime` becomes `delay Time`.
    pub fn label(&self) -> String {
        let mut label = String::with_capacity(self.name.len() + 2);
        let mut prev_lower = false;
        for c in self.name.chars() {
            if prev_lower && c.is_ascii_uppercase() {
                label.push(' ');
            }
            prev_lower = c.is_ascii_lowercase();
            label.push(c);
        }
        label
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Maximum delay of a delay line whose requested maximum is unusable.
pub const DEFAULT_MAX_DELAY: f32 = 1.0;

/// Requested maximum delays must stay below this many seconds.
pub const MAX_DELAY_LIMIT: f32 = 180.0;

/// The maximum delay a delay line is actually built with.
///
/// Anything outside `0 < seconds < MAX_DELAY_LIMIT` gets [`DEFAULT_MAX_DELAY`].
pub fn max_delay_or_default(seconds: f32) -> f32 {
    if seconds > 0.0 && seconds < MAX_DELAY_LIMIT {
        seconds
    } else {
        DEFAULT_MAX_DELAY
    }
}

const NYQUIST_GUARD: f32 = 24_000.0;

const OSCILLATOR_PARAMS: [ParamDescriptor; 2] = [
    ParamDescriptor::new("frequency", 440.0, -NYQUIST_GUARD, NYQUIST_GUARD),
    ParamDescriptor::new("detune", 0.0, -153_600.0, 153_600.0),
];

const GAIN_PARAMS: [ParamDescriptor; 1] = [ParamDescriptor::new("gain", 1.0, f32::MIN, f32::MAX)];

impl UnitKind {
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Analyser,
        UnitKind::MediaElementSource,
        UnitKind::Destination,
        UnitKind::Oscillator,
        UnitKind::Delay,
        UnitKind::Gain,
    ];

    /// Backend type name
    pub const fn name(self) -> &'static str {
        match self {
            UnitKind::Analyser => "Analyser",
            UnitKind::MediaElementSource => "MediaElementSource",
            UnitKind::Destination => "Destination",
            UnitKind::Oscillator => "Oscillator",
            UnitKind::Delay => "Delay",
            UnitKind::Gain => "Gain",
        }
    }

    pub const fn channel_layout(self) -> ChannelLayout {
        match self {
            UnitKind::Analyser => ChannelLayout::new(1, 1),
            UnitKind::MediaElementSource => ChannelLayout::new(0, 1),
            UnitKind::Destination => ChannelLayout::new(1, 0),
            UnitKind::Oscillator => ChannelLayout::new(0, 1),
            UnitKind::Delay => ChannelLayout::new(1, 1),
            UnitKind::Gain => ChannelLayout::new(1, 1),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UnitKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnsupportedKind(s.to_owned()))
    }
}

/// A unit kind together with its constructor arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitSpec {
    Analyser,
    /// Plays the given element
    MediaElementSource(MediaElement),
    Destination,
    Oscillator,
    /// Delay line bounded to `max_delay_time` seconds
    Delay { max_delay_time: f32 },
    Gain,
}

impl UnitSpec {
    pub fn kind(&self) -> UnitKind {
        match self {
            UnitSpec::Analyser => UnitKind::Analyser,
            UnitSpec::MediaElementSource(_) => UnitKind::MediaElementSource,
            UnitSpec::Destination => UnitKind::Destination,
            UnitSpec::Oscillator => UnitKind::Oscillator,
            UnitSpec::Delay { .. } => UnitKind::Delay,
            UnitSpec::Gain => UnitKind::Gain,
        }
    }

    /// Parameters of the unit this spec creates.
    ///
    /// The delay line's `delayTime` range depends on the constructor argument,
    /// everything else is fixed per kind.
    pub fn params(&self) -> Vec<ParamDescriptor> {
        match self {
            UnitSpec::Oscillator => OSCILLATOR_PARAMS.to_vec(),
            UnitSpec::Gain => GAIN_PARAMS.to_vec(),
            UnitSpec::Delay { max_delay_time } => {
                vec![ParamDescriptor::new("delayTime", 0.0, 0.0, max_delay_or_default(*max_delay_time))]
            }
            UnitSpec::Analyser | UnitSpec::MediaElementSource(_) | UnitSpec::Destination => Vec::new(),
        }
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.kind().channel_layout()
    }
}

/// Waveform of an oscillator unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OscillatorType {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// Needs a periodic wave; the built-in engine refuses it
    Custom,
}

impl OscillatorType {
    /// Options shown on the enum pin, in pin order
    pub const OPTIONS: [&'static str; 5] = ["sine", "square", "sawtooth", "triangle", "custom"];

    pub const fn as_str(self) -> &'static str {
        match self {
            OscillatorType::Sine => "sine",
            OscillatorType::Square => "square",
            OscillatorType::Sawtooth => "sawtooth",
            OscillatorType::Triangle => "triangle",
            OscillatorType::Custom => "custom",
        }
    }
}

impl Default for OscillatorType {
    fn default() -> Self {
        OscillatorType::Sine
    }
}

impl FromStr for OscillatorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sine" => Ok(OscillatorType::Sine),
            "square" => Ok(OscillatorType::Square),
            "sawtooth" => Ok(OscillatorType::Sawtooth),
            "triangle" => Ok(OscillatorType::Triangle),
            "custom" => Ok(OscillatorType::Custom),
            other => Err(Error::UnsupportedKind(format!("oscillator type {other}"))),
        }
    }
}

static NEXT_MEDIA_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded media clip that a media-element source unit can play.
///
/// Clones share the sample data and compare equal; two separately constructed
/// elements never do, even with identical samples.
#[derive(Clone)]
pub struct MediaElement {
    id: u64,
    samples: Arc<[f32]>,
    sample_rate: u32,
    looping: bool,
}

impl MediaElement {
    /// Create an element from mono samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed),
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
            looping: false,
        }
    }

    /// Loop playback (builder pattern)
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Decode an Ogg Vorbis file, downmixing to mono.
    #[cfg(feature = "vorbis_src")]
    pub fn from_ogg<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        use lewton::inside_ogg::OggStreamReader;

        let file = std::fs::File::open(path)?;
        let mut reader = OggStreamReader::new(file)?;
        let channels = usize::from(reader.ident_hdr.audio_channels.max(1));
        let sample_rate = reader.ident_hdr.audio_sample_rate;

        let mut samples = Vec::new();
        while let Some(packet) = reader.read_dec_packet_itl()? {
            for frame in packet.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
                samples.push(sum / channels as f32);
            }
        }

        tracing::debug!(frames = samples.len(), sample_rate, "decoded vorbis media element");
        Ok(Self::new(samples, sample_rate))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

impl PartialEq for MediaElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for MediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaElement")
            .field("id", &self.id)
            .field("frames", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("looping", &self.looping)
            .finish()
    }
}
