//! Node variants and the registry that builds them by name.

use crate::error::{Error, Result};
use crate::node::PatchNode;

pub mod analysis;
pub mod effect;
pub mod sink;
pub mod source;

pub use analysis::{Analyser, BeatDetector, BeatTracker};
pub use effect::{Delay, Gain};
pub use sink::AudioDestination;
pub use source::{MediaElementSource, Oscillator, Transport};

/// Every name [`create`] understands
pub const NODE_NAMES: [&str; 7] = [
    analysis::analyser::NAME,
    analysis::beat_detector::NAME,
    source::media_element::NAME,
    source::oscillator::NAME,
    effect::delay::NAME,
    effect::gain::NAME,
    sink::destination::NAME,
];

/// Build an uninitialized node from its registry name.
pub fn create(name: &str) -> Result<Box<dyn PatchNode>> {
    let node: Box<dyn PatchNode> = match name {
        analysis::analyser::NAME => Box::new(Analyser::new()),
        analysis::beat_detector::NAME => Box::new(BeatDetector::new()),
        source::media_element::NAME => Box::new(MediaElementSource::new()),
        source::oscillator::NAME => Box::new(Oscillator::new()),
        effect::delay::NAME => Box::new(Delay::new()),
        effect::gain::NAME => Box::new(Gain::new()),
        sink::destination::NAME => Box::new(AudioDestination::new()),
        _ => return Err(Error::UnknownNodeType(name.to_owned())),
    };
    Ok(node)
}
