//! Source nodes - units with no audio inputs

pub mod media_element;
pub mod oscillator;

pub use media_element::MediaElementSource;
pub use oscillator::{Oscillator, Transport};
