//! Sink nodes - units with no audio outputs

pub mod destination;

pub use destination::AudioDestination;
