//! Analysis nodes - pass audio through and publish what they measure

pub mod analyser;
pub mod beat_detector;
pub mod beat_tracker;

pub use analyser::Analyser;
pub use beat_detector::BeatDetector;
pub use beat_tracker::BeatTracker;
