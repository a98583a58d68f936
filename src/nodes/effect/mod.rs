//! Effect nodes - audio in, audio out, parameters in between

pub mod delay;
pub mod gain;

pub use delay::Delay;
pub use gain::Gain;
