//! audiopatch - keeps an imperative audio graph in sync with a dataflow patch
//!
//! Design principles:
//! - A patch node owns at most one native audio unit and mirrors its topology
//!   as pins: one audio pin per channel, one value pin per parameter
//! - The patch holds the declarative links; native edges are rebuilt per
//!   output pin whenever its links go dirty, never patched incrementally
//! - The backend is injected through [`AudioContext`], never global
//! - Evaluation never fails outward; problems are logged and skipped
//!
//! [`Engine`] is a small built-in backend so patches can render without a
//! host audio engine.

mod context;
mod error;
pub mod engine;
pub mod factory;
pub mod node;
pub mod nodes;
mod patch;
pub mod pin;
mod sync;
pub mod unit;

pub use context::{AudioContext, UnitCommand, UnitId};
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use factory::{create_unit, AudioUnit};
pub use node::{AudioCore, LinkTarget, LinkView, NodeId, PatchNode};
pub use patch::{Link, LinkId, Patch};
pub use pin::{LinkState, Pin, PinDirection, PinId, PinType, Pins, Value};
pub use sync::SyncReport;
pub use unit::{ChannelLayout, MediaElement, OscillatorType, ParamDescriptor, UnitKind, UnitSpec};

#[cfg(feature = "cpal_sink")]
pub use engine::device::{CpalDevice, OutputStats};
