//! Error type shared by the factory, the backend seam and patch editing.

use thiserror::Error;

use crate::context::UnitId;
use crate::node::NodeId;
use crate::patch::LinkId;
use crate::pin::PinId;
use crate::unit::UnitKind;

/// Everything that can go wrong while building or editing a patch.
///
/// Evaluation steps never hand these to the scheduler: a node logs the
/// failure and carries on with its remaining pins.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend has no unit type with this name.
    #[error("unsupported audio unit kind `{0}`")]
    UnsupportedKind(String),

    /// The unit exists but does not understand the requested control.
    #[error("{kind:?} unit does not support `{command}`")]
    UnsupportedCommand { kind: UnitKind, command: &'static str },

    #[error("unit {unit:?} has no parameter named `{name}`")]
    UnknownParam { unit: UnitId, name: String },

    #[error("no audio unit with id {0:?}")]
    UnknownUnit(UnitId),

    #[error("output {index} is out of range for unit {unit:?} ({count} outputs)")]
    OutputOutOfRange { unit: UnitId, index: usize, count: usize },

    #[error("input {index} is out of range for unit {unit:?} ({count} inputs)")]
    InputOutOfRange { unit: UnitId, index: usize, count: usize },

    /// A one-shot transport control hit a unit in the wrong state.
    #[error("unit {unit:?} cannot {action}: {reason}")]
    InvalidState {
        unit: UnitId,
        action: &'static str,
        reason: &'static str,
    },

    #[error("no node with id {0:?}")]
    UnknownNode(NodeId),

    #[error("node {node:?} has no pin {pin:?}")]
    UnknownPin { node: NodeId, pin: PinId },

    #[error("no link with id {0:?}")]
    UnknownLink(LinkId),

    /// The scheduler refused a link between incompatible pins.
    #[error("cannot link `{from}` to `{to}`: {reason}")]
    IllegalLink {
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("link would close a cycle through node {0:?}")]
    Cycle(NodeId),

    #[error("no node type named `{0}`")]
    UnknownNodeType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "vorbis_src")]
    #[error("vorbis decoding error: {0}")]
    Vorbis(#[from] lewton::VorbisError),
}

/// Result type for audiopatch operations
pub type Result<T> = std::result::Result<T, Error>;
