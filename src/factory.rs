//! Audio unit factory.

use tracing::{debug, warn};

use crate::context::{AudioContext, UnitId};
use crate::error::Result;
use crate::unit::{ChannelLayout, ParamDescriptor, UnitKind, UnitSpec};

/// A live unit as seen by the node that owns it.
///
/// The layout and parameter table are captured at creation and never change.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioUnit {
    id: UnitId,
    kind: UnitKind,
    layout: ChannelLayout,
    params: Vec<ParamDescriptor>,
}

impl AudioUnit {
    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.layout.inputs
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.layout.outputs
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Create a unit in `ctx` and capture its topology.
///
/// A backend that cannot build `spec` fails the call; the owning node has to
/// surface that as a construction failure.
pub fn create_unit(ctx: &mut dyn AudioContext, spec: &UnitSpec) -> Result<AudioUnit> {
    let kind = spec.kind();
    let id = ctx.create_unit(spec).map_err(|e| {
        warn!(%kind, error = %e, "backend refused to create unit");
        e
    })?;
    let layout = match ctx.channel_layout(id) {
        Ok(layout) => layout,
        Err(e) => {
            warn!(%kind, unit = id.index(), error = %e, "no channel layout for new unit, releasing it");
            if let Err(e) = ctx.release(id) {
                warn!(unit = id.index(), error = %e, "failed to release unit");
            }
            return Err(e);
        }
    };

    debug!(%kind, unit = id.index(), inputs = layout.inputs, outputs = layout.outputs, "created audio unit");

    Ok(AudioUnit {
        id,
        kind,
        layout,
        params: spec.params(),
    })
}
