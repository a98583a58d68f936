//! The context's output

use dasp_graph::Buffer;

use super::{BlockContext, ParamValues, Render};

/// Terminal unit. It has no outputs; the engine reads its summed input after
/// each block.
pub struct DestinationUnit;

impl Render for DestinationUnit {
    fn render(&mut self, _ctx: &BlockContext, _params: &ParamValues, _inputs: &[Buffer], _outputs: &mut [Buffer]) {}
}
