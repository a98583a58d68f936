//! Gain stage

use dasp_graph::Buffer;

use super::{silence, BlockContext, ParamValues, Render};

/// Multiplies its input by `gain`.
pub struct GainUnit;

impl Render for GainUnit {
    fn render(&mut self, _ctx: &BlockContext, params: &ParamValues, inputs: &[Buffer], outputs: &mut [Buffer]) {
        let (Some(input), Some(output)) = (inputs.first(), outputs.first_mut()) else {
            silence(outputs);
            return;
        };
        let gain = params.get("gain");
        for (out, &s) in output.iter_mut().zip(input.iter()) {
            *out = s * gain;
        }
    }
}
