//! Delay line

use dasp_graph::Buffer;

use super::{silence, BlockContext, ParamValues, Render};
use crate::unit::max_delay_or_default;

/// Fractional delay line with linear interpolation.
pub struct DelayUnit {
    line: Vec<f32>,
    write: usize,
}

impl DelayUnit {
    pub fn new(max_delay_time: f32, sample_rate: u32) -> Self {
        let max = max_delay_or_default(max_delay_time);
        // one block of headroom so a full-length delay never reads what it writes
        let len = (max * sample_rate as f32).ceil() as usize + Buffer::LEN + 2;
        Self {
            line: vec![0.0; len],
            write: 0,
        }
    }

    fn read(&self, delay: f32) -> f32 {
        let len = self.line.len();
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let a = self.line[(self.write + len - whole % len) % len];
        let b = self.line[(self.write + len - (whole + 1) % len) % len];
        a + (b - a) * frac
    }
}

impl Render for DelayUnit {
    fn render(&mut self, ctx: &BlockContext, params: &ParamValues, inputs: &[Buffer], outputs: &mut [Buffer]) {
        let Some(output) = outputs.first_mut() else {
            return;
        };
        let limit = (self.line.len() - Buffer::LEN - 2) as f32;
        let delay = (params.get("delayTime") * ctx.sample_rate as f32).clamp(0.0, limit);

        for (i, out) in output.iter_mut().enumerate() {
            let s = inputs.first().map_or(0.0, |input| input[i]);
            self.line[self.write] = s;
            *out = self.read(delay);
            self.write = (self.write + 1) % self.line.len();
        }
        if let Some(rest) = outputs.get_mut(1..) {
            silence(rest);
        }
    }
}
