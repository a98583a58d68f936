//! Media element playback

use dasp_graph::Buffer;

use super::{silence, BlockContext, ParamValues, Render};
use crate::unit::MediaElement;

/// Plays a media element from the start, converting its sample rate by
/// linear interpolation. Non-looping elements go silent at the end.
pub struct MediaUnit {
    element: MediaElement,
    position: f64,
}

impl MediaUnit {
    pub fn new(element: MediaElement) -> Self {
        Self { element, position: 0.0 }
    }

    pub fn element(&self) -> &MediaElement {
        &self.element
    }

    /// Position in source frames
    pub fn position(&self) -> f64 {
        self.position
    }

    fn sample_at(&self, position: f64) -> f32 {
        let samples = self.element.samples();
        let i = position.floor() as usize;
        let frac = (position - i as f64) as f32;
        let a = samples.get(i).copied().unwrap_or(0.0);
        let b = match samples.get(i + 1) {
            Some(&b) => b,
            None if self.element.is_looping() => samples.first().copied().unwrap_or(0.0),
            None => 0.0,
        };
        a + (b - a) * frac
    }
}

impl Render for MediaUnit {
    fn render(&mut self, ctx: &BlockContext, _params: &ParamValues, _inputs: &[Buffer], outputs: &mut [Buffer]) {
        let len = self.element.samples().len() as f64;
        if len == 0.0 {
            silence(outputs);
            return;
        }
        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };

        let step = f64::from(self.element.sample_rate()) / f64::from(ctx.sample_rate);
        for sample in first.iter_mut() {
            if self.position >= len {
                if self.element.is_looping() {
                    self.position %= len;
                } else {
                    *sample = 0.0;
                    continue;
                }
            }
            *sample = self.sample_at(self.position);
            self.position += step;
        }
        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }
}
