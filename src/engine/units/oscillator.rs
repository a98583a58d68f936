//! Periodic waveform generator

use dasp_graph::Buffer;

use super::{silence, BlockContext, ParamValues, Refusal, Render};
use crate::unit::OscillatorType;

/// Oscillator with frequency and detune.
///
/// Silent until started. It can be started again after a stop, but starting
/// a running oscillator is refused.
pub struct OscillatorUnit {
    kind: OscillatorType,
    phase: f32,
    running: bool,
}

impl OscillatorUnit {
    pub fn new() -> Self {
        Self {
            kind: OscillatorType::Sine,
            phase: 0.0,
            running: false,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) -> Result<(), Refusal> {
        if self.running {
            return Err(Refusal::InvalidState("already started"));
        }
        self.running = true;
        self.phase = 0.0;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), Refusal> {
        if !self.running {
            return Err(Refusal::InvalidState("not started"));
        }
        self.running = false;
        Ok(())
    }

    pub fn set_type(&mut self, kind: OscillatorType) -> Result<(), Refusal> {
        if kind == OscillatorType::Custom {
            return Err(Refusal::InvalidState("custom waveforms need a periodic wave"));
        }
        self.kind = kind;
        Ok(())
    }

    #[inline]
    fn sample(&self) -> f32 {
        let p = self.phase;
        match self.kind {
            OscillatorType::Sine | OscillatorType::Custom => (p * core::f32::consts::TAU).sin(),
            OscillatorType::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorType::Sawtooth => 2.0 * p - 1.0,
            OscillatorType::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        }
    }
}

impl Default for OscillatorUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for OscillatorUnit {
    fn render(&mut self, ctx: &BlockContext, params: &ParamValues, _inputs: &[Buffer], outputs: &mut [Buffer]) {
        if !self.running {
            silence(outputs);
            return;
        }
        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };

        let frequency = params.get("frequency") * (params.get("detune") / 1200.0).exp2();
        let phase_inc = frequency / ctx.sample_rate as f32;

        for sample in first.iter_mut() {
            *sample = self.sample();
            self.phase = (self.phase + phase_inc).rem_euclid(1.0);
        }
        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }
}
