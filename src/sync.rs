//! Per-tick synchronization of parameters and connections.
//!
//! Both passes are methods on [`AudioCore`] and only read the node's pins plus
//! a [`LinkView`] of its outgoing links; they never touch other nodes.

use tracing::{debug, trace, warn};

use crate::context::AudioContext;
use crate::node::{AudioCore, LinkView};
use crate::pin::Pins;

/// Outcome of one connection sync pass, mostly for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outputs whose edges were fully rebuilt and marked clean
    pub rewired: usize,
    /// Edges added to the backend
    pub connected: usize,
    /// Edges left for a later tick because the target has no unit yet
    pub deferred: usize,
    /// Edges the backend refused; the output stays dirty and retries
    pub refused: usize,
    /// Edges dropped for good because the target pin is not an audio input
    pub skipped: usize,
}

impl AudioCore {
    /// Push changed parameter pins into the unit.
    ///
    /// Values are clamped to the parameter's range and non-finite ones fall
    /// back to its default, so the backend always holds the value in effect.
    /// Pins without a numeric value are left alone.
    pub fn sync_params(&self, ctx: &mut dyn AudioContext, pins: &Pins) {
        let Some(unit) = self.unit() else {
            return;
        };

        for binding in &self.params {
            let pin = &pins[binding.pin];
            if !pin.pin_is_changed() {
                continue;
            }
            let Some(value) = pin.number(0) else {
                warn!(param = binding.name, "parameter pin has no numeric value");
                continue;
            };

            let descriptor = unit.param(binding.name);
            let value = value as f32;
            let value = match descriptor {
                _ if !value.is_finite() => {
                    let fallback = descriptor.map_or(0.0, |p| p.default);
                    warn!(param = binding.name, fallback, "non-finite parameter value, using default");
                    fallback
                }
                Some(p) if p.clamp(value) != value => {
                    debug!(param = binding.name, value, min = p.min, max = p.max, "parameter value out of range, clamping");
                    p.clamp(value)
                }
                _ => value,
            };

            trace!(unit = unit.id().index(), param = binding.name, value, "set param");
            if let Err(e) = ctx.set_param(unit.id(), binding.name, value) {
                warn!(param = binding.name, error = %e, "failed to set parameter");
            }
        }
    }

    /// Rebuild the native edges of every dirty audio output.
    ///
    /// Each dirty output is torn down completely and re-added from its links.
    /// The output is only marked clean when every edge was applied; links into
    /// nodes without a unit, or edges the backend refused, keep it dirty so a
    /// later pass retries.
    pub fn sync_connections(&self, ctx: &mut dyn AudioContext, pins: &mut Pins, links: &LinkView) -> SyncReport {
        let mut report = SyncReport::default();
        let Some(unit) = self.unit() else {
            return report;
        };

        for (output, &pin_id) in self.audio_outputs.iter().enumerate() {
            if !pins[pin_id].is_dirty() {
                continue;
            }
            debug!(unit = unit.id().index(), output, "re-connecting");

            if let Err(e) = ctx.disconnect(unit.id(), output) {
                warn!(unit = unit.id().index(), output, error = %e, "failed to tear down output");
                continue;
            }

            let mut complete = true;
            for target in links.targets(pin_id) {
                let Some(input) = target.input_index else {
                    warn!(
                        node = target.node.index(),
                        pin = target.pin.index(),
                        "link target is not an audio input of its node, skipping edge"
                    );
                    report.skipped += 1;
                    continue;
                };
                let Some(to) = target.unit else {
                    trace!(node = target.node.index(), "link target has no unit yet, retrying later");
                    report.deferred += 1;
                    complete = false;
                    continue;
                };

                match ctx.connect(unit.id(), output, to, input) {
                    Ok(()) => report.connected += 1,
                    Err(e) => {
                        warn!(from = unit.id().index(), output, to = to.index(), input, error = %e, "failed to connect, retrying later");
                        report.refused += 1;
                        complete = false;
                    }
                }
            }

            if complete {
                pins[pin_id].mark_links_synced();
                report.rewired += 1;
            }
        }

        report
    }
}
