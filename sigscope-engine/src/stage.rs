//! Processing capabilities shared by every pipeline stage.
//!
//! There is no base class. A stage is any object that can be prepared for a
//! host configuration, process a buffer in place, and drop its running state.
//! The [`Pipeline`](crate::pipeline::Pipeline) owns its stages as concrete
//! fields and calls them in a fixed order, so dispatch is static.
//!
//! Real-time contract for `process`
//! - no allocation, no blocking, no logging
//! - never fails: misconfiguration yields silence or a skipped step

use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::error::Result;

/// Minimal prepare/process/reset capability.
pub trait Stage {
    /// (Re)allocate all per-channel state for `spec`. Runs off the audio thread.
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()>;

    /// Process the active region of `buffer` in place.
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Return running state (phases, cursors, filter memories) to its initial value.
    fn reset(&mut self);
}

/// Per-channel callback driven by a [`FixedBlockAccumulator`](crate::block::FixedBlockAccumulator)
/// once for every completed block.
pub trait FixedBlockProcessor {
    fn process_block(&mut self, channel: usize, block: &[f32]);
}

impl<F: FnMut(usize, &[f32])> FixedBlockProcessor for F {
    #[inline]
    fn process_block(&mut self, channel: usize, block: &[f32]) {
        self(channel, block);
    }
}
