//! Per-channel peak meter.
//!
//! Each processed chunk overwrites one slot per channel with the chunk's max
//! absolute sample. Slots are `AtomicU32` holding `f32` bits, so any number of
//! readers see a whole value. There is no hold or decay: a query returns the
//! peak of the most recent chunk only.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sigscope_core::dsp::{lin_to_db, peak_abs};

use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::error::{EngineError, Result};
use crate::shared::SharedSlot;
use crate::stage::Stage;

/// One atomically readable linear peak per channel.
#[derive(Debug)]
pub struct PeakLevels {
    slots: Box<[AtomicU32]>,
}

impl PeakLevels {
    pub fn new(channels: usize) -> Self {
        Self { slots: (0..channels).map(|_| AtomicU32::new(0.0_f32.to_bits())).collect() }
    }

    #[inline] pub fn len(&self) -> usize { self.slots.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Out-of-range channels are ignored.
    #[inline]
    pub fn store(&self, channel: usize, peak: f32) {
        if let Some(slot) = self.slots.get(channel) {
            slot.store(peak.to_bits(), Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn load(&self, channel: usize) -> Option<f32> {
        self.slots.get(channel).map(|s| f32::from_bits(s.load(Ordering::Relaxed)))
    }

    pub fn clear(&self) {
        for s in self.slots.iter() {
            s.store(0.0_f32.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Consumer-side view of a [`PeakMeter`].
#[derive(Debug, Clone)]
pub struct MeterHandle {
    levels: SharedSlot<PeakLevels>,
}

impl MeterHandle {
    pub fn num_channels(&self) -> usize {
        self.levels.load().len()
    }

    /// Latest linear peak of `channel`.
    pub fn peak(&self, channel: usize) -> Result<f32> {
        let levels = self.levels.load();
        if levels.is_empty() {
            return Err(EngineError::NotPrepared);
        }
        levels
            .load(channel)
            .ok_or(EngineError::ChannelOutOfRange { channel, channels: levels.len() })
    }

    /// Latest peak in dBFS, floored at `DB_FLOOR`.
    pub fn peak_db(&self, channel: usize) -> Result<f32> {
        self.peak(channel).map(lin_to_db)
    }
}

/// Peak-measuring stage; leaves the buffer untouched.
#[derive(Debug)]
pub struct PeakMeter {
    levels: Arc<PeakLevels>,
    published: SharedSlot<PeakLevels>,
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakMeter {
    pub fn new() -> Self {
        let levels = Arc::new(PeakLevels::new(0));
        Self { published: SharedSlot::new(Arc::clone(&levels)), levels }
    }

    pub fn handle(&self) -> MeterHandle {
        MeterHandle { levels: self.published.clone() }
    }

    /// Make the levels built by the last prepare visible to handles.
    pub fn publish(&self) {
        self.published.store(Arc::clone(&self.levels));
    }

    /// Measure without going through `Stage` (used for input meters).
    #[inline]
    pub fn measure(&self, buffer: &AudioBuffer) {
        for ch in 0..self.levels.len().min(buffer.num_channels()) {
            self.levels.store(ch, peak_abs(buffer.channel(ch)));
        }
    }

    #[inline]
    pub fn levels(&self) -> &PeakLevels {
        &self.levels
    }
}

impl Stage for PeakMeter {
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        spec.validate()?;
        self.levels = Arc::new(PeakLevels::new(spec.num_channels));
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.measure(buffer);
    }

    fn reset(&mut self) {
        self.levels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(channels: usize) -> PeakMeter {
        let mut m = PeakMeter::new();
        m.prepare(&ProcessSpec { sample_rate: 48_000.0, max_block_size: 64, num_channels: channels }).unwrap();
        m.publish();
        m
    }

    #[test]
    fn reports_exact_block_peak() {
        let mut m = prepared(2);
        let h = m.handle();
        let mut buf = AudioBuffer::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[0.1, -0.73, 0.5, 0.0]);
        buf.channel_mut(1).copy_from_slice(&[0.25, 0.25, -0.25, 0.125]);
        m.process(&mut buf);
        assert_eq!(h.peak(0).unwrap(), 0.73);
        assert_eq!(h.peak(1).unwrap(), 0.25);
        assert!((h.peak_db(1).unwrap() - (-12.0412)).abs() < 1e-3);
    }

    #[test]
    fn next_block_overwrites_without_hold() {
        let mut m = prepared(1);
        let h = m.handle();
        let mut buf = AudioBuffer::new(1, 2);
        buf.channel_mut(0).copy_from_slice(&[0.9, 0.0]);
        m.process(&mut buf);
        buf.channel_mut(0).copy_from_slice(&[0.1, -0.2]);
        m.process(&mut buf);
        assert_eq!(h.peak(0).unwrap(), 0.2);
    }

    #[test]
    fn queries_are_range_checked() {
        let m = PeakMeter::new();
        assert_eq!(m.handle().peak(0), Err(EngineError::NotPrepared));
        let m = prepared(2);
        assert_eq!(m.handle().peak(2), Err(EngineError::ChannelOutOfRange { channel: 2, channels: 2 }));
    }

    #[test]
    fn silence_reads_as_db_floor() {
        let m = prepared(1);
        assert_eq!(m.handle().peak_db(0).unwrap(), sigscope_core::dsp::DB_FLOOR);
    }
}
