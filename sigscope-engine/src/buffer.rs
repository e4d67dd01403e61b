//! Planar audio buffer and the prepare-time process spec.

use crate::error::{EngineError, Result};

/// Upper bound on channels; output routing masks are `u64`.
pub const MAX_CHANNELS: usize = 64;

/// Host parameters fixed between two prepare events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    /// Largest chunk the host will hand to a single `process` call.
    pub max_block_size: usize,
    pub num_channels: usize,
}

impl ProcessSpec {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::InvalidSpec(format!("sample rate {}", self.sample_rate)));
        }
        if self.max_block_size == 0 {
            return Err(EngineError::InvalidSpec("max block size is zero".to_string()));
        }
        if self.num_channels == 0 || self.num_channels > MAX_CHANNELS {
            return Err(EngineError::InvalidSpec(format!(
                "{} channels (supported 1..={})",
                self.num_channels, MAX_CHANNELS
            )));
        }
        Ok(())
    }
}

/// Planar multichannel buffer with a fixed capacity and a variable active length.
///
/// Storage is allocated once in [`AudioBuffer::new`]; [`AudioBuffer::set_len`]
/// only moves the active window, so the audio thread can reuse one buffer for
/// callbacks of any size up to the capacity.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
    len: usize,
}

impl AudioBuffer {
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; channels * capacity],
            channels,
            capacity,
            len: capacity,
        }
    }

    #[inline] pub fn num_channels(&self) -> usize { self.channels }
    #[inline] pub fn capacity(&self) -> usize { self.capacity }
    #[inline] pub fn len(&self) -> usize { self.len }
    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Set the active length, clamped to the capacity.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.capacity);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.capacity;
        &self.data[start..start + self.len]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.capacity;
        &mut self.data[start..start + self.len]
    }

    /// Zero the active region of every channel.
    pub fn clear(&mut self) {
        for ch in 0..self.channels {
            self.channel_mut(ch).fill(0.0);
        }
    }

    /// Copy the active region of `other` (same channel count) into `self`.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        self.set_len(other.len());
        for ch in 0..self.channels.min(other.channels) {
            self.channel_mut(ch).copy_from_slice(other.channel(ch));
        }
    }

    /// Load frames from an interleaved slice; returns the number of frames read.
    pub fn read_interleaved(&mut self, src: &[f32], src_channels: usize) -> usize {
        if src_channels == 0 {
            self.set_len(0);
            return 0;
        }
        let frames = (src.len() / src_channels).min(self.capacity);
        self.set_len(frames);
        for ch in 0..self.channels {
            let start = ch * self.capacity;
            let dst = &mut self.data[start..start + frames];
            if ch < src_channels {
                for (d, frame) in dst.iter_mut().zip(src.chunks_exact(src_channels)) {
                    *d = frame[ch];
                }
            } else {
                dst.fill(0.0);
            }
        }
        frames
    }

    /// Write the active frames into an interleaved slice, converting each sample.
    /// Extra destination channels are filled with `f(0.0)`.
    pub fn write_interleaved<T>(&self, dst: &mut [T], dst_channels: usize, f: impl Fn(f32) -> T) {
        if dst_channels == 0 {
            return;
        }
        for (i, frame) in dst.chunks_exact_mut(dst_channels).take(self.len).enumerate() {
            for (ch, out) in frame.iter_mut().enumerate() {
                let s = if ch < self.channels { self.data[ch * self.capacity + i] } else { 0.0 };
                *out = f(s);
            }
        }
    }
}
