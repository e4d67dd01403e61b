//! Fixed-block accumulator.
//!
//! Hosts hand the audio thread chunks of any size (1 sample up to many blocks,
//! varying from call to call). Spectral analysis needs exactly `2^order` samples at
//! a time. The accumulator copies incoming samples behind a write cursor and fires
//! the per-channel callback **synchronously, once per completed block**, then
//! rewinds the cursor. A partial block never reaches the callback; it waits for
//! the next chunk. The sequence of blocks produced is therefore identical for any
//! chunking of the same input stream.
//!
//! Storage is sized on [`FixedBlockAccumulator::prepare`]; `push` never allocates.

use crate::buffer::AudioBuffer;
use crate::stage::FixedBlockProcessor;

#[derive(Debug, Clone)]
pub struct FixedBlockAccumulator {
    block_size: usize,
    channels: usize,
    /// `channels * block_size`, planar.
    data: Vec<f32>,
    cursor: usize,
}

impl FixedBlockAccumulator {
    /// `block_size` must be a power of two; anything else is rounded up to one.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1).next_power_of_two(),
            channels: 0,
            data: Vec::new(),
            cursor: 0,
        }
    }

    /// Allocate per-channel storage and rewind.
    pub fn prepare(&mut self, channels: usize) {
        self.channels = channels;
        self.data = vec![0.0; channels * self.block_size];
        self.cursor = 0;
    }

    /// Rewind the cursor and forget any partial block.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.data.fill(0.0);
    }

    #[inline] pub fn block_size(&self) -> usize { self.block_size }
    #[inline] pub fn num_channels(&self) -> usize { self.channels }
    /// Samples currently buffered towards the next block, in [0, block_size).
    #[inline] pub fn cursor(&self) -> usize { self.cursor }

    /// Accumulate the active region of `input`, invoking `processor` for each channel
    /// of every block that completes. Returns the number of completed blocks.
    ///
    /// Channels of `input` beyond the prepared count are ignored; prepared channels
    /// missing from `input` accumulate silence.
    pub fn push<P>(&mut self, input: &AudioBuffer, processor: &mut P) -> usize
    where
        P: FixedBlockProcessor + ?Sized,
    {
        if self.channels == 0 {
            return 0;
        }
        let n = input.len();
        let shared = self.channels.min(input.num_channels());
        let mut offset = 0;
        let mut completed = 0;

        while offset < n {
            let take = (self.block_size - self.cursor).min(n - offset);
            for ch in 0..self.channels {
                let start = ch * self.block_size + self.cursor;
                let dst = &mut self.data[start..start + take];
                if ch < shared {
                    dst.copy_from_slice(&input.channel(ch)[offset..offset + take]);
                } else {
                    dst.fill(0.0);
                }
            }
            self.cursor += take;
            offset += take;

            if self.cursor == self.block_size {
                for ch in 0..self.channels {
                    let start = ch * self.block_size;
                    processor.process_block(ch, &self.data[start..start + self.block_size]);
                }
                self.cursor = 0;
                completed += 1;
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, len: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::new(channels, len);
        for ch in 0..channels {
            for (i, s) in buf.channel_mut(ch).iter_mut().enumerate() {
                *s = (ch * 10_000 + i) as f32;
            }
        }
        buf
    }

    #[test]
    fn partial_block_is_held_back() {
        let mut acc = FixedBlockAccumulator::new(8);
        acc.prepare(1);
        let mut calls = 0;
        let done = acc.push(&ramp(1, 7), &mut |_ch: usize, _b: &[f32]| calls += 1);
        assert_eq!(done, 0);
        assert_eq!(calls, 0);
        assert_eq!(acc.cursor(), 7);
    }

    #[test]
    fn one_chunk_can_complete_many_blocks() {
        let mut acc = FixedBlockAccumulator::new(4);
        acc.prepare(2);
        let mut seen: Vec<(usize, Vec<f32>)> = Vec::new();
        let done = acc.push(&ramp(2, 10), &mut |ch: usize, b: &[f32]| seen.push((ch, b.to_vec())));
        assert_eq!(done, 2);
        assert_eq!(acc.cursor(), 2);
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], (0, vec![0.0, 1.0, 2.0, 3.0]));
        assert_eq!(seen[1], (1, vec![10_000.0, 10_001.0, 10_002.0, 10_003.0]));
        assert_eq!(seen[2], (0, vec![4.0, 5.0, 6.0, 7.0]));
    }

    #[test]
    fn block_size_rounds_up_to_power_of_two() {
        assert_eq!(FixedBlockAccumulator::new(1000).block_size(), 1024);
        assert_eq!(FixedBlockAccumulator::new(0).block_size(), 1);
    }

    #[test]
    fn unprepared_push_is_a_no_op() {
        let mut acc = FixedBlockAccumulator::new(4);
        assert_eq!(acc.push(&ramp(1, 16), &mut |_c: usize, _b: &[f32]| panic!("fired")), 0);
    }

    #[test]
    fn reset_discards_partial_block() {
        let mut acc = FixedBlockAccumulator::new(4);
        acc.prepare(1);
        acc.push(&ramp(1, 3), &mut |_c: usize, _b: &[f32]| {});
        acc.reset();
        let mut first = Vec::new();
        acc.push(&ramp(1, 4), &mut |_c: usize, b: &[f32]| first = b.to_vec());
        assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
