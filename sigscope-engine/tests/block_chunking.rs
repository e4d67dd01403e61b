use proptest::prelude::*;
use sigscope_engine::block::FixedBlockAccumulator;
use sigscope_engine::buffer::AudioBuffer;

const CHANNELS: usize = 2;

fn signal(len: usize) -> Vec<[f32; CHANNELS]> {
    (0..len).map(|i| [i as f32, -(i as f32) - 0.5]).collect()
}

/// Feed `samples` in the given chunk sizes; collect every (channel, block) emitted.
fn run(block: usize, samples: &[[f32; CHANNELS]], chunks: &[usize]) -> Vec<(usize, Vec<f32>)> {
    let mut acc = FixedBlockAccumulator::new(block);
    acc.prepare(CHANNELS);
    let max_chunk = chunks.iter().copied().max().unwrap_or(1).max(1);
    let mut buf = AudioBuffer::new(CHANNELS, max_chunk);
    let mut out = Vec::new();
    let mut pos = 0;
    let mut sizes = chunks.iter().copied().cycle();
    while pos < samples.len() {
        let n = sizes.next().unwrap_or(1).max(1).min(samples.len() - pos);
        buf.set_len(n);
        for ch in 0..CHANNELS {
            for (i, s) in buf.channel_mut(ch).iter_mut().enumerate() {
                *s = samples[pos + i][ch];
            }
        }
        acc.push(&buf, &mut |ch: usize, b: &[f32]| out.push((ch, b.to_vec())));
        pos += n;
    }
    out
}

proptest! {
    #[test]
    fn block_sequence_is_independent_of_chunking(
        order in 2u32..8,
        total in 0usize..2000,
        chunks in prop::collection::vec(1usize..700, 1..12),
    ) {
        let block = 1usize << order;
        let samples = signal(total);
        let reference = run(block, &samples, &[total.max(1)]);
        let chunked = run(block, &samples, &chunks);
        let single = run(block, &samples, &[1]);

        prop_assert_eq!(reference.len(), (total / block) * CHANNELS);
        prop_assert_eq!(&chunked, &reference);
        prop_assert_eq!(&single, &reference);
    }
}

#[test]
fn blocks_are_contiguous_slices_of_the_stream() {
    let samples = signal(100);
    let blocks = run(16, &samples, &[7, 3, 11]);
    assert_eq!(blocks.len(), 6 * CHANNELS);
    for (i, (ch, b)) in blocks.iter().enumerate() {
        let start = (i / CHANNELS) * 16;
        let expected: Vec<f32> = samples[start..start + 16].iter().map(|s| s[*ch]).collect();
        assert_eq!(b, &expected);
    }
}
