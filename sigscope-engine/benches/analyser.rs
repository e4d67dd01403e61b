use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sigscope_engine::{
    Analyser, AnalyserConfig, AudioBuffer, Pipeline, PipelineConfig, ProcessSpec, Stage, WindowKind,
};

fn analyser_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyser");
    for order in [10u32, 12, 14] {
        let n = 1usize << order;
        let mut a = Analyser::new(&AnalyserConfig { order, window: WindowKind::Hann, enabled: true }).unwrap();
        a.prepare(&ProcessSpec { sample_rate: 48_000.0, max_block_size: n, num_channels: 2 }).unwrap();
        let mut buf = AudioBuffer::new(2, n);
        for ch in 0..2 {
            for (i, s) in buf.channel_mut(ch).iter_mut().enumerate() {
                *s = ((i * 31 + ch * 7) % 97) as f32 / 97.0 - 0.5;
            }
        }
        group.bench_with_input(BenchmarkId::new("stereo_block", n), &n, |b, _| {
            b.iter(|| a.process(black_box(&mut buf)))
        });
    }
    group.finish();
}

fn pipeline_callback(c: &mut Criterion) {
    let (mut p, _controller) = Pipeline::new(PipelineConfig::default()).unwrap();
    p.prepare(&ProcessSpec { sample_rate: 48_000.0, max_block_size: 512, num_channels: 2 }).unwrap();
    let mut buf = AudioBuffer::new(2, 512);
    c.bench_function("pipeline_512_frames", |b| b.iter(|| p.process(black_box(&mut buf))));
}

criterion_group!(benches, analyser_block, pipeline_callback);
criterion_main!(benches);
