//! sigscope CLI — real-time test-signal player with live spectrum reports.

mod cli;
mod report;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use sigscope_engine::{AudioBuffer, Pipeline, PipelineConfig, ProbeKind, ProcessSpec, Stage};
use std::time::Duration;

use cli::Args;
use report::Reporter;

/// Largest chunk handed to the pipeline per `process` call; device callbacks
/// are split into pieces of at most this many frames.
const MAX_CALLBACK_FRAMES: usize = 4096;

fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_device(args: &Args) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = &args.device {
        for d in host.output_devices()? {
            if d.name()? == *name {
                return Ok(d);
            }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device().ok_or_else(|| anyhow!("no default output device"))
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Closest range: sample-rate distance dominates, channel distance breaks ties.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = match req_ch {
            Some(c) => u64::from(ch.abs_diff(c)),
            None => 0,
        };
        let sr_pen = match req_sr {
            Some(sr) if (sr_min..=sr_max).contains(&sr) => 0,
            Some(sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            None => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;
    let pick_sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(pick_sr))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut pipeline: Pipeline,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = cfg.channels as usize;
    // Allocated here; the callback only reuses it.
    let mut buf = AudioBuffer::new(channels, MAX_CALLBACK_FRAMES);

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            for chunk in output.chunks_mut(MAX_CALLBACK_FRAMES * channels) {
                buf.set_len(chunk.len() / channels);
                buf.clear();
                pipeline.process(&mut buf);
                buf.write_interleaved(chunk, channels, |s| T::from_sample(s.clamp(-1.0, 1.0)));
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn run_realtime(args: &Args, pipeline_cfg: PipelineConfig) -> Result<()> {
    let device = pick_device(args)?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();

    if let Some(sr) = args.sample_rate {
        cfg.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(ch) = args.channels {
        cfg.channels = ch;
    }
    let sample_rate = f64::from(cfg.sample_rate.0);

    let (mut pipeline, controller) = Pipeline::new(pipeline_cfg)?;
    pipeline
        .prepare(&ProcessSpec {
            sample_rate,
            max_block_size: MAX_CALLBACK_FRAMES,
            num_channels: cfg.channels as usize,
        })
        .context("preparing pipeline for the device")?;

    log::info!("using device: {}", device.name()?);
    log::info!("stream config: {:?} (sample_format: {:?})", cfg, sample_format);
    if let Some(d) = args.duration {
        log::info!("auto-stop after {d} seconds");
    }
    println!("Press Ctrl+C to stop…\n");

    let err_fn = |e: cpal::StreamError| log::error!("[cpal] stream error: {e}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, pipeline, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, pipeline, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, pipeline, err_fn)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };

    let _reporter = Reporter::spawn(controller.analyser().clone(), controller.meter().clone(), sample_rate)?;
    stream.play()?;

    if let Some(d) = args.duration {
        std::thread::sleep(Duration::from_secs(d));
        return Ok(());
    }
    loop {
        std::thread::sleep(Duration::from_millis(500));
    }
}

/// Run the pipeline without a device and report the final spectrum.
fn run_offline(args: &Args, pipeline_cfg: PipelineConfig, seconds: f64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--render expects a positive number of seconds, got {seconds}");
    }
    let sample_rate = f64::from(args.sample_rate.unwrap_or(48_000));
    let channels = usize::from(args.channels.unwrap_or(2));
    let block = args.block.max(1);

    let (mut pipeline, controller) = Pipeline::new(pipeline_cfg)?;
    pipeline.prepare(&ProcessSpec { sample_rate, max_block_size: block, num_channels: channels })?;

    let total = (seconds * sample_rate).round() as usize;
    let mut buf = AudioBuffer::new(channels, block);
    let mut done = 0;
    let mut peak = 0.0_f32;
    while done < total {
        buf.set_len(block.min(total - done));
        buf.clear();
        pipeline.process(&mut buf);
        peak = peak.max(controller.meter().peak(0)?);
        done += buf.len();
    }
    log::info!(
        "rendered {done} frames at {sample_rate} Hz in blocks of {block}; output peak {:.3}",
        peak
    );

    let analyser = controller.analyser();
    if !analyser.is_active() {
        log::info!("analyser disabled, no spectrum");
        return Ok(());
    }
    let mut frame = vec![0.0_f32; analyser.frame_len()];
    for ch in 0..analyser.num_channels() {
        let probe = analyser.probe(ProbeKind::Frequency, ch)?;
        report::log_frame(analyser, controller.meter(), probe, &mut frame, sample_rate)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }

    let pipeline_cfg = args.pipeline_config()?;
    if let Some(first) = pipeline_cfg.sources.first() {
        log::info!(
            "source '{}': {:?} @ {:.1} Hz, gain {:+.1} dB{}",
            first.name,
            first.synth.waveform,
            first.synth.frequency_hz,
            first.gain_db,
            if first.synth.sweep.enabled { ", sweeping" } else { "" }
        );
    }

    match args.render {
        Some(seconds) => run_offline(&args, pipeline_cfg, seconds),
        None => run_realtime(&args, pipeline_cfg),
    }
}
