//! Pipeline: sources → output meter → analyser.
//!
//! The pipeline owns every audio-thread stage as a concrete field and calls them
//! in a fixed order. [`Pipeline::new`] also returns the [`Controller`], the
//! consumer-side bundle (source registry, analyser handle, output meter handle)
//! the hosting context keeps on its own thread.
//!
//! Flow per `process` call:
//! 1. the incoming buffer is kept as the audio input
//! 2. each source renders from a copy of it, results are summed
//! 3. the sum replaces the buffer; the meter and the analyser read it

use sigscope_core::dsp::mix_in_place;

use crate::analyser::{Analyser, AnalyserHandle};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::meter::{MeterHandle, PeakMeter};
use crate::registry::SourceRegistry;
use crate::source::{Source, SourceId};
use crate::stage::Stage;

/// Audio-thread half.
pub struct Pipeline {
    sources: Vec<Source>,
    meter: PeakMeter,
    analyser: Analyser,
    input: AudioBuffer,
    scratch: AudioBuffer,
    mix: AudioBuffer,
    spec: Option<ProcessSpec>,
}

/// Consumer-side half.
#[derive(Debug)]
pub struct Controller {
    registry: SourceRegistry,
    analyser: AnalyserHandle,
    meter: MeterHandle,
}

impl Controller {
    #[inline] pub fn registry(&self) -> &SourceRegistry { &self.registry }
    #[inline] pub fn registry_mut(&mut self) -> &mut SourceRegistry { &mut self.registry }
    #[inline] pub fn analyser(&self) -> &AnalyserHandle { &self.analyser }
    #[inline] pub fn meter(&self) -> &MeterHandle { &self.meter }
}

impl Pipeline {
    /// Build every stage from `cfg`. The first two sources are paired.
    pub fn new(cfg: PipelineConfig) -> Result<(Pipeline, Controller)> {
        cfg.validate()?;
        let mut registry = SourceRegistry::new();
        let mut sources = Vec::with_capacity(cfg.sources.len());
        for (i, sc) in cfg.sources.iter().enumerate() {
            let (source, handle) = Source::new(SourceId(i as u32), sc, cfg.command_capacity);
            registry.insert(handle);
            sources.push(source);
        }
        if sources.len() >= 2 {
            registry.pair(SourceId(0), SourceId(1))?;
        }

        let analyser = Analyser::new(&cfg.analyser)?;
        let meter = PeakMeter::new();
        let controller = Controller { registry, analyser: analyser.handle(), meter: meter.handle() };
        log::info!(
            "pipeline: {} source(s), {}-point FFT, {:?} window",
            sources.len(),
            analyser.frame_len(),
            cfg.analyser.window
        );

        let pipeline = Pipeline {
            sources,
            meter,
            analyser,
            input: AudioBuffer::new(0, 0),
            scratch: AudioBuffer::new(0, 0),
            mix: AudioBuffer::new(0, 0),
            spec: None,
        };
        Ok((pipeline, controller))
    }

    #[inline] pub fn spec(&self) -> Option<ProcessSpec> { self.spec }
    #[inline] pub fn is_prepared(&self) -> bool { self.spec.is_some() }
    #[inline] pub fn num_sources(&self) -> usize { self.sources.len() }
}

impl Stage for Pipeline {
    /// Validates first, so a rejected spec leaves the previous state in place.
    /// Handles see the new per-channel state only once every stage is rebuilt.
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        spec.validate()?;
        let channels = spec.num_channels;
        let frames = spec.max_block_size;

        for s in &mut self.sources {
            s.prepare(spec)?;
        }
        self.meter.prepare(spec)?;
        self.analyser.prepare(spec)?;
        self.input = AudioBuffer::new(channels, frames);
        self.scratch = AudioBuffer::new(channels, frames);
        self.mix = AudioBuffer::new(channels, frames);
        self.spec = Some(*spec);

        for s in &self.sources {
            s.publish();
        }
        self.meter.publish();
        self.analyser.publish();
        log::info!(
            "prepared: {} Hz, {} channel(s), up to {} frames per call",
            spec.sample_rate,
            channels,
            frames
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let Some(spec) = self.spec else {
            buffer.clear();
            return;
        };
        if buffer.num_channels() != spec.num_channels || buffer.len() > spec.max_block_size {
            buffer.clear();
            return;
        }

        self.input.copy_from(buffer);
        self.mix.set_len(buffer.len());
        self.mix.clear();
        for source in &mut self.sources {
            self.scratch.copy_from(&self.input);
            source.process(&mut self.scratch);
            for ch in 0..spec.num_channels {
                mix_in_place(self.mix.channel_mut(ch), self.scratch.channel(ch), 1.0);
            }
        }
        buffer.copy_from(&self.mix);

        self.meter.process(buffer);
        self.analyser.process(buffer);
    }

    fn reset(&mut self) {
        for s in &mut self.sources {
            s.reset();
        }
        self.meter.reset();
        self.analyser.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::error::EngineError;

    fn spec() -> ProcessSpec {
        ProcessSpec { sample_rate: 48_000.0, max_block_size: 512, num_channels: 2 }
    }

    #[test]
    fn unprepared_pipeline_is_silent() {
        let (mut p, c) = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut buf = AudioBuffer::new(2, 64);
        buf.channel_mut(0).fill(0.5);
        p.process(&mut buf);
        assert!(buf.channel(0).iter().all(|v| *v == 0.0));
        assert_eq!(c.meter().peak(0), Err(EngineError::NotPrepared));
    }

    #[test]
    fn channel_mismatch_is_silent() {
        let (mut p, _c) = Pipeline::new(PipelineConfig::default()).unwrap();
        p.prepare(&spec()).unwrap();
        let mut buf = AudioBuffer::new(1, 64);
        buf.channel_mut(0).fill(0.5);
        p.process(&mut buf);
        assert!(buf.channel(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn rejected_spec_keeps_previous_state() {
        let (mut p, c) = Pipeline::new(PipelineConfig::default()).unwrap();
        p.prepare(&spec()).unwrap();
        assert!(p.prepare(&ProcessSpec { num_channels: 0, ..spec() }).is_err());
        assert_eq!(p.spec(), Some(spec()));
        assert_eq!(c.analyser().num_channels(), 2);
    }

    #[test]
    fn sources_sum_and_meter_sees_the_mix() {
        let cfg = PipelineConfig {
            sources: vec![
                SourceConfig { gain_db: 0.0, ..SourceConfig::default() },
                SourceConfig { gain_db: 0.0, inverted: true, ..SourceConfig::default() },
            ],
            ..PipelineConfig::default()
        };
        let (mut p, c) = Pipeline::new(cfg).unwrap();
        p.prepare(&spec()).unwrap();
        let mut buf = AudioBuffer::new(2, 256);
        p.process(&mut buf);
        // identical sine, one inverted: cancels exactly
        assert!(buf.channel(0).iter().all(|v| *v == 0.0));
        assert_eq!(c.meter().peak(1).unwrap(), 0.0);
        assert_eq!(c.registry().peer(SourceId(0)), Some(SourceId(1)));
    }

    #[test]
    fn audio_in_source_passes_input_through() {
        let cfg = PipelineConfig {
            sources: vec![SourceConfig {
                mode: crate::source::SourceMode::AudioIn,
                gain_db: 0.0,
                ..SourceConfig::default()
            }],
            ..PipelineConfig::default()
        };
        let (mut p, c) = Pipeline::new(cfg).unwrap();
        p.prepare(&spec()).unwrap();
        let mut buf = AudioBuffer::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[0.25, -0.5, 0.0, 0.0]);
        p.process(&mut buf);
        assert_eq!(buf.channel(0), &[0.25, -0.5, 0.0, 0.0]);
        assert_eq!(c.meter().peak(0).unwrap(), 0.5);
    }
}
