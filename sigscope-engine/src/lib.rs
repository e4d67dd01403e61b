//! sigscope engine — test-signal synthesis and fixed-block spectral analysis.
//!
//! Crate layout:
//! - [`stage`]    : `Stage` (prepare/process/reset) and `FixedBlockProcessor`
//! - [`buffer`]   : planar `AudioBuffer`, `ProcessSpec`
//! - [`block`]    : fixed-block accumulator (any chunking in, 2^order blocks out)
//! - [`synth`]    : 8-waveform oscillator and synthesis engine
//! - [`sweep`]    : block-rate frequency sweep (wrap / reverse)
//! - [`meter`]    : per-channel peak meter
//! - [`probe`]    : lock-free frame probes and coalescing notifications
//! - [`analyser`] : windowed FFT stage and its consumer handle
//! - [`source`]   : signal sources (synthesis / audio input) and their handles
//! - [`command`]  : UI → audio command queue
//! - [`registry`] : source registry, pairing and synchronisation
//! - [`pipeline`] : the composed pipeline and its `Controller`
//! - [`config`], [`error`]
//!
//! Threading: the [`Pipeline`] lives on the audio thread and never blocks,
//! allocates or logs inside `process`. Everything else the host touches
//! (the [`Controller`]: registry, analyser and meter handles) is consumer-side
//! and talks to the audio thread through command queues and atomics only.

pub mod analyser;
pub mod block;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod meter;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod shared;
pub mod source;
pub mod stage;
pub mod sweep;
pub mod synth;

// Re-export the common surface.
pub use analyser::{Analyser, AnalyserHandle};
pub use buffer::{AudioBuffer, ProcessSpec};
pub use config::{AnalyserConfig, PipelineConfig, SourceConfig, SweepConfig, SynthParams};
pub use error::{EngineError, Result};
pub use meter::{MeterHandle, PeakMeter};
pub use pipeline::{Controller, Pipeline};
pub use probe::{FrameListener, FrameReady, ProbeId, ProbeKind};
pub use registry::SourceRegistry;
pub use source::{Source, SourceHandle, SourceId, SourceMode};
pub use stage::Stage;
pub use sweep::SweepMode;
pub use synth::{Polarity, Waveform};
pub use sigscope_core::window::WindowKind;
