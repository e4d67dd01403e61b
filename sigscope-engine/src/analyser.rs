//! Fixed-block FFT analyser.
//!
//! Per channel and per completed block of `N = 2^order` samples:
//! 1. multiply by the window table
//! 2. real FFT (planned once at construction, scratch pre-allocated)
//! 3. magnitude frame: `|X[k]| · 2/Σw` for `k <= N/2`, mirrored above
//! 4. phase frame: `arg X[k]` for `k <= N/2`, negated mirror above
//! 5. publish both frames, plus the raw block as the waveform frame, to the
//!    channel's probes
//!
//! Only the last channel's publishes notify listeners; every channel stays
//! readable through the handle.
//!
//! The consumer controls two atomics: `enabled` (checked at the start of every
//! `process`, a disabled analyser does no work) and the window tag (the table and
//! its normalisation are rebuilt before the next block).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use sigscope_core::window::{self, WindowKind};

use crate::block::FixedBlockAccumulator;
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::config::AnalyserConfig;
use crate::error::{EngineError, Result};
use crate::probe::{FrameListener, FrameReady, NotifyHub, ProbeBank, ProbeId, ProbeKind};
use crate::shared::SharedSlot;
use crate::stage::{FixedBlockProcessor, Stage};

pub const MIN_ORDER: u32 = 4;
pub const MAX_ORDER: u32 = 16;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// State shared between the analyser and its handles.
#[derive(Debug)]
struct Controls {
    owner: u64,
    frame_len: usize,
    enabled: AtomicBool,
    window: AtomicU8,
    bank: SharedSlot<ProbeBank>,
    hubs: [Arc<NotifyHub>; ProbeKind::COUNT],
}

/// Per-block transform state; the accumulator drives it.
struct SpectrumCore {
    fft: Arc<dyn RealToComplex<f32>>,
    window_kind: WindowKind,
    window: Vec<f32>,
    norm: f32,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
    phase: Vec<f32>,
    bank: Arc<ProbeBank>,
    hubs: [Arc<NotifyHub>; ProbeKind::COUNT],
}

impl SpectrumCore {
    fn set_window(&mut self, kind: WindowKind) {
        let sum = window::fill(kind, &mut self.window);
        self.norm = window::amplitude_correction(sum);
        self.window_kind = kind;
    }
}

impl FixedBlockProcessor for SpectrumCore {
    fn process_block(&mut self, channel: usize, block: &[f32]) {
        let n = self.input.len();
        if block.len() != n || channel >= self.bank.num_channels() {
            return;
        }
        for ((x, &s), &w) in self.input.iter_mut().zip(block).zip(&self.window) {
            *x = s * w;
        }
        if self.fft.process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch).is_err() {
            return;
        }

        let norm = self.norm;
        for (k, c) in self.output.iter().enumerate() {
            self.magnitude[k] = c.norm() * norm;
            self.phase[k] = c.arg();
        }
        for k in n / 2 + 1..n {
            self.magnitude[k] = self.magnitude[n - k];
            self.phase[k] = -self.phase[n - k];
        }

        let last = channel + 1 == self.bank.num_channels();
        let frames = [
            (ProbeKind::Frequency, self.magnitude.as_slice()),
            (ProbeKind::Phase, self.phase.as_slice()),
            (ProbeKind::Waveform, block),
        ];
        for (kind, frame) in frames {
            if let Some(probe) = self.bank.get(kind, channel) {
                let generation = probe.write_frame(frame);
                if last {
                    self.hubs[kind.index()].notify(FrameReady { probe: probe.id(), generation });
                }
            }
        }
    }
}

/// Spectral analyser stage. Reads the buffer, never modifies it.
pub struct Analyser {
    controls: Arc<Controls>,
    order: u32,
    accumulator: FixedBlockAccumulator,
    core: SpectrumCore,
    was_enabled: bool,
}

impl Analyser {
    pub fn new(cfg: &AnalyserConfig) -> Result<Self> {
        cfg.validate()?;
        let n = 1_usize << cfg.order;
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let bank = Arc::new(ProbeBank::new(owner, 0, n));
        let hubs = ProbeKind::ALL.map(|kind| Arc::new(NotifyHub::new(owner, kind)));

        let mut core = SpectrumCore {
            input: fft.make_input_vec(),
            output: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            window_kind: cfg.window,
            window: vec![0.0; n],
            norm: 1.0,
            magnitude: vec![0.0; n],
            phase: vec![0.0; n],
            bank: Arc::clone(&bank),
            hubs: hubs.clone(),
        };
        core.set_window(cfg.window);

        let controls = Arc::new(Controls {
            owner,
            frame_len: n,
            enabled: AtomicBool::new(cfg.enabled),
            window: AtomicU8::new(cfg.window.to_u8()),
            bank: SharedSlot::new(bank),
            hubs,
        });

        Ok(Self {
            controls,
            order: cfg.order,
            accumulator: FixedBlockAccumulator::new(n),
            core,
            was_enabled: cfg.enabled,
        })
    }

    pub fn handle(&self) -> AnalyserHandle {
        AnalyserHandle { controls: Arc::clone(&self.controls) }
    }

    #[inline] pub fn order(&self) -> u32 { self.order }
    #[inline] pub fn frame_len(&self) -> usize { self.controls.frame_len }
    #[inline] pub fn owner(&self) -> u64 { self.controls.owner }

    /// Make the probes built by the last prepare visible to handles.
    pub fn publish(&self) {
        self.controls.bank.store(Arc::clone(&self.core.bank));
    }
}

impl Stage for Analyser {
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        spec.validate()?;
        let bank = Arc::new(ProbeBank::new(self.controls.owner, spec.num_channels, self.controls.frame_len));
        self.accumulator.prepare(spec.num_channels);
        self.core.bank = bank;
        log::debug!(
            "analyser {}: {} channels, {}-point FFT, {:?} window",
            self.controls.owner,
            spec.num_channels,
            self.controls.frame_len,
            self.core.window_kind
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.controls.enabled.load(Ordering::Relaxed) {
            self.was_enabled = false;
            return;
        }
        if !self.was_enabled {
            // stale partial block from before the pause
            self.accumulator.reset();
            self.was_enabled = true;
        }
        let tag = self.controls.window.load(Ordering::Relaxed);
        if tag != self.core.window_kind.to_u8() {
            self.core.set_window(WindowKind::from_u8(tag));
        }
        self.accumulator.push(buffer, &mut self.core);
    }

    fn reset(&mut self) {
        self.accumulator.reset();
    }
}

/// Consumer-side view of an [`Analyser`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AnalyserHandle {
    controls: Arc<Controls>,
}

impl AnalyserHandle {
    /// `2^order`, the length every frame buffer must have.
    #[inline] pub fn frame_len(&self) -> usize { self.controls.frame_len }
    #[inline] pub fn owner(&self) -> u64 { self.controls.owner }

    pub fn num_channels(&self) -> usize {
        self.controls.bank.load().num_channels()
    }

    /// Enabled and prepared for at least one channel.
    pub fn is_active(&self) -> bool {
        self.controls.enabled.load(Ordering::Relaxed) && self.num_channels() > 0
    }

    /// Takes effect at the start of the next `process` call.
    pub fn set_enabled(&self, enabled: bool) {
        self.controls.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Takes effect before the next analysed block.
    pub fn set_window(&self, kind: WindowKind) {
        self.controls.window.store(kind.to_u8(), Ordering::Relaxed);
    }

    pub fn window(&self) -> WindowKind {
        WindowKind::from_u8(self.controls.window.load(Ordering::Relaxed))
    }

    /// Whether `probe` belongs to this analyser.
    #[inline]
    pub fn owns_probe(&self, probe: &ProbeId) -> bool {
        probe.owner == self.controls.owner
    }

    /// Identity of the `kind` probe of `channel` in the current prepare cycle.
    pub fn probe(&self, kind: ProbeKind, channel: usize) -> Result<ProbeId> {
        let bank = self.controls.bank.load();
        if bank.num_channels() == 0 {
            return Err(EngineError::NotPrepared);
        }
        bank.get(kind, channel)
            .map(|p| p.id())
            .ok_or(EngineError::ChannelOutOfRange { channel, channels: bank.num_channels() })
    }

    /// Copy the latest frame of `probe`; rejects probes of other analysers.
    pub fn copy_frame(&self, probe: ProbeId, dest: &mut [f32]) -> Result<u64> {
        if !self.owns_probe(&probe) {
            return Err(EngineError::ForeignProbe(probe));
        }
        let bank = self.controls.bank.load();
        if bank.num_channels() == 0 {
            return Err(EngineError::NotPrepared);
        }
        bank.resolve(probe)?.copy_frame(dest)
    }

    /// Latest magnitude frame of `channel`; returns its generation.
    pub fn copy_frequency_frame(&self, dest: &mut [f32], channel: usize) -> Result<u64> {
        self.copy_kind(ProbeKind::Frequency, dest, channel)
    }

    /// Latest phase frame of `channel`; returns its generation.
    pub fn copy_phase_frame(&self, dest: &mut [f32], channel: usize) -> Result<u64> {
        self.copy_kind(ProbeKind::Phase, dest, channel)
    }

    /// Latest raw (unwindowed) block of `channel`; returns its generation.
    pub fn copy_waveform_frame(&self, dest: &mut [f32], channel: usize) -> Result<u64> {
        self.copy_kind(ProbeKind::Waveform, dest, channel)
    }

    fn copy_kind(&self, kind: ProbeKind, dest: &mut [f32], channel: usize) -> Result<u64> {
        let probe = self.probe(kind, channel)?;
        self.copy_frame(probe, dest)
    }

    /// Register for frame-ready notifications of `kind`. Notifications come from
    /// the last channel only and coalesce to one pending refresh, the newest.
    /// Fails once [`MAX_LISTENERS`](crate::probe::MAX_LISTENERS) are registered
    /// for `kind`.
    pub fn add_listener(&self, kind: ProbeKind) -> Result<FrameListener> {
        self.controls.hubs[kind.index()].register()
    }

    /// Consumes the listener either way; a foreign one is still dropped (and so
    /// unregistered from its own analyser) after the error is reported.
    pub fn remove_listener(&self, listener: FrameListener) -> Result<()> {
        if listener.owner() != self.controls.owner {
            return Err(EngineError::ForeignListener(listener.id()));
        }
        // Drop unregisters
        drop(listener);
        Ok(())
    }
}
