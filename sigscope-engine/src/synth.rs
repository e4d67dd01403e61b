//! Waveform synthesis.
//!
//! `Oscillator` produces one sample per call for eight waveform kinds.
//! `SynthesisEngine` wraps it with the sweep controller and a control-block
//! counter so the frequency set-point only moves on block boundaries.
//!
//! Notes:
//! - Phase is kept in f64 in [0, 1); the increment is `frequency / sample_rate`.
//! - Square and saw carry a PolyBLEP correction at each edge. Sine and triangle are
//!   continuous and left alone.
//! - Impulse and step are computed directly from the phase, without band-limiting.
//!   They alias at high fundamentals.
//! - Noise sources ignore the phase but it keeps advancing, so switching back to a
//!   periodic waveform does not jump.

use serde::{Deserialize, Serialize};
use sigscope_core::blep;
use sigscope_core::dsp::{sin01, wrap_phase01};
use sigscope_core::noise::{PinkNoise, WhiteNoise};

use crate::config::{SweepConfig, SynthParams};
use crate::sweep::SweepController;

/// Lowest frequency the oscillator will run at.
pub const MIN_FREQUENCY_HZ: f64 = 0.1;

const POSITION_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Saw,
    Impulse,
    Step,
    WhiteNoise,
    PinkNoise,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

#[inline]
fn triangle(p: f64) -> f64 {
    // peaks at p = 0.25, troughs at p = 0.75, 0 at p = 0
    let mut q = p + 0.25;
    if q >= 1.0 {
        q -= 1.0;
    }
    1.0 - 4.0 * (q - 0.5).abs()
}

/// Free-running oscillator state.
#[derive(Clone, Debug)]
pub struct Oscillator {
    phase: f64,
    frequency: f64,
    sample_rate: f64,
    waveform: Waveform,
    pulse_width: u32,
    polarity: Polarity,
    pre_delay_ms: f64,
    white: WhiteNoise,
    pink: PinkNoise,
}

impl Oscillator {
    pub fn new(seed: u64) -> Self {
        Self {
            phase: 0.0,
            frequency: 1000.0,
            sample_rate: 48_000.0,
            waveform: Waveform::Sine,
            pulse_width: 1,
            polarity: Polarity::Positive,
            pre_delay_ms: 0.0,
            white: WhiteNoise::new(seed),
            pink: PinkNoise::new(seed ^ 0x9E37_79B9_7F4A_7C15, 48_000.0),
        }
    }

    pub fn set_sample_rate(&mut self, sr: f64) {
        self.sample_rate = sr.max(1.0);
        self.pink.set_sample_rate(self.sample_rate as f32);
        self.set_frequency(self.frequency);
    }

    /// Clamped to `[MIN_FREQUENCY_HZ, sample_rate / 2)`; NaN falls back to the minimum.
    pub fn set_frequency(&mut self, hz: f64) {
        let nyquist = 0.499 * self.sample_rate;
        self.frequency = if hz.is_nan() { MIN_FREQUENCY_HZ } else { hz.clamp(MIN_FREQUENCY_HZ, nyquist.max(MIN_FREQUENCY_HZ)) };
    }

    #[inline] pub fn set_waveform(&mut self, w: Waveform) { self.waveform = w; }
    #[inline] pub fn set_pulse_width(&mut self, samples: u32) { self.pulse_width = samples.max(1); }
    #[inline] pub fn set_polarity(&mut self, p: Polarity) { self.polarity = p; }
    #[inline] pub fn set_pre_delay_ms(&mut self, ms: f64) { self.pre_delay_ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 }; }

    /// Hard-set phase; wrapped into [0, 1).
    #[inline] pub fn set_phase(&mut self, p: f64) { self.phase = wrap_phase01(p); }

    #[inline] pub fn phase(&self) -> f64 { self.phase }
    #[inline] pub fn frequency(&self) -> f64 { self.frequency }
    #[inline] pub fn sample_rate(&self) -> f64 { self.sample_rate }
    #[inline] pub fn waveform(&self) -> Waveform { self.waveform }

    /// Zero the phase and clear the pink filter state.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.pink.reset();
    }

    /// Advance one sample and return it.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let p = self.phase;
        let dt = self.frequency / self.sample_rate;
        let out = match self.waveform {
            Waveform::Sine => sin01(p),
            Waveform::Triangle => triangle(p) as f32,
            Waveform::Square => blep::square(p, dt) as f32,
            Waveform::Saw => blep::saw(p, dt) as f32,
            Waveform::Impulse => self.impulse(p),
            Waveform::Step => self.step(p),
            Waveform::WhiteNoise => self.white.next(),
            Waveform::PinkNoise => self.pink.next(),
        };
        self.phase = wrap_phase01(p + dt);
        out
    }

    /// Samples elapsed since the start of the current period, and the period length.
    ///
    /// Nudged by `POSITION_EPS` so accumulated phase error never moves a sample
    /// across an integer edge.
    #[inline]
    fn period_position(&self, p: f64) -> (f64, f64) {
        let period = self.sample_rate / self.frequency;
        let mut pos = p * period + POSITION_EPS;
        if pos >= period {
            pos -= period;
        }
        (pos, period)
    }

    /// Pre-delay in whole samples, at most one period.
    #[inline]
    fn edge_offset(&self, period: f64) -> f64 {
        (self.pre_delay_ms * 1e-3 * self.sample_rate).round().min(period)
    }

    // `pulse_width` samples at the pre-delay offset of each period.
    #[inline]
    fn impulse(&self, p: f64) -> f32 {
        let (pos, period) = self.period_position(p);
        let start = self.edge_offset(period);
        if pos >= start && pos < start + f64::from(self.pulse_width) {
            self.polarity.sign()
        } else {
            0.0
        }
    }

    // Rises at the pre-delay offset, falls half a period later.
    #[inline]
    fn step(&self, p: f64) -> f32 {
        let (pos, period) = self.period_position(p);
        let start = self.edge_offset(period);
        if pos >= start && pos < start + 0.5 * period {
            self.polarity.sign()
        } else {
            0.0
        }
    }
}

/// The part of a source's settings that synchronisation copies to its peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSnapshot {
    pub waveform: Waveform,
    pub frequency_hz: f64,
    pub sweep: SweepConfig,
}

impl From<&SynthParams> for SyncSnapshot {
    fn from(p: &SynthParams) -> Self {
        Self { waveform: p.waveform, frequency_hz: p.frequency_hz, sweep: p.sweep }
    }
}

/// Oscillator plus block-rate sweep.
#[derive(Clone, Debug)]
pub struct SynthesisEngine {
    osc: Oscillator,
    sweep: SweepController,
    /// Set-point while the sweep is inactive.
    base_frequency: f64,
    block_size: usize,
    block_pos: usize,
}

impl SynthesisEngine {
    /// `block_size` is the control block; the sweep advances once per block.
    pub fn new(params: &SynthParams, block_size: usize, seed: u64) -> Self {
        let block_size = block_size.max(1);
        let mut s = Self {
            osc: Oscillator::new(seed),
            sweep: SweepController::new(&params.sweep, block_size),
            base_frequency: params.frequency_hz,
            block_size,
            block_pos: 0,
        };
        s.apply_params(params);
        s
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.osc.set_sample_rate(sample_rate);
        self.sweep.prepare(sample_rate);
        self.osc.set_frequency(self.base_frequency);
        self.block_pos = 0;
    }

    /// Phase, sweep position and control counter back to zero.
    pub fn reset(&mut self) {
        self.osc.reset();
        self.sweep.reset();
        self.block_pos = 0;
    }

    /// Apply every parameter without touching phase or sweep position.
    pub fn apply_params(&mut self, params: &SynthParams) {
        self.osc.set_waveform(params.waveform);
        self.osc.set_pulse_width(params.pulse_width);
        self.osc.set_polarity(params.polarity);
        self.osc.set_pre_delay_ms(params.pre_delay_ms);
        self.sweep.configure(&params.sweep);
        self.set_frequency(params.frequency_hz);
    }

    /// Take over `snap`, then zero phase, sweep index and control counter as one step.
    /// Pulse width, polarity and pre-delay stay as they are.
    pub fn sync_and_reset(&mut self, snap: &SyncSnapshot) {
        self.osc.set_waveform(snap.waveform);
        self.sweep.configure(&snap.sweep);
        self.set_frequency(snap.frequency_hz);
        self.osc.set_phase(0.0);
        self.sweep.reset();
        self.block_pos = 0;
    }

    pub fn set_frequency(&mut self, hz: f64) {
        self.base_frequency = hz;
        if !self.sweep.is_active() {
            self.osc.set_frequency(hz);
        }
    }

    pub fn set_sweep(&mut self, cfg: &SweepConfig) {
        self.sweep.configure(cfg);
    }

    pub fn set_sweep_enabled(&mut self, enabled: bool) {
        self.sweep.set_enabled(enabled);
    }

    /// Restart the sweep from its first step. Phase is untouched; the new
    /// set-point applies from the next control block.
    pub fn reset_sweep(&mut self) {
        self.sweep.reset();
    }

    #[inline] pub fn oscillator(&self) -> &Oscillator { &self.osc }
    #[inline] pub fn oscillator_mut(&mut self) -> &mut Oscillator { &mut self.osc }
    #[inline] pub fn sweep(&self) -> &SweepController { &self.sweep }
    #[inline] pub fn block_size(&self) -> usize { self.block_size }

    /// Render `out.len()` samples, stepping the sweep at each control-block boundary.
    pub fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            if self.block_pos == 0 {
                self.control_tick();
            }
            *s = self.osc.next();
            self.block_pos += 1;
            if self.block_pos == self.block_size {
                self.block_pos = 0;
            }
        }
    }

    #[inline]
    fn control_tick(&mut self) {
        let target = self.sweep.step().unwrap_or(self.base_frequency);
        self.osc.set_frequency(target);
    }
}
