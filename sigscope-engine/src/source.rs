//! Signal sources.
//!
//! A [`Source`] is the audio-thread half: it owns a synthesis engine, the
//! audio-input routing matrix and the output stage, and drains its command
//! queue at the start of every `process` call. A [`SourceHandle`] is the UI
//! half: it pushes commands and keeps a shadow copy of the settings so that
//! queries and synchronisation never read audio-thread state.
//!
//! Output stage, applied after the mode's signal is produced:
//! `out = signal · gain · (inverted ? -1 : 1)`, or silence when muted.

use std::fmt;

use serde::{Deserialize, Serialize};
use sigscope_core::dsp::{db_to_lin, mix_in_place, scale_in_place};

use crate::buffer::{AudioBuffer, ProcessSpec, MAX_CHANNELS};
use crate::command::{command_channel, CommandReceiver, CommandSender, SourceCommand};
use crate::config::{SourceConfig, SweepConfig};
use crate::error::{EngineError, Result};
use crate::meter::{MeterHandle, PeakMeter};
use crate::stage::Stage;
use crate::synth::{Polarity, SyncSnapshot, SynthesisEngine, Waveform};

/// Registry key of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Oscillator output on every channel.
    #[default]
    Synthesis,
    /// Incoming channels, per-input gain, routed by bitmask.
    AudioIn,
}

/// Input `i` feeds output `i`.
#[inline]
fn identity_route(input: usize) -> u64 {
    1u64 << input
}

/// Audio-thread half of a source.
pub struct Source {
    id: SourceId,
    mode: SourceMode,
    engine: SynthesisEngine,
    gain: f32,
    muted: bool,
    inverted: bool,
    input_gains: [f32; MAX_CHANNELS],
    routing: [u64; MAX_CHANNELS],
    input_meter: PeakMeter,
    commands: CommandReceiver,
    mono: Vec<f32>,
    routed: AudioBuffer,
    prepared: bool,
}

impl Source {
    /// Build both halves. `capacity` bounds the number of queued edits.
    pub fn new(id: SourceId, cfg: &SourceConfig, capacity: usize) -> (Source, SourceHandle) {
        let (tx, rx) = command_channel(capacity);
        let seed = 0x5167_5C09_E000_0000_u64 ^ u64::from(id.0);
        let input_meter = PeakMeter::new();
        let handle = SourceHandle {
            id,
            config: cfg.clone(),
            input_gains_db: [0.0; MAX_CHANNELS],
            routing: std::array::from_fn(identity_route),
            commands: tx,
            input_levels: input_meter.handle(),
        };
        let source = Source {
            id,
            mode: cfg.mode,
            engine: SynthesisEngine::new(&cfg.synth, cfg.block_size, seed),
            gain: db_to_lin(cfg.gain_db),
            muted: cfg.muted,
            inverted: cfg.inverted,
            input_gains: [1.0; MAX_CHANNELS],
            routing: std::array::from_fn(identity_route),
            input_meter,
            commands: rx,
            mono: Vec::new(),
            routed: AudioBuffer::new(0, 0),
            prepared: false,
        };
        (source, handle)
    }

    #[inline] pub fn id(&self) -> SourceId { self.id }
    #[inline] pub fn mode(&self) -> SourceMode { self.mode }
    #[inline] pub fn engine(&self) -> &SynthesisEngine { &self.engine }

    /// Make the input meter built by the last prepare visible to the handle.
    pub fn publish(&self) {
        self.input_meter.publish();
    }

    /// Apply every queued command. Audio thread, start of `process`.
    pub fn apply_pending(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: SourceCommand) {
        match cmd {
            SourceCommand::SetMode(m) => self.mode = m,
            SourceCommand::SetWaveform(w) => self.engine.oscillator_mut().set_waveform(w),
            SourceCommand::SetFrequency(hz) => self.engine.set_frequency(hz),
            SourceCommand::SetPulseWidth(n) => self.engine.oscillator_mut().set_pulse_width(n),
            SourceCommand::SetPolarity(p) => self.engine.oscillator_mut().set_polarity(p),
            SourceCommand::SetPreDelayMs(ms) => self.engine.oscillator_mut().set_pre_delay_ms(ms),
            SourceCommand::SetSweep(cfg) => self.engine.set_sweep(&cfg),
            SourceCommand::SetSweepEnabled(on) => self.engine.set_sweep_enabled(on),
            SourceCommand::ResetSweep => self.engine.reset_sweep(),
            SourceCommand::SetGainDb(db) => self.gain = db_to_lin(db),
            SourceCommand::SetMuted(m) => self.muted = m,
            SourceCommand::SetInverted(i) => self.inverted = i,
            SourceCommand::SetInputGainDb { channel, gain_db } => {
                if let Some(g) = self.input_gains.get_mut(channel) {
                    *g = db_to_lin(gain_db);
                }
            }
            SourceCommand::SetRouting { input, mask } => {
                if let Some(r) = self.routing.get_mut(input) {
                    *r = mask;
                }
            }
            SourceCommand::SyncAndReset(snap) => self.engine.sync_and_reset(&snap),
        }
    }

    #[inline]
    fn output_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else if self.inverted {
            -self.gain
        } else {
            self.gain
        }
    }

    fn render_synthesis(&mut self, buffer: &mut AudioBuffer) {
        let n = buffer.len();
        let mono = &mut self.mono[..n];
        self.engine.render(mono);
        for ch in 0..buffer.num_channels() {
            buffer.channel_mut(ch).copy_from_slice(mono);
        }
    }

    fn render_audio_in(&mut self, buffer: &mut AudioBuffer) {
        self.input_meter.measure(buffer);
        let channels = buffer.num_channels();
        self.routed.set_len(buffer.len());
        self.routed.clear();
        for input in 0..channels {
            let g = self.input_gains[input];
            let mask = self.routing[input];
            for out in 0..channels {
                if mask & (1u64 << out) != 0 {
                    mix_in_place(self.routed.channel_mut(out), buffer.channel(input), g);
                }
            }
        }
        buffer.copy_from(&self.routed);
    }
}

impl Stage for Source {
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        spec.validate()?;
        self.engine.prepare(spec.sample_rate);
        self.mono = vec![0.0; spec.max_block_size];
        self.routed = AudioBuffer::new(spec.num_channels, spec.max_block_size);
        self.input_meter.prepare(spec)?;
        self.prepared = true;
        Ok(())
    }

    /// Replace the buffer contents with this source's output. In `AudioIn` mode the
    /// incoming contents are the input.
    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.apply_pending();
        if !self.prepared || buffer.len() > self.mono.len() || buffer.num_channels() > self.routed.num_channels() {
            buffer.clear();
            return;
        }
        match self.mode {
            SourceMode::Synthesis => self.render_synthesis(buffer),
            SourceMode::AudioIn => self.render_audio_in(buffer),
        }
        let g = self.output_gain();
        for ch in 0..buffer.num_channels() {
            scale_in_place(buffer.channel_mut(ch), g);
        }
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.input_meter.reset();
    }
}

/// UI half of a source.
#[derive(Debug)]
pub struct SourceHandle {
    id: SourceId,
    config: SourceConfig,
    input_gains_db: [f32; MAX_CHANNELS],
    routing: [u64; MAX_CHANNELS],
    commands: CommandSender,
    input_levels: MeterHandle,
}

impl SourceHandle {
    #[inline] pub fn id(&self) -> SourceId { self.id }
    #[inline] pub fn name(&self) -> &str { &self.config.name }
    /// Last settings accepted by the queue.
    #[inline] pub fn config(&self) -> &SourceConfig { &self.config }
    /// Per-input peak levels (audio-input mode).
    #[inline] pub fn input_levels(&self) -> &MeterHandle { &self.input_levels }

    pub fn input_gain_db(&self, channel: usize) -> Option<f32> {
        self.input_gains_db.get(channel).copied()
    }

    pub fn routing(&self, input: usize) -> Option<u64> {
        self.routing.get(input).copied()
    }

    /// Settings that synchronisation copies from this source.
    pub fn sync_snapshot(&self) -> SyncSnapshot {
        SyncSnapshot::from(&self.config.synth)
    }

    fn send(&mut self, cmd: SourceCommand) -> Result<()> {
        self.commands.push(cmd).map_err(|_| EngineError::CommandQueueFull(self.id))
    }

    pub fn set_mode(&mut self, mode: SourceMode) -> Result<()> {
        self.send(SourceCommand::SetMode(mode))?;
        self.config.mode = mode;
        Ok(())
    }

    pub fn set_waveform(&mut self, w: Waveform) -> Result<()> {
        self.send(SourceCommand::SetWaveform(w))?;
        self.config.synth.waveform = w;
        Ok(())
    }

    pub fn set_frequency(&mut self, hz: f64) -> Result<()> {
        self.send(SourceCommand::SetFrequency(hz))?;
        self.config.synth.frequency_hz = hz;
        Ok(())
    }

    pub fn set_pulse_width(&mut self, samples: u32) -> Result<()> {
        self.send(SourceCommand::SetPulseWidth(samples))?;
        self.config.synth.pulse_width = samples.max(1);
        Ok(())
    }

    pub fn set_polarity(&mut self, p: Polarity) -> Result<()> {
        self.send(SourceCommand::SetPolarity(p))?;
        self.config.synth.polarity = p;
        Ok(())
    }

    pub fn set_pre_delay_ms(&mut self, ms: f64) -> Result<()> {
        self.send(SourceCommand::SetPreDelayMs(ms))?;
        self.config.synth.pre_delay_ms = ms;
        Ok(())
    }

    pub fn set_sweep(&mut self, sweep: SweepConfig) -> Result<()> {
        self.send(SourceCommand::SetSweep(sweep))?;
        self.config.synth.sweep = sweep;
        Ok(())
    }

    pub fn set_sweep_enabled(&mut self, enabled: bool) -> Result<()> {
        self.send(SourceCommand::SetSweepEnabled(enabled))?;
        self.config.synth.sweep.enabled = enabled;
        Ok(())
    }

    pub fn reset_sweep(&mut self) -> Result<()> {
        self.send(SourceCommand::ResetSweep)
    }

    pub fn set_gain_db(&mut self, db: f32) -> Result<()> {
        self.send(SourceCommand::SetGainDb(db))?;
        self.config.gain_db = db;
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.send(SourceCommand::SetMuted(muted))?;
        self.config.muted = muted;
        Ok(())
    }

    pub fn set_inverted(&mut self, inverted: bool) -> Result<()> {
        self.send(SourceCommand::SetInverted(inverted))?;
        self.config.inverted = inverted;
        Ok(())
    }

    pub fn set_input_gain_db(&mut self, channel: usize, gain_db: f32) -> Result<()> {
        if channel >= MAX_CHANNELS {
            return Err(EngineError::ChannelOutOfRange { channel, channels: MAX_CHANNELS });
        }
        self.send(SourceCommand::SetInputGainDb { channel, gain_db })?;
        self.input_gains_db[channel] = gain_db;
        Ok(())
    }

    pub fn set_routing(&mut self, input: usize, mask: u64) -> Result<()> {
        if input >= MAX_CHANNELS {
            return Err(EngineError::ChannelOutOfRange { channel: input, channels: MAX_CHANNELS });
        }
        self.send(SourceCommand::SetRouting { input, mask })?;
        self.routing[input] = mask;
        Ok(())
    }

    /// Queue a synchronisation from a peer's snapshot.
    pub fn sync_from(&mut self, snap: SyncSnapshot) -> Result<()> {
        self.send(SourceCommand::SyncAndReset(snap))?;
        self.config.synth.waveform = snap.waveform;
        self.config.synth.frequency_hz = snap.frequency_hz;
        self.config.synth.sweep = snap.sweep;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(channels: usize) -> ProcessSpec {
        ProcessSpec { sample_rate: 48_000.0, max_block_size: 256, num_channels: channels }
    }

    fn source(cfg: SourceConfig, channels: usize) -> (Source, SourceHandle) {
        let (mut s, h) = Source::new(SourceId(0), &cfg, 16);
        s.prepare(&spec(channels)).unwrap();
        s.publish();
        (s, h)
    }

    #[test]
    fn synthesis_writes_every_channel_with_gain() {
        let cfg = SourceConfig { gain_db: -6.0, ..SourceConfig::default() };
        let (mut s, _h) = source(cfg, 2);
        let mut buf = AudioBuffer::new(2, 256);
        s.process(&mut buf);
        assert_eq!(buf.channel(0), buf.channel(1));
        let peak = sigscope_core::dsp::peak_abs(buf.channel(0));
        assert!((peak - db_to_lin(-6.0)).abs() < 0.01, "peak {}", peak);
    }

    #[test]
    fn edits_apply_at_next_process() {
        let (mut s, mut h) = source(SourceConfig { gain_db: 0.0, ..SourceConfig::default() }, 1);
        h.set_muted(true).unwrap();
        assert!(h.config().muted);
        let mut buf = AudioBuffer::new(1, 64);
        s.process(&mut buf);
        assert!(buf.channel(0).iter().all(|v| *v == 0.0));

        h.set_muted(false).unwrap();
        h.set_inverted(true).unwrap();
        h.set_waveform(Waveform::Step).unwrap();
        s.process(&mut buf);
        assert!(buf.channel(0).iter().all(|v| *v <= 0.0));
        assert!(buf.channel(0).iter().any(|v| *v == -1.0));
    }

    #[test]
    fn full_queue_reports_and_keeps_shadow() {
        let (_s, mut h) = Source::new(SourceId(3), &SourceConfig::default(), 1);
        h.set_frequency(100.0).unwrap();
        assert_eq!(h.set_frequency(200.0), Err(EngineError::CommandQueueFull(SourceId(3))));
        assert_eq!(h.config().synth.frequency_hz, 100.0);
    }

    #[test]
    fn audio_in_routes_and_meters() {
        let cfg = SourceConfig { mode: SourceMode::AudioIn, gain_db: 0.0, ..SourceConfig::default() };
        let (mut s, mut h) = source(cfg, 2);
        // input 0 -> outputs 0 and 1, input 1 muted and unrouted
        h.set_routing(0, 0b11).unwrap();
        h.set_routing(1, 0).unwrap();
        h.set_input_gain_db(0, -120.0).unwrap();
        h.set_input_gain_db(0, 0.0).unwrap();

        let mut buf = AudioBuffer::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[0.5, -0.25, 0.0, 0.125]);
        buf.channel_mut(1).copy_from_slice(&[0.9, 0.9, 0.9, 0.9]);
        s.process(&mut buf);
        assert_eq!(buf.channel(0), &[0.5, -0.25, 0.0, 0.125]);
        assert_eq!(buf.channel(1), &[0.5, -0.25, 0.0, 0.125]);

        let levels = h.input_levels();
        assert_eq!(levels.peak(0).unwrap(), 0.5);
        assert_eq!(levels.peak(1).unwrap(), 0.9);
    }

    #[test]
    fn default_routing_is_identity() {
        let cfg = SourceConfig { mode: SourceMode::AudioIn, gain_db: 0.0, ..SourceConfig::default() };
        let (mut s, h) = source(cfg, 2);
        assert_eq!(h.routing(1), Some(0b10));
        let mut buf = AudioBuffer::new(2, 2);
        buf.channel_mut(0).copy_from_slice(&[0.1, 0.2]);
        buf.channel_mut(1).copy_from_slice(&[0.3, 0.4]);
        s.process(&mut buf);
        assert_eq!(buf.channel(0), &[0.1, 0.2]);
        assert_eq!(buf.channel(1), &[0.3, 0.4]);
    }

    #[test]
    fn unprepared_source_is_silent() {
        let (mut s, _h) = Source::new(SourceId(0), &SourceConfig::default(), 4);
        let mut buf = AudioBuffer::new(1, 8);
        buf.channel_mut(0).fill(1.0);
        s.process(&mut buf);
        assert!(buf.channel(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn sync_snapshot_reflects_shadow() {
        let (_s, mut h) = Source::new(SourceId(0), &SourceConfig::default(), 8);
        h.set_waveform(Waveform::Triangle).unwrap();
        h.set_frequency(321.0).unwrap();
        let snap = h.sync_snapshot();
        assert_eq!(snap.waveform, Waveform::Triangle);
        assert_eq!(snap.frequency_hz, 321.0);
    }
}
