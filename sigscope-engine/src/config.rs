//! Explicit configuration values.
//!
//! Everything the hosting context wants to configure is a plain value passed to
//! [`Pipeline::new`](crate::pipeline::Pipeline::new); nothing here is global or
//! shared after construction. Live edits go through
//! [`SourceHandle`](crate::source::SourceHandle) commands instead.

use serde::{Deserialize, Serialize};
use sigscope_core::window::WindowKind;

use crate::analyser::{MAX_ORDER, MIN_ORDER};
use crate::error::{EngineError, Result};
use crate::source::SourceMode;
use crate::sweep::SweepMode;
use crate::synth::{Polarity, Waveform};

/// Per-source default capacity of the UI → audio command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Sweep bounds and policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration_s: f64,
    pub mode: SweepMode,
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_hz: 20.0,
            end_hz: 20_000.0,
            duration_s: 5.0,
            mode: SweepMode::Wrap,
            enabled: false,
        }
    }
}

/// The synthesis parameter set. This is also the unit that the
/// synchronisation trigger copies between sources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub frequency_hz: f64,
    pub sweep: SweepConfig,
    /// Impulse width in samples (at least 1).
    pub pulse_width: u32,
    pub polarity: Polarity,
    /// Offset of the impulse/step edge inside each period.
    pub pre_delay_ms: f64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency_hz: 1000.0,
            sweep: SweepConfig::default(),
            pulse_width: 1,
            polarity: Polarity::Positive,
            pre_delay_ms: 0.0,
        }
    }
}

/// One signal source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub name: String,
    pub mode: SourceMode,
    #[serde(flatten)]
    pub synth: SynthParams,
    pub gain_db: f32,
    pub muted: bool,
    pub inverted: bool,
    /// Control block in samples; the sweep advances once per block. Power of two.
    pub block_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "source".to_string(),
            mode: SourceMode::Synthesis,
            synth: SynthParams::default(),
            gain_db: -12.0,
            muted: false,
            inverted: false,
            block_size: 512,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(EngineError::InvalidConfig(format!(
                "source '{}': block_size {} is not a power of two",
                self.name, self.block_size
            )));
        }
        Ok(())
    }
}

/// Spectral analyser settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyserConfig {
    /// FFT size is `2^order`.
    pub order: u32,
    pub window: WindowKind,
    pub enabled: bool,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self { order: 12, window: WindowKind::Hann, enabled: true }
    }
}

impl AnalyserConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&self.order) {
            return Err(EngineError::InvalidOrder { order: self.order, min: MIN_ORDER, max: MAX_ORDER });
        }
        Ok(())
    }
}

/// Whole-pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<SourceConfig>,
    pub analyser: AnalyserConfig,
    pub command_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceConfig { name: "source-1".to_string(), ..SourceConfig::default() },
                SourceConfig { name: "source-2".to_string(), muted: true, ..SourceConfig::default() },
            ],
            analyser: AnalyserConfig::default(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.analyser.validate()?;
        for s in &self.sources {
            s.validate()?;
        }
        if self.command_capacity == 0 {
            return Err(EngineError::InvalidConfig("command_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_block() {
        let cfg = SourceConfig { block_size: 300, ..SourceConfig::default() };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_out_of_range_order() {
        let cfg = AnalyserConfig { order: 30, ..AnalyserConfig::default() };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidOrder { order: 30, .. })));
    }

    #[test]
    fn yaml_uses_snake_case_and_flattened_synth_fields() {
        let yaml = r#"
sources:
  - name: left
    waveform: pink_noise
    frequency_hz: 250.0
    sweep:
      start_hz: 100.0
      end_hz: 1000.0
      duration_s: 2.0
      mode: reverse
      enabled: true
analyser:
  order: 10
  window: blackman_harris
"#;
        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.sources.len(), 1);
        let s = &cfg.sources[0];
        assert_eq!(s.synth.waveform, Waveform::PinkNoise);
        assert_eq!(s.synth.sweep.mode, SweepMode::Reverse);
        assert_eq!(s.block_size, 512);
        assert_eq!(cfg.analyser.window, WindowKind::BlackmanHarris);
        assert!(cfg.analyser.enabled);
        assert!(cfg.validate().is_ok());
    }
}
