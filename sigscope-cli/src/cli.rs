//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sigscope_engine::{PipelineConfig, SweepConfig, SweepMode, Waveform};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sigscope")]
#[command(about = "Real-time test-signal generator with spectrum reporting", long_about = None)]
pub struct Args {
    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Output device name (default device if omitted)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Requested sample rate
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Requested channel count
    #[arg(long, value_name = "N")]
    pub channels: Option<u16>,

    /// Stop after this many seconds (real-time mode)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Pipeline configuration (YAML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Waveform of the first source: sine, triangle, square, saw, impulse, step, white_noise, pink_noise
    #[arg(long, value_name = "KIND", value_parser = parse_waveform)]
    pub waveform: Option<Waveform>,

    /// Frequency of the first source
    #[arg(long, value_name = "HZ")]
    pub frequency: Option<f64>,

    /// Output gain of the first source
    #[arg(long, value_name = "DB", allow_hyphen_values = true)]
    pub gain_db: Option<f32>,

    /// Enable a sweep on the first source: <start>:<end>:<seconds>
    #[arg(long, value_name = "START:END:SECS", value_parser = parse_sweep)]
    pub sweep: Option<(f64, f64, f64)>,

    /// Sweep boundary policy: wrap or reverse
    #[arg(long, value_name = "MODE", value_parser = parse_sweep_mode)]
    pub sweep_mode: Option<SweepMode>,

    /// Render offline for this many seconds instead of opening a device
    #[arg(long, value_name = "SECONDS")]
    pub render: Option<f64>,

    /// Chunk size for offline rendering
    #[arg(long, value_name = "FRAMES", default_value = "512")]
    pub block: usize,
}

impl Args {
    /// Load the YAML config (or defaults) and apply the first-source overrides.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };
        if cfg.sources.is_empty() {
            cfg.sources.push(Default::default());
        }

        let first = &mut cfg.sources[0];
        if let Some(w) = self.waveform {
            first.synth.waveform = w;
        }
        if let Some(hz) = self.frequency {
            first.synth.frequency_hz = hz;
        }
        if let Some(db) = self.gain_db {
            first.gain_db = db;
        }
        if let Some((start_hz, end_hz, duration_s)) = self.sweep {
            first.synth.sweep = SweepConfig {
                start_hz,
                end_hz,
                duration_s,
                mode: first.synth.sweep.mode,
                enabled: true,
            };
        }
        if let Some(mode) = self.sweep_mode {
            first.synth.sweep.mode = mode;
        }
        Ok(cfg)
    }
}

fn parse_waveform(s: &str) -> Result<Waveform, String> {
    serde_yaml::from_str(s).map_err(|_| format!("unknown waveform '{}'", s))
}

fn parse_sweep_mode(s: &str) -> Result<SweepMode, String> {
    serde_yaml::from_str(s).map_err(|_| format!("unknown sweep mode '{}' (wrap, reverse)", s))
}

fn parse_sweep(s: &str) -> Result<(f64, f64, f64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [a, b, c] = parts.as_slice() else {
        return Err(format!("expected START:END:SECS, got '{}'", s));
    };
    let num = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e));
    Ok((num(a)?, num(b)?, num(c)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_spec_parses() {
        assert_eq!(parse_sweep("20:20000:5"), Ok((20.0, 20000.0, 5.0)));
        assert!(parse_sweep("20:20000").is_err());
        assert!(parse_sweep("a:b:c").is_err());
    }

    #[test]
    fn enum_flags_use_config_names() {
        assert_eq!(parse_waveform("pink_noise"), Ok(Waveform::PinkNoise));
        assert_eq!(parse_sweep_mode("reverse"), Ok(SweepMode::Reverse));
        assert!(parse_waveform("pink").is_err());
    }

    #[test]
    fn overrides_touch_only_the_first_source() {
        let args = Args::parse_from([
            "sigscope",
            "--waveform",
            "saw",
            "--gain-db",
            "-3",
            "--sweep",
            "100:1000:2",
            "--sweep-mode",
            "reverse",
        ]);
        let cfg = args.pipeline_config().unwrap();
        let s = &cfg.sources[0];
        assert_eq!(s.synth.waveform, Waveform::Saw);
        assert_eq!(s.gain_db, -3.0);
        assert!(s.synth.sweep.enabled);
        assert_eq!(s.synth.sweep.mode, SweepMode::Reverse);
        assert_eq!(cfg.sources[1], PipelineConfig::default().sources[1]);
    }
}
