//! Spectrum reporter: a consumer thread driven by the analyser's notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use sigscope_engine::{AnalyserHandle, MeterHandle, ProbeId, ProbeKind};

const LOG_INTERVAL: Duration = Duration::from_millis(500);
const WAIT: Duration = Duration::from_millis(100);

/// Strongest bin in `1..N/2` with its magnitude. DC and the Nyquist half are skipped.
pub fn dominant_bin(mag: &[f32]) -> Option<(usize, f32)> {
    let half = mag.len() / 2;
    mag.get(1..half)?
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i + 1, v)),
        })
}

/// Log one line for the frame behind `probe`.
pub fn log_frame(
    analyser: &AnalyserHandle,
    meter: &MeterHandle,
    probe: ProbeId,
    frame: &mut [f32],
    sample_rate: f64,
) -> Result<()> {
    let generation = analyser.copy_frame(probe, frame)?;
    let Some((bin, mag)) = dominant_bin(frame) else {
        return Ok(());
    };
    let hz = bin as f64 * sample_rate / frame.len() as f64;
    let peak_db = meter.peak_db(0).unwrap_or(f32::NEG_INFINITY);
    log::info!(
        "[spectrum] frame {:>6} ch{} | bin {:>5} ~ {:>8.1} Hz | mag {:.3} ({:+.1} dBFS) | out peak {:+.1} dB",
        generation,
        probe.channel,
        bin,
        hz,
        mag,
        20.0 * mag.max(1e-6).log10(),
        peak_db
    );
    Ok(())
}

/// Background reporter; stops and joins on drop.
pub struct Reporter {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl Reporter {
    pub fn spawn(analyser: AnalyserHandle, meter: MeterHandle, sample_rate: f64) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let listener = analyser.add_listener(ProbeKind::Frequency)?;
        let join = thread::Builder::new().name("sigscope-report".into()).spawn(move || {
            let mut frame = vec![0.0_f32; analyser.frame_len()];
            let mut last: Option<Instant> = None;
            while !flag.load(Ordering::Acquire) {
                let Some(ready) = listener.wait_timeout(WAIT) else { continue };
                if last.is_some_and(|t| t.elapsed() < LOG_INTERVAL) {
                    continue;
                }
                last = Some(Instant::now());
                if let Err(e) = log_frame(&analyser, &meter, ready.probe, &mut frame, sample_rate) {
                    log::warn!("[spectrum] {e}");
                }
            }
            log::debug!("reporter stopped");
        })?;
        Ok(Self { stop, join: Some(join) })
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_bin_skips_dc_and_upper_half() {
        let mut mag = vec![0.0_f32; 16];
        mag[0] = 5.0;
        mag[12] = 9.0;
        mag[3] = 0.7;
        mag[5] = 0.2;
        assert_eq!(dominant_bin(&mag), Some((3, 0.7)));
    }

    #[test]
    fn dominant_bin_of_tiny_frame() {
        assert_eq!(dominant_bin(&[1.0]), None);
        assert_eq!(dominant_bin(&[]), None);
    }
}
