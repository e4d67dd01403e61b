//! Block-rate frequency sweep controller.
//!
//! The sweep walks a set-point through `num_steps` linearly spaced frequencies
//! between `start_hz` and `end_hz`, one step per control block. With
//! `num_steps = floor(duration · sample_rate / block_size)` one traversal takes
//! (up to block rounding) `duration` seconds.
//!
//! Boundary policy
//! - `Wrap`    : `0, 1, …, n-1, 0, 1, …`
//! - `Reverse` : `0, 1, …, n-1, n-2, …, 0, 1, …` (each end visited once)
//!
//! A step count of zero (degenerate duration, zero sample rate, NaN input) leaves
//! the sweep inactive instead of dividing by it. `0 <= step_index < num_steps`
//! holds whenever `num_steps > 0`.

use serde::{Deserialize, Serialize};
use sigscope_core::dsp::lerp64;

use crate::config::SweepConfig;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Ping-pong between the bounds.
    Reverse,
    /// Jump back to the start after the last step.
    #[default]
    Wrap,
}

/// Number of sweep steps for a duration; 0 means "cannot sweep".
pub fn num_steps_for(duration_s: f64, sample_rate: f64, block_size: usize) -> u64 {
    if block_size == 0 {
        return 0;
    }
    let n = (duration_s * sample_rate / block_size as f64).floor();
    if n.is_finite() && n >= 1.0 {
        n as u64
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct SweepController {
    start_hz: f64,
    end_hz: f64,
    duration_s: f64,
    mode: SweepMode,
    enabled: bool,
    sample_rate: f64,
    block_size: usize,
    num_steps: u64,
    step_index: u64,
    /// +1 or -1
    step_delta: i64,
}

impl SweepController {
    pub fn new(cfg: &SweepConfig, block_size: usize) -> Self {
        let mut s = Self {
            start_hz: cfg.start_hz,
            end_hz: cfg.end_hz,
            duration_s: cfg.duration_s,
            mode: cfg.mode,
            enabled: cfg.enabled,
            sample_rate: 0.0,
            block_size,
            num_steps: 0,
            step_index: 0,
            step_delta: 1,
        };
        s.recalc();
        s
    }

    /// Recompute the step count for a new sample rate (prepare event).
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.recalc();
    }

    /// Replace every sweep setting at once. Position is kept when still in range.
    pub fn configure(&mut self, cfg: &SweepConfig) {
        self.start_hz = cfg.start_hz;
        self.end_hz = cfg.end_hz;
        self.duration_s = cfg.duration_s;
        self.enabled = cfg.enabled;
        self.set_mode(cfg.mode);
        self.recalc();
    }

    pub fn set_duration(&mut self, duration_s: f64) {
        self.duration_s = duration_s;
        self.recalc();
    }

    pub fn set_mode(&mut self, mode: SweepMode) {
        self.mode = mode;
        if mode == SweepMode::Wrap {
            self.step_delta = 1;
        }
    }

    /// Toggling only gates whether the set-point advances; the position is kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Back to step 0, moving upwards.
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.step_delta = 1;
    }

    #[inline] pub fn is_enabled(&self) -> bool { self.enabled }
    #[inline] pub fn is_active(&self) -> bool { self.enabled && self.num_steps > 0 }
    #[inline] pub fn num_steps(&self) -> u64 { self.num_steps }
    #[inline] pub fn step_index(&self) -> u64 { self.step_index }
    #[inline] pub fn mode(&self) -> SweepMode { self.mode }

    /// Set-point at the current step.
    pub fn current_frequency(&self) -> f64 {
        if self.num_steps <= 1 {
            return self.start_hz;
        }
        let t = self.step_index as f64 / (self.num_steps - 1) as f64;
        lerp64(self.start_hz, self.end_hz, t)
    }

    /// Called once per control block: returns the set-point for this block and
    /// advances, or `None` when the sweep is inactive.
    pub fn step(&mut self) -> Option<f64> {
        if !self.is_active() {
            return None;
        }
        let f = self.current_frequency();
        self.advance();
        Some(f)
    }

    fn advance(&mut self) {
        let n = self.num_steps;
        if n <= 1 {
            self.step_index = 0;
            return;
        }
        let last = n - 1;
        match self.mode {
            SweepMode::Wrap => {
                self.step_index = if self.step_index >= last { 0 } else { self.step_index + 1 };
            }
            SweepMode::Reverse => {
                if self.step_delta > 0 && self.step_index >= last {
                    self.step_delta = -1;
                } else if self.step_delta < 0 && self.step_index == 0 {
                    self.step_delta = 1;
                }
                self.step_index = if self.step_delta > 0 { self.step_index + 1 } else { self.step_index - 1 };
            }
        }
    }

    fn recalc(&mut self) {
        self.num_steps = num_steps_for(self.duration_s, self.sample_rate, self.block_size);
        if self.num_steps == 0 || self.step_index >= self.num_steps {
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(mode: SweepMode, steps: u64) -> SweepController {
        // 1 block per "second" so duration == steps
        let cfg = SweepConfig { start_hz: 100.0, end_hz: 200.0, duration_s: steps as f64, mode, enabled: true };
        let mut s = SweepController::new(&cfg, 1);
        s.prepare(1.0);
        s
    }

    fn indices(s: &mut SweepController, count: usize) -> Vec<u64> {
        (0..count)
            .map(|_| {
                let i = s.step_index();
                s.step();
                i
            })
            .collect()
    }

    #[test]
    fn wrap_cycles() {
        let mut s = controller(SweepMode::Wrap, 4);
        assert_eq!(indices(&mut s, 10), vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn reverse_ping_pongs() {
        let mut s = controller(SweepMode::Reverse, 4);
        assert_eq!(indices(&mut s, 12), vec![0, 1, 2, 3, 2, 1, 0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn single_step_stays_put() {
        let mut s = controller(SweepMode::Reverse, 1);
        assert_eq!(indices(&mut s, 3), vec![0, 0, 0]);
        assert_eq!(s.step(), Some(100.0));
    }

    #[test]
    fn endpoints_hit_bounds() {
        let mut s = controller(SweepMode::Wrap, 5);
        let freqs: Vec<f64> = (0..5).filter_map(|_| s.step()).collect();
        assert_eq!(freqs.first(), Some(&100.0));
        assert_eq!(freqs.last(), Some(&200.0));
        assert!((freqs[2] - 150.0).abs() < 1e-9);
    }

    #[test]
    fn step_count_is_deterministic() {
        assert_eq!(num_steps_for(5.0, 48_000.0, 512), 468);
        assert_eq!(num_steps_for(5.0, 48_000.0, 512), num_steps_for(5.0, 48_000.0, 512));
        assert_eq!(num_steps_for(1.0, 44_100.0, 4096), 10);
    }

    #[test]
    fn degenerate_duration_disables() {
        assert_eq!(num_steps_for(0.0, 48_000.0, 512), 0);
        assert_eq!(num_steps_for(-1.0, 48_000.0, 512), 0);
        assert_eq!(num_steps_for(f64::NAN, 48_000.0, 512), 0);
        assert_eq!(num_steps_for(0.001, 48_000.0, 512), 0);

        let cfg = SweepConfig { duration_s: 0.0, enabled: true, ..SweepConfig::default() };
        let mut s = SweepController::new(&cfg, 512);
        s.prepare(48_000.0);
        assert!(s.is_enabled());
        assert!(!s.is_active());
        assert_eq!(s.step(), None);
    }

    #[test]
    fn shrinking_duration_keeps_index_in_range() {
        let mut s = controller(SweepMode::Wrap, 10);
        for _ in 0..8 {
            s.step();
        }
        s.set_duration(3.0);
        assert!(s.step_index() < s.num_steps());
    }

    #[test]
    fn switching_to_wrap_restores_upward_direction() {
        let mut s = controller(SweepMode::Reverse, 3);
        indices(&mut s, 4); // now heading down
        s.set_mode(SweepMode::Wrap);
        let next = indices(&mut s, 3);
        assert_eq!(next, vec![1, 2, 0]);
    }
}
