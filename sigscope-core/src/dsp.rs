//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximation for the oscillator sine
//! - Side effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] pub(crate) fn m_sin64(x: f64) -> f64 { libm::sin(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] pub(crate) fn m_sin64(x: f64) -> f64 { x.sin() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// 2π in double precision, for phase accumulators.
pub const TAU64: f64 = 2.0 * core::f64::consts::PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Floor of the dB scale; anything quieter reads as this value.
pub const DB_FLOOR: f32 = -120.0;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

/// Linear interpolation in double precision, used for sweep set-points.
#[inline]
pub fn lerp64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(p: f64) -> f64 {
    let w = p - p.floor();
    // `p - floor(p)` can round up to exactly 1.0 for tiny negative inputs
    if w >= 1.0 { 0.0 } else { w }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= DB_FLOOR { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20 ≈ 0.115129...
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { DB_FLOOR }
    else { (8.685889638065036553_f32 * m_ln(lin)).max(DB_FLOOR) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Sine of a normalized phase in [0, 1).
///
/// With `fast-math` a 7th-order odd polynomial on the range-reduced argument is used
/// (max abs error ~1e-4 over [-π, π]); otherwise the backend sine in double precision.
#[inline]
pub fn sin01(phase01: f64) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // map [0,1) to [-π, π)
            let mut xr = (phase01 as f32) * TAU;
            if xr > PI { xr -= TAU; }
            let x2 = xr * xr;
            let x3 = x2 * xr;
            xr
                + (-1.0 / 6.0) * x3
                + (1.0 / 120.0) * x3 * x2
                + (-1.0 / 5040.0) * x3 * x2 * x2
        } else {
            m_sin64(TAU64 * phase01) as f32
        }
    }
}

// --------------------------------- Exponentials ----------------------------------

/// Convert cutoff in Hz to a simple one-pole (non-TPT) coefficient `exp(-2π fc / sr)`.
/// Cutoff is clamped to [0, 0.499·sr].
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-2.0 * PI * fc / sr)
}

// --------------------------------- Block helpers ---------------------------------

/// Largest absolute sample value in `block` (0.0 for an empty block).
#[inline]
pub fn peak_abs(block: &[f32]) -> f32 {
    block.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()))
}

/// In-place scale: `dst[i] *= gain`.
#[inline]
pub fn scale_in_place(dst: &mut [f32], gain: f32) {
    for d in dst.iter_mut() {
        *d *= gain;
    }
}

/// In-place mix: `dst[i] += src[i] * gain` over the common length.
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s * gain;
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0, 24.0] {
            let lin = db_to_lin(db);
            let back = lin_to_db(lin);
            assert!((db - back).abs() < 0.01, "db={}, back={}", db, back);
        }
    }

    #[test]
    fn db_floor_for_silence() {
        assert_eq!(lin_to_db(0.0), DB_FLOOR);
        assert_eq!(db_to_lin(-200.0), 0.0);
    }

    #[test]
    fn clamp_respects_both_bounds() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn wrap_phase_stays_in_unit_interval() {
        for p in [-3.25, -1.0, -1e-18, 0.0, 0.5, 1.0, 7.75] {
            let w = wrap_phase01(p);
            assert!((0.0..1.0).contains(&w), "p={} w={}", p, w);
        }
        assert!((wrap_phase01(7.75) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn sin01_matches_reference() {
        for i in 0..64 {
            let p = f64::from(i) / 64.0;
            let expect = (TAU64 * p).sin() as f32;
            assert!((sin01(p) - expect).abs() < 1e-3, "p={}", p);
        }
    }

    #[test]
    fn peak_abs_picks_negative_extremes() {
        assert_eq!(peak_abs(&[0.1, -0.8, 0.5]), 0.8);
        assert_eq!(peak_abs(&[]), 0.0);
    }
}
