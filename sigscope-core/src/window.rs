//! Analysis windows.
//!
//! Every window here is a generalized cosine sum
//! `w[n] = Σ_k (-1)^k a_k cos(2π k n / N)` in its **periodic** form
//! (denominator `N`, not `N - 1`), which is the right choice for FFT framing:
//! a bin-centred sinusoid then leaks into exactly the bins the window's
//! spectrum predicts (±1 bin for Hann, nothing beyond).
//!
//! Tables are filled generically over `num_traits::Float` so the same code serves
//! the `f32` hot path and `f64` reference checks in tests.

use num_traits::{Float, FloatConst};

/// Window shape applied before the transform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WindowKind {
    Rectangular,
    #[default]
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
    FlatTop,
}

impl WindowKind {
    pub const ALL: [WindowKind; 6] = [
        WindowKind::Rectangular,
        WindowKind::Hann,
        WindowKind::Hamming,
        WindowKind::Blackman,
        WindowKind::BlackmanHarris,
        WindowKind::FlatTop,
    ];

    /// Cosine-sum coefficients `a_0..a_k`.
    pub fn coefficients(self) -> &'static [f64] {
        match self {
            WindowKind::Rectangular => &[1.0],
            WindowKind::Hann => &[0.5, 0.5],
            WindowKind::Hamming => &[0.54, 0.46],
            WindowKind::Blackman => &[0.42, 0.5, 0.08],
            WindowKind::BlackmanHarris => &[0.35875, 0.48829, 0.14128, 0.01168],
            WindowKind::FlatTop => &[
                0.215_578_95,
                0.416_631_58,
                0.277_263_158,
                0.083_578_947,
                0.006_947_368,
            ],
        }
    }

    /// Stable numeric tag, used to pass the selection through an atomic.
    pub fn to_u8(self) -> u8 {
        match self {
            WindowKind::Rectangular => 0,
            WindowKind::Hann => 1,
            WindowKind::Hamming => 2,
            WindowKind::Blackman => 3,
            WindowKind::BlackmanHarris => 4,
            WindowKind::FlatTop => 5,
        }
    }

    /// Inverse of [`WindowKind::to_u8`]; unknown tags fall back to Hann.
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            0 => WindowKind::Rectangular,
            2 => WindowKind::Hamming,
            3 => WindowKind::Blackman,
            4 => WindowKind::BlackmanHarris,
            5 => WindowKind::FlatTop,
            _ => WindowKind::Hann,
        }
    }
}

#[inline]
fn cast<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::zero)
}

/// Fill `out` with the periodic window of length `out.len()` and return the sum
/// of its coefficients (the coherent gain times N).
pub fn fill<T: Float + FloatConst>(kind: WindowKind, out: &mut [T]) -> T {
    let n = out.len();
    if n == 0 {
        return T::zero();
    }
    let coeffs = kind.coefficients();
    let step = (T::PI() + T::PI()) / cast::<T>(n as f64);
    let mut sum = T::zero();
    for (i, w) in out.iter_mut().enumerate() {
        let x = step * cast::<T>(i as f64);
        let mut v = T::zero();
        for (k, &a) in coeffs.iter().enumerate() {
            let term = cast::<T>(a) * (x * cast::<T>(k as f64)).cos();
            v = if k % 2 == 0 { v + term } else { v - term };
        }
        *w = v;
        sum = sum + v;
    }
    sum
}

/// Amplitude correction that maps a windowed, one-sided FFT magnitude of a
/// full-scale sinusoid back to its linear amplitude: `2 / Σ w[n]`.
///
/// Returns 1.0 for a degenerate (empty or all-zero) window.
pub fn amplitude_correction<T: Float>(window_sum: T) -> T {
    if window_sum > T::zero() {
        cast::<T>(2.0) / window_sum
    } else {
        T::one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_zero_at_start_and_one_at_centre() {
        let mut w = vec![0.0_f64; 1024];
        let sum = fill(WindowKind::Hann, &mut w);
        assert!(w[0].abs() < 1e-12);
        assert!((w[512] - 1.0).abs() < 1e-12);
        // periodic Hann sums to exactly N/2
        assert!((sum - 512.0).abs() < 1e-9, "sum={}", sum);
    }

    #[test]
    fn rectangular_sum_is_length() {
        let mut w = vec![0.0_f32; 64];
        let sum = fill(WindowKind::Rectangular, &mut w);
        assert_eq!(sum, 64.0);
        assert!(w.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn sums_match_leading_coefficient() {
        // cosine terms integrate to zero over a full period
        for kind in WindowKind::ALL {
            let mut w = vec![0.0_f64; 256];
            let sum = fill(kind, &mut w);
            let expect = kind.coefficients()[0] * 256.0;
            assert!((sum - expect).abs() < 1e-9, "{:?}: {} vs {}", kind, sum, expect);
        }
    }

    #[test]
    fn correction_for_hann() {
        let mut w = vec![0.0_f32; 4096];
        let sum = fill(WindowKind::Hann, &mut w);
        let c = amplitude_correction(sum);
        assert!((c - 2.0 / 2048.0).abs() < 1e-7);
        assert_eq!(amplitude_correction(0.0_f32), 1.0);
    }

    #[test]
    fn tags_roundtrip() {
        for kind in WindowKind::ALL {
            assert_eq!(WindowKind::from_u8(kind.to_u8()), kind);
        }
    }
}
