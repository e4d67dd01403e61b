//! Polynomial band-limited step (PolyBLEP) correction.
//!
//! A naive saw or square jumps by a full step at its discontinuity, which folds
//! energy far above Nyquist back into the audible band. PolyBLEP replaces the
//! ideal step with a 2-sample polynomial residual centred on the edge:
//! one sample before the edge and one after, scaled by how far the current phase
//! sits from the edge in units of the phase increment `dt`.
//!
//! The residual below spans [-1, 1], which is exactly half of the jump of a ±1
//! waveform, so it is added/subtracted unscaled.

/// PolyBLEP residual for phase `t` in [0, 1) and increment `dt` (= f / sr).
///
/// Returns 0.0 away from the discontinuity, and when `dt` is not in (0, 0.5).
#[inline]
pub fn poly_blep(t: f64, dt: f64) -> f64 {
    if !(dt > 0.0 && dt < 0.5) {
        return 0.0;
    }
    if t < dt {
        // just after the edge
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        // just before the edge
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// Band-limited saw in [-1, 1]: falling edge at the phase wrap.
#[inline]
pub fn saw(phase: f64, dt: f64) -> f64 {
    (2.0 * phase - 1.0) - poly_blep(phase, dt)
}

/// Band-limited 50% square in [-1, 1]: rising edge at 0, falling edge at 0.5.
#[inline]
pub fn square(phase: f64, dt: f64) -> f64 {
    let naive = if phase < 0.5 { 1.0 } else { -1.0 };
    let mut falling = phase + 0.5;
    if falling >= 1.0 {
        falling -= 1.0;
    }
    naive + poly_blep(phase, dt) - poly_blep(falling, dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_is_zero_away_from_edges() {
        let dt = 0.01;
        for i in 2..98 {
            let t = f64::from(i) / 100.0;
            assert_eq!(poly_blep(t, dt), 0.0, "t={}", t);
        }
    }

    #[test]
    fn residual_is_continuous_across_the_edge() {
        let dt = 0.05;
        // approaching the wrap from below and leaving it from above meet at 0
        let before = poly_blep(1.0 - 1e-9, dt);
        let after = poly_blep(1e-9, dt);
        assert!((before - 1.0).abs() < 1e-6, "before={}", before);
        assert!((after + 1.0).abs() < 1e-6, "after={}", after);
        // the corrected saw therefore passes through 0 on both sides
        assert!(saw(1.0 - 1e-9, dt).abs() < 1e-6);
        assert!(saw(1e-9, dt).abs() < 1e-6);
    }

    #[test]
    fn degenerate_increment_disables_correction() {
        assert_eq!(poly_blep(0.0, 0.0), 0.0);
        assert_eq!(poly_blep(0.0, -1.0), 0.0);
        assert_eq!(poly_blep(0.0, 0.7), 0.0);
    }

    #[test]
    fn waveforms_stay_bounded() {
        let dt = 1000.0 / 48_000.0;
        let mut p = 0.0;
        for _ in 0..4800 {
            assert!(saw(p, dt).abs() <= 1.0 + 1e-9);
            assert!(square(p, dt).abs() <= 1.0 + 1e-9);
            p += dt;
            if p >= 1.0 {
                p -= 1.0;
            }
        }
    }
}
