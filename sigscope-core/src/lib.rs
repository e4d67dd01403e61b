#![cfg_attr(not(feature = "std"), no_std)]
//! sigscope core — no_std-ready DSP primitives for test-signal generation and analysis.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `fast-math`: polynomial sine for the oscillator hot path
//! - `serde`    : derive (de)serialization for configuration-facing enums
//!
//! Modules
//! - [`dsp`]    : math backend, utils (db/lin, phase wrap, block helpers)
//! - [`blep`]   : PolyBLEP residual and band-limited saw/square
//! - [`noise`]  : seeded white noise, Kellet pink noise
//! - [`window`] : periodic cosine-sum analysis windows and amplitude correction
//!
//! Design
//! - No heap allocations; per-sample or in-place block primitives only
//! - Window tables are filled into caller-owned storage

pub mod blep;
pub mod dsp;
pub mod noise;
pub mod window;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::blep::{poly_blep, saw, square};
    pub use crate::dsp::{
        clamp, db_to_lin, kill_denormals, lerp64, lin_to_db, mix_in_place, peak_abs, sin01,
        wrap_phase01, TAU,
    };
    pub use crate::noise::{PinkNoise, WhiteNoise};
    pub use crate::window::{amplitude_correction, WindowKind};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let _ = saw(0.25, 0.01);
        let mut p = PinkNoise::new(1, 48000.0);
        let _ = p.next();
        assert_eq!(WindowKind::default(), WindowKind::Hann);
    }
}
