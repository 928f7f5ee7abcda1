//! Fade curve implementations for crossfading
//!
//! Five curve shapes, each a different perceptual quality:
//! - Linear: constant rate of change (precise, predictable)
//! - Exponential: slow start, fast finish (natural-sounding fade-in)
//! - Logarithmic: fast start, slow finish (natural-sounding fade-out)
//! - SCurve: smooth acceleration and deceleration (gentle, musical)
//! - EqualPower: constant perceived loudness during crossfade
//!
//! The playback controller evaluates a curve once per crossfade step and
//! applies the result as a deck volume, so everything here operates on
//! normalized positions rather than samples.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Fade curve types for crossfading
///
/// Fade-in curves raise volume from 0.0 to 1.0, fade-out curves lower it
/// from 1.0 to 0.0 over the same normalized time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    Linear,
    /// v(t) = t², slow start, fast finish
    Exponential,
    /// v(t) = √t, fast start, slow finish
    Logarithmic,
    /// v(t) = 0.5 × (1 - cos(π × t))
    SCurve,
    /// v(t) = sin(t × π/2), constant perceived loudness
    EqualPower,
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::Linear
    }
}

impl FadeCurve {
    /// Calculate fade-in multiplier at a normalized position
    ///
    /// `position` runs from 0.0 (start of fade) to 1.0 (end of fade) and is
    /// clamped. Returns the volume multiplier, 0.0 at the start and 1.0 at
    /// the end.
    pub fn fade_in(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Calculate fade-out multiplier at a normalized position
    ///
    /// Mirror of [`fade_in`](Self::fade_in): 1.0 at the start of the fade,
    /// 0.0 at the end.
    pub fn fade_out(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::Logarithmic => (1.0 - t).sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Parse a curve from its configuration name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "linear" => Some(FadeCurve::Linear),
            "exponential" => Some(FadeCurve::Exponential),
            "logarithmic" => Some(FadeCurve::Logarithmic),
            "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [FadeCurve; 5] = [
        FadeCurve::Linear,
        FadeCurve::Exponential,
        FadeCurve::Logarithmic,
        FadeCurve::SCurve,
        FadeCurve::EqualPower,
    ];

    #[test]
    fn fade_in_endpoints() {
        for curve in CURVES {
            assert!(curve.fade_in(0.0).abs() < 1e-9, "{curve:?} start");
            assert!((curve.fade_in(1.0) - 1.0).abs() < 1e-9, "{curve:?} end");
        }
    }

    #[test]
    fn fade_out_endpoints() {
        for curve in CURVES {
            assert!((curve.fade_out(0.0) - 1.0).abs() < 1e-9, "{curve:?} start");
            assert!(curve.fade_out(1.0).abs() < 1e-9, "{curve:?} end");
        }
    }

    #[test]
    fn positions_are_clamped() {
        for curve in CURVES {
            assert_eq!(curve.fade_in(-0.5), curve.fade_in(0.0));
            assert_eq!(curve.fade_in(1.5), curve.fade_in(1.0));
            assert_eq!(curve.fade_out(2.0), curve.fade_out(1.0));
        }
    }

    #[test]
    fn linear_curves_are_complementary() {
        // Linear in + out always sum to exactly 1.0, the invariant the
        // crossfade loop relies on for the default configuration.
        for i in 0..=100 {
            let t = i as f64 / 100.0;
            let sum = FadeCurve::Linear.fade_in(t) + FadeCurve::Linear.fade_out(t);
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn exponential_midpoint() {
        assert!((FadeCurve::Exponential.fade_in(0.5) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn scurve_midpoint() {
        assert!((FadeCurve::SCurve.fade_in(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn equal_power_preserves_energy() {
        // sin² + cos² = 1 at every position
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            let fi = FadeCurve::EqualPower.fade_in(t);
            let fo = FadeCurve::EqualPower.fade_out(t);
            assert!((fi * fi + fo * fo - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn from_str_round_trips_config_names() {
        assert_eq!(FadeCurve::from_str("linear"), Some(FadeCurve::Linear));
        assert_eq!(FadeCurve::from_str("equal_power"), Some(FadeCurve::EqualPower));
        assert_eq!(FadeCurve::from_str("bogus"), None);
    }
}
