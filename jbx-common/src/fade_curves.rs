//! Fade curve implementations for stream fade envelopes
//!
//! Provides the curve shapes used when sliding a stream's gain between two
//! values (crossfades, fade-to-silence teardown, fade-in on creation).

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve types for gain slides
///
/// Each curve type provides a different perceptual quality:
/// - Linear: constant rate of change (precise, predictable)
/// - EqualPower: constant perceived loudness during a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FadeCurve {
    /// v(t) = t — constant rate of change
    #[default]
    Linear,

    /// v(t) = sin(t * pi/2) — constant perceived loudness when two
    /// streams overlap with mirrored curves
    EqualPower,
}

impl FadeCurve {
    /// Curve position for a rising slide.
    ///
    /// `position` is the normalized progress through the slide (0.0..=1.0);
    /// the return value is the gain multiplier contribution (0.0..=1.0).
    pub fn rising(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }
}
