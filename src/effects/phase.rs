//! The rotation clock shared by every effect mode

use std::f64::consts::TAU;

/// Phase accumulator advanced once per rendered sample.
///
/// The increment is `rotation_speed / sample_rate`, so a revolution takes
/// the same wall-clock time whatever rate the track was decoded at. The
/// angle is kept in f64 and folded back by one full turn when it passes
/// `2π`, which leaves `sin`/`cos` unchanged and stops precision loss on
/// long sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectState {
    angle: f64,
    increment: f64,
}

impl EffectState {
    pub fn new(rotation_speed: f64, sample_rate: u32) -> Self {
        Self {
            angle: 0.0,
            increment: Self::increment_for(rotation_speed, sample_rate),
        }
    }

    fn increment_for(rotation_speed: f64, sample_rate: u32) -> f64 {
        if sample_rate == 0 || !rotation_speed.is_finite() {
            return 0.0;
        }
        rotation_speed / sample_rate as f64
    }

    /// Current phase angle in radians, in [0, 2π)
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Radians added per sample
    pub fn increment(&self) -> f64 {
        self.increment
    }

    #[inline]
    pub fn advance(&mut self) {
        self.angle += self.increment;
        if self.angle >= TAU {
            self.angle -= TAU;
        }
    }

    /// Restart the rotation from angle 0 at a (possibly new) sample rate
    pub fn reset(&mut self, rotation_speed: f64, sample_rate: u32) {
        self.angle = 0.0;
        self.increment = Self::increment_for(rotation_speed, sample_rate);
    }
}
