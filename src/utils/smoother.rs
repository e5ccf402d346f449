//! Parameter smoothing for click-free gain changes
//!
//! Volume changes made while a track is playing glide to the new level
//! instead of jumping, which would otherwise be audible as a click.

/// Default smoothing time in milliseconds
pub const DEFAULT_SMOOTH_TIME_MS: f32 = 15.0;

/// A one-pole smoothed parameter with range constraints
#[derive(Clone, Debug)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Smoothing coefficient (0-1, higher = faster)
    coeff: f32,
    settled: bool,
    pub min: f32,
    pub max: f32,
}

impl SmoothedParam {
    /// Create a new smoothed parameter with range
    ///
    /// # Arguments
    /// * `initial_value` - Starting value (will be clamped to range)
    /// * `min` - Minimum allowed value
    /// * `max` - Maximum allowed value
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `smooth_time_ms` - Smoothing time in milliseconds; 0 disables smoothing
    pub fn new(initial_value: f32, min: f32, max: f32, sample_rate: f32, smooth_time_ms: f32) -> Self {
        let clamped = initial_value.clamp(min, max);
        Self {
            current: clamped,
            target: clamped,
            coeff: Self::calculate_coeff(sample_rate, smooth_time_ms),
            settled: true,
            min,
            max,
        }
    }

    /// A gain in [0, 1]
    pub fn new_gain(initial_value: f32, sample_rate: f32, smooth_time_ms: f32) -> Self {
        Self::new(initial_value, 0.0, 1.0, sample_rate, smooth_time_ms)
    }

    fn calculate_coeff(sample_rate: f32, smooth_time_ms: f32) -> f32 {
        let smooth_time_samples = (smooth_time_ms / 1000.0) * sample_rate;
        if !smooth_time_samples.is_finite() || smooth_time_samples <= 0.0 {
            return 1.0;
        }
        // Reach ~63% of the target after one time constant
        1.0 - (-1.0 / smooth_time_samples).exp()
    }

    /// Set a new target value to smooth towards (clamped to range)
    pub fn set_target(&mut self, target: f32) {
        if !target.is_finite() {
            return;
        }
        let clamped = target.clamp(self.min, self.max);
        if (self.target - clamped).abs() > 1e-8 {
            self.target = clamped;
            self.settled = false;
        }
    }

    /// Jump straight to `value`
    pub fn set_immediate(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let clamped = value.clamp(self.min, self.max);
        self.current = clamped;
        self.target = clamped;
        self.settled = true;
    }

    /// Advance one sample and return the smoothed value
    #[inline]
    pub fn tick(&mut self) -> f32 {
        if self.settled {
            return self.current;
        }

        self.current += self.coeff * (self.target - self.current);

        if (self.current - self.target).abs() < 1e-6 {
            self.current = self.target;
            self.settled = true;
        }

        self.current
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Recalculate the coefficient, e.g. after a sample rate change
    pub fn set_smooth_time(&mut self, sample_rate: f32, smooth_time_ms: f32) {
        self.coeff = Self::calculate_coeff(sample_rate, smooth_time_ms);
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new_gain(1.0, 22050.0, DEFAULT_SMOOTH_TIME_MS)
    }
}
