use super::Effect;

/// A `tanh` soft limiter that keeps every output sample inside [-1, 1]
/// without the hard corners of a brick wall clip.
///
/// Non-finite input is treated as silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftLimiter;

impl SoftLimiter {
    pub fn new() -> Self {
        Self
    }
}

impl Effect for SoftLimiter {
    #[inline]
    fn process(&self, input: f32) -> f32 {
        if input.is_finite() {
            input.tanh()
        } else {
            0.0
        }
    }
}
