//! Rotating stereo placement: the 3D pan and the 8D pan with depth

use super::StereoFrame;

/// Left/right balance in [0, 1] from the rotation phase (0 = hard left)
#[inline]
pub fn pan(phase: f64) -> f32 {
    ((phase.sin() + 1.0) * 0.5) as f32
}

/// Near/far level for the 8D mode. Uses `|cos|` so the level never rises
/// above 1 and bottoms out at `1 - strength` twice per revolution.
#[inline]
pub fn depth(phase: f64, strength: f32) -> f32 {
    1.0 - (phase.cos().abs() as f32) * strength
}

/// Pure stereo pan, no depth
#[inline]
pub fn three_d(base: f32, phase: f64, gain: f32) -> StereoFrame {
    let pan = pan(phase);
    StereoFrame::new(base * (1.0 - pan) * gain, base * pan * gain)
}

/// Pan plus depth modulation. The echo tap is added by the caller.
#[inline]
pub fn eight_d(base: f32, phase: f64, gain: f32, depth_strength: f32) -> StereoFrame {
    let pan = pan(phase);
    let depth = depth(phase, depth_strength);
    StereoFrame::new(
        base * (1.0 - pan) * depth * gain,
        base * pan * depth * gain,
    )
}
