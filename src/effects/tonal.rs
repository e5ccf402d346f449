//! Modes that shape level and tone without moving the image

use super::{EffectMode, StereoFrame};

/// Gain boost into a `tanh` distortion. With `drive == 0` this is a plain
/// `base * gain` boost.
#[inline]
pub fn rock(base: f32, gain: f32, drive: f32, level: f32) -> StereoFrame {
    let boosted = base * gain;
    if drive > 0.0 {
        StereoFrame::mono((boosted * drive).tanh() * level)
    } else {
        StereoFrame::mono(boosted)
    }
}

/// Mid/side widening: the side signal is the rotation oscillator itself,
/// added to the left channel and subtracted from the right.
#[inline]
pub fn dolby(base: f32, phase: f64, mid: f32, side: f32, bass: f32) -> StereoFrame {
    let mid = base * mid;
    let side = phase.sin() as f32 * side;
    let bass = base * bass;
    StereoFrame::new(mid + side + bass, mid - side + bass)
}

/// Genre presets. Each is a fixed blend of the dry signal with scaled
/// copies of itself; Dance adds a shimmer at three times the rotation rate.
#[inline]
pub fn genre(base: f32, phase: f64, mode: EffectMode) -> StereoFrame {
    let out = match mode {
        EffectMode::Pop => base + base * 0.25 + base * 0.35,
        EffectMode::Classical => base * 1.1,
        EffectMode::HipHop => base + base * 0.45 + base * 0.25,
        EffectMode::Folk => base + base * 0.2,
        EffectMode::Dance => base + base * 0.4 + (phase * 3.0).sin() as f32 * 0.15,
        EffectMode::Jazz => base * 0.95,
        _ => base,
    };
    StereoFrame::mono(out)
}
