//! Per-sample effect algorithms
//!
//! Every effect turns one mono sample into a stereo frame. The only state an
//! effect sees is the phase angle passed in by the caller, so the same
//! `(sample, phase, mode)` always yields the same frame. All modes end in the
//! `tanh` soft limiter.

pub mod limiter;
pub mod phase;
pub mod spatial;
pub mod tonal;

pub use self::limiter::SoftLimiter;
pub use self::phase::EffectState;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trait for mono stages applied to each output channel
pub trait Effect: Send {
    /// Process a single audio sample through the effect
    fn process(&self, input: f32) -> f32;
}

/// Output of the effect chain for one source sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    #[inline]
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Average of both channels, for single-channel devices
    #[inline]
    pub fn downmix(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

/// Effect applied by the renderer; stored as a `u8` in an atomic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EffectMode {
    #[default]
    Flat = 0,
    Rock = 1,
    #[serde(rename = "3d")]
    ThreeD = 2,
    #[serde(rename = "8d")]
    EightD = 3,
    Dolby = 4,
    Pop = 5,
    Classical = 6,
    HipHop = 7,
    Folk = 8,
    Dance = 9,
    Jazz = 10,
}

impl EffectMode {
    /// Every mode, in menu order
    pub const ALL: [EffectMode; 11] = [
        EffectMode::Flat,
        EffectMode::Rock,
        EffectMode::ThreeD,
        EffectMode::EightD,
        EffectMode::Dolby,
        EffectMode::Pop,
        EffectMode::Classical,
        EffectMode::HipHop,
        EffectMode::Folk,
        EffectMode::Dance,
        EffectMode::Jazz,
    ];

    /// Decode from atomic storage; unknown values fall back to Flat
    pub fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(EffectMode::Flat)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// User-facing label
    pub fn name(self) -> &'static str {
        match self {
            EffectMode::Flat => "Flat",
            EffectMode::Rock => "Rock",
            EffectMode::ThreeD => "3D",
            EffectMode::EightD => "8D",
            EffectMode::Dolby => "Dolby",
            EffectMode::Pop => "Pop",
            EffectMode::Classical => "Classical",
            EffectMode::HipHop => "Hip Hop",
            EffectMode::Folk => "Folk",
            EffectMode::Dance => "Dance",
            EffectMode::Jazz => "Jazz",
        }
    }

    /// Whether the mode reads the delayed echo tap from the source buffer
    pub fn uses_echo(self) -> bool {
        matches!(self, EffectMode::EightD)
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown effect mode '{0}'")]
pub struct ParseEffectModeError(pub String);

impl FromStr for EffectMode {
    type Err = ParseEffectModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        let mode = match key.as_str() {
            "flat" => EffectMode::Flat,
            "rock" => EffectMode::Rock,
            "3d" | "threed" => EffectMode::ThreeD,
            "8d" | "eightd" => EffectMode::EightD,
            "dolby" => EffectMode::Dolby,
            "pop" => EffectMode::Pop,
            "classical" => EffectMode::Classical,
            "hiphop" => EffectMode::HipHop,
            "folk" => EffectMode::Folk,
            "dance" => EffectMode::Dance,
            "jazz" => EffectMode::Jazz,
            _ => return Err(ParseEffectModeError(s.to_string())),
        };
        Ok(mode)
    }
}

/// Constants of the per-mode algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    /// Loudness compensation for the 3D pan
    pub three_d_gain: f32,
    /// Loudness compensation for the 8D pan
    pub eight_d_gain: f32,
    /// How far the 8D depth modulation pulls the level down (0-1)
    pub depth_strength: f32,
    /// Level of the 8D echo tap
    pub echo_amount: f32,
    /// Echo tap distance in source samples
    pub echo_delay_samples: usize,
    pub rock_gain: f32,
    /// Drive into the Rock distortion; 0 leaves a plain gain boost
    pub rock_drive: f32,
    pub rock_level: f32,
    pub dolby_mid: f32,
    pub dolby_side: f32,
    pub dolby_bass: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            three_d_gain: 1.3,
            eight_d_gain: 1.4,
            depth_strength: 0.3,
            echo_amount: 0.18,
            echo_delay_samples: 600,
            rock_gain: 1.35,
            rock_drive: 1.5,
            rock_level: 0.8,
            dolby_mid: 1.1,
            dolby_side: 0.25,
            dolby_bass: 0.3,
        }
    }
}

impl EffectParams {
    /// Replace non-finite values with defaults and clamp depth into [0, 1]
    pub fn sanitized(self) -> Self {
        let defaults = EffectParams::default();
        let pick = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };
        Self {
            three_d_gain: pick(self.three_d_gain, defaults.three_d_gain),
            eight_d_gain: pick(self.eight_d_gain, defaults.eight_d_gain),
            depth_strength: pick(self.depth_strength, defaults.depth_strength).clamp(0.0, 1.0),
            echo_amount: pick(self.echo_amount, defaults.echo_amount),
            echo_delay_samples: self.echo_delay_samples.max(1),
            rock_gain: pick(self.rock_gain, defaults.rock_gain),
            rock_drive: pick(self.rock_drive, defaults.rock_drive).max(0.0),
            rock_level: pick(self.rock_level, defaults.rock_level),
            dolby_mid: pick(self.dolby_mid, defaults.dolby_mid),
            dolby_side: pick(self.dolby_side, defaults.dolby_side),
            dolby_bass: pick(self.dolby_bass, defaults.dolby_bass),
        }
    }
}

/// Stateless mono-to-stereo effect chain
///
/// Holds only immutable parameters; all time-varying input (the phase
/// angle and the echo tap) is passed in per call.
#[derive(Debug, Clone)]
pub struct EffectProcessor {
    params: EffectParams,
    limiter: SoftLimiter,
}

impl EffectProcessor {
    pub fn new(params: EffectParams) -> Self {
        Self {
            params: params.sanitized(),
            limiter: SoftLimiter::new(),
        }
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    /// Process one sample with no echo contribution
    #[inline]
    pub fn process(&self, base: f32, phase: f64, mode: EffectMode) -> StereoFrame {
        self.process_with_echo(base, 0.0, phase, mode)
    }

    /// Process one sample; `echo_tap` is the source sample `echo_delay_samples`
    /// earlier (0 when the index is not past the delay). Only 8D uses it.
    #[inline]
    pub fn process_with_echo(
        &self,
        base: f32,
        echo_tap: f32,
        phase: f64,
        mode: EffectMode,
    ) -> StereoFrame {
        let raw = self.process_unlimited(base, echo_tap, phase, mode);
        StereoFrame::new(
            self.limiter.process(raw.left),
            self.limiter.process(raw.right),
        )
    }

    /// Effect output before the soft limiter
    pub fn process_unlimited(
        &self,
        base: f32,
        echo_tap: f32,
        phase: f64,
        mode: EffectMode,
    ) -> StereoFrame {
        let p = &self.params;
        match mode {
            EffectMode::Flat => StereoFrame::mono(base),
            EffectMode::Rock => tonal::rock(base, p.rock_gain, p.rock_drive, p.rock_level),
            EffectMode::ThreeD => spatial::three_d(base, phase, p.three_d_gain),
            EffectMode::EightD => {
                let frame = spatial::eight_d(base, phase, p.eight_d_gain, p.depth_strength);
                let echo = echo_tap * p.echo_amount;
                StereoFrame::new(frame.left + echo, frame.right + echo)
            }
            EffectMode::Dolby => tonal::dolby(base, phase, p.dolby_mid, p.dolby_side, p.dolby_bass),
            EffectMode::Pop
            | EffectMode::Classical
            | EffectMode::HipHop
            | EffectMode::Folk
            | EffectMode::Dance
            | EffectMode::Jazz => tonal::genre(base, phase, mode),
        }
    }

    /// Fetch the echo tap for `index`, bounds-checked against the buffer.
    /// Returns 0 unless `index` is strictly past the delay.
    #[inline]
    pub fn echo_tap(&self, samples: &[f32], index: usize) -> f32 {
        let delay = self.params.echo_delay_samples;
        if index > delay {
            samples.get(index - delay).copied().unwrap_or(0.0)
        } else {
            0.0
        }
    }
}

impl Default for EffectProcessor {
    fn default() -> Self {
        Self::new(EffectParams::default())
    }
}
