//! Decoded, normalized mono tracks
//!
//! A `SampleBuffer` is built once on the control thread and never mutated
//! afterwards; loading another track replaces it wholesale.

pub mod decode;
pub mod resample;

pub use decode::{DecodedAudio, SymphoniaDecoder, TrackDecoder};

use crate::error::LoadError;

/// Smallest peak used as a divisor when normalizing
pub const PEAK_FLOOR: f32 = 1e-6;

/// Immutable mono PCM in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// What a caller learns about a successfully loaded track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackInfo {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub frames: usize,
}

impl SampleBuffer {
    /// Validate and normalize raw mono PCM.
    ///
    /// Rejects a zero sample rate and empty input so neither can reach the
    /// audio callback.
    pub fn from_pcm(mut samples: Vec<f32>, sample_rate: u32) -> Result<Self, LoadError> {
        if sample_rate == 0 {
            return Err(LoadError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(LoadError::EmptyTrack);
        }
        normalize(&mut samples);
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            duration_seconds: self.duration_seconds(),
            sample_rate: self.sample_rate,
            frames: self.samples.len(),
        }
    }
}

/// Scale `samples` so the loudest one has magnitude 1.
///
/// Non-finite samples are zeroed first. The divisor is floored at
/// `PEAK_FLOOR` so silence stays silence. Returns the peak found before
/// scaling.
pub fn normalize(samples: &mut [f32]) -> f32 {
    let mut peak = 0.0f32;
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
        }
        peak = peak.max(sample.abs());
    }

    let divisor = peak.max(PEAK_FLOOR);
    if divisor != 1.0 {
        for sample in samples.iter_mut() {
            *sample /= divisor;
        }
    }
    peak
}
