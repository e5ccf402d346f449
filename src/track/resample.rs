//! Sample rate conversion to the engine's working rate

use crate::error::LoadError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input frames handed to the resampler per call
const CHUNK_FRAMES: usize = 4096;

/// Resample a mono signal from `from_rate` to `to_rate`.
///
/// The output has `round(len * to_rate / from_rate)` samples and is aligned
/// with the input (the resampler's group delay is trimmed off).
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, LoadError> {
    if from_rate == 0 {
        return Err(LoadError::InvalidSampleRate(from_rate));
    }
    if to_rate == 0 {
        return Err(LoadError::InvalidSampleRate(to_rate));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)
        .map_err(|e| LoadError::DecodeFailed(format!("resampler init: {}", e)))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_FRAMES);
    let resample_err = |e: rubato::ResampleError| LoadError::DecodeFailed(format!("resample: {}", e));

    let mut chunks = samples.chunks_exact(CHUNK_FRAMES);
    for chunk in &mut chunks {
        let input: [&[f32]; 1] = [chunk];
        let block = resampler.process(&input[..], None).map_err(resample_err)?;
        out.extend_from_slice(&block[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let input: [&[f32]; 1] = [remainder];
        let block = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(resample_err)?;
        out.extend_from_slice(&block[0]);
    }

    // Flush the filter tail until the delayed output covers the whole input
    while out.len() < expected + delay {
        let block = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resample_err)?;
        if block[0].is_empty() {
            break;
        }
        out.extend_from_slice(&block[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}
