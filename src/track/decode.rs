//! Decoding audio files to mono PCM at the working sample rate
//!
//! This runs on the control thread and is free to block and allocate.

use super::resample::resample_mono;
use crate::error::LoadError;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono PCM produced by a decoder, not yet normalized
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Turns a file into mono PCM at (ideally) the requested rate.
///
/// Implementations may return a different rate; the engine resamples
/// whatever comes back to its working rate.
pub trait TrackDecoder: Send {
    fn decode_to_mono_pcm(
        &self,
        path: &Path,
        target_sample_rate: u32,
    ) -> Result<DecodedAudio, LoadError>;
}

/// Default decoder backed by Symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode the first audio track, downmixed to mono, at its native rate
    pub fn decode_native(&self, path: &Path) -> Result<DecodedAudio, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::UnsupportedFormat("no audio track found".to_string()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut mono: Vec<f32> = Vec::new();
        let mut pcm: Option<PcmBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    if mono.is_empty() {
                        return Err(LoadError::DecodeFailed(e.to_string()));
                    }
                    log::warn!("Stopping decode of {:?} early: {}", path, e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping corrupt packet in {:?}: {}", path, e);
                    continue;
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => return Err(LoadError::DecodeFailed(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            if sample_rate == 0 {
                sample_rate = spec.rate;
            }

            let needed = decoded.capacity() * channels;
            if pcm.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                pcm = Some(PcmBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = pcm.as_mut() {
                buf.copy_interleaved_ref(decoded);
                downmix_into(buf.samples(), channels, &mut mono);
            }
        }

        if sample_rate == 0 {
            return Err(LoadError::InvalidSampleRate(0));
        }
        if mono.is_empty() {
            return Err(LoadError::EmptyTrack);
        }

        log::info!(
            "Decoded {:?}: {} frames at {} Hz",
            path,
            mono.len(),
            sample_rate
        );
        Ok(DecodedAudio {
            samples: mono,
            sample_rate,
        })
    }
}

impl TrackDecoder for SymphoniaDecoder {
    fn decode_to_mono_pcm(
        &self,
        path: &Path,
        target_sample_rate: u32,
    ) -> Result<DecodedAudio, LoadError> {
        let native = self.decode_native(path)?;
        if native.sample_rate == target_sample_rate {
            return Ok(native);
        }
        log::info!(
            "Resampling {:?} from {} Hz to {} Hz",
            path,
            native.sample_rate,
            target_sample_rate
        );
        let samples = resample_mono(&native.samples, native.sample_rate, target_sample_rate)?;
        Ok(DecodedAudio {
            samples,
            sample_rate: target_sample_rate,
        })
    }
}

/// Average interleaved frames down to one channel and append them
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
