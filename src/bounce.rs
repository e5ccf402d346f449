//! Offline rendering of a track through the effect chain to a WAV file
//!
//! Runs a headless engine and pulls its renderer as fast as possible, so
//! the file holds exactly what the device would have played.

use crate::config::EngineConfig;
use crate::effects::EffectMode;
use crate::engine::{AudioEngine, PlaybackState, Renderer, RENDER_CHANNELS};
use crate::error::{DeviceError, LoadError};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BounceError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Failed to write WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("Engine renderer is already in use")]
    RendererUnavailable,
}

#[derive(Debug, Clone)]
pub struct BounceOptions {
    pub effect: EffectMode,
    pub volume: f32,
    pub config: EngineConfig,
}

impl Default for BounceOptions {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            effect: config.effect,
            volume: config.volume,
            config,
        }
    }
}

impl BounceOptions {
    /// Options taking effect and volume from `config`
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            effect: config.effect,
            volume: config.volume,
            config,
        }
    }
}

/// What ended up in the file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceReport {
    pub frames: usize,
    pub sample_rate: u32,
}

impl BounceReport {
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Render mono PCM to a 32-bit float stereo WAV
pub fn bounce_to_wav(
    samples: Vec<f32>,
    sample_rate: u32,
    output: &Path,
    options: &BounceOptions,
) -> Result<BounceReport, BounceError> {
    let (mut engine, renderer) = headless_engine(options)?;
    engine.load_samples(samples, sample_rate)?;
    render_to_wav(&mut engine, renderer, output)
}

/// Decode `input` and render it to a 32-bit float stereo WAV
pub fn bounce_file(
    input: &Path,
    output: &Path,
    options: &BounceOptions,
) -> Result<BounceReport, BounceError> {
    let (mut engine, renderer) = headless_engine(options)?;
    engine.load(input)?;
    render_to_wav(&mut engine, renderer, output)
}

fn headless_engine(options: &BounceOptions) -> Result<(AudioEngine, Renderer), BounceError> {
    let config = EngineConfig {
        effect: options.effect,
        volume: options.volume,
        ..options.config.clone()
    };
    let mut engine = AudioEngine::new(config);
    let renderer = engine
        .take_renderer()
        .ok_or(BounceError::RendererUnavailable)?;
    Ok((engine, renderer))
}

fn render_to_wav(
    engine: &mut AudioEngine,
    mut renderer: Renderer,
    output: &Path,
) -> Result<BounceReport, BounceError> {
    let sample_rate = engine.sample_rate();
    let spec = hound::WavSpec {
        channels: RENDER_CHANNELS as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;

    let block_frames = engine.config().block_size as usize;
    let mut block = vec![0.0f32; block_frames * RENDER_CHANNELS];
    let mut total = 0usize;

    engine.play()?;
    loop {
        let frames = renderer.render(&mut block);
        for &sample in &block[..frames * RENDER_CHANNELS] {
            writer.write_sample(sample)?;
        }
        total += frames;
        if engine.state() != PlaybackState::Playing {
            break;
        }
    }
    writer.finalize()?;

    log::info!(
        "Bounced {} frames at {} Hz to {:?}",
        total,
        sample_rate,
        output
    );
    Ok(BounceReport {
        frames: total,
        sample_rate,
    })
}
