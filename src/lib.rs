//! Real-time playback of mono tracks through spatial and tonal stereo effects
//!
//! Load a track, pick an effect, play. Decoding and all allocation happen on
//! the caller's thread; the audio callback only reads atomics, drains a
//! lock-free command queue and runs the per-sample effect chain.

pub mod config;
pub mod error;

// Loading and DSP
pub mod effects;
pub mod track;

// Playback
pub mod engine;
pub mod platform;
pub mod visualization;

pub mod utils;

// Offline rendering to WAV
#[cfg(feature = "bounce")]
pub mod bounce;

pub use config::EngineConfig;
pub use effects::{EffectMode, EffectParams, EffectProcessor, StereoFrame};
pub use engine::{AudioEngine, PlaybackState, PlaybackStatus, Renderer};
pub use error::{ConfigError, DeviceError, LoadError};
pub use platform::{AudioOutput, DeviceStatus};
pub use track::{SampleBuffer, TrackDecoder, TrackInfo};
pub use visualization::VisualizationSink;

#[cfg(feature = "native")]
pub use platform::CpalOutput;
