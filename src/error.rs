//! Error types for loading, device output and configuration

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced synchronously from `AudioEngine::load`
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be opened
    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container was recognised but decoding failed
    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    /// Decoding produced zero samples
    #[error("Track contains no samples")]
    EmptyTrack,

    /// No demuxer or codec could handle the file
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// A sample rate of 0 Hz was reported or requested
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The audio thread has not drained earlier commands yet
    #[error("Render command queue is full")]
    QueueFull,
}

/// Errors reported by the output device, either from opening a stream or
/// asynchronously through the device status channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No device, no usable config, or the stream could not be built/started
    #[error("Failed to open audio output: {0}")]
    OpenFailed(String),

    /// The running stream died (device unplugged, backend shut down)
    #[error("Audio stream aborted: {0}")]
    StreamAborted(String),

    /// Non-fatal backend report (underrun, overrun, ...)
    #[error("Audio backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    /// Fatal errors stop playback and require an explicit `play()` to reopen
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::StreamAborted(_))
    }
}

/// Errors from reading or writing an `EngineConfig` file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stream_aborted_is_fatal() {
        assert!(DeviceError::StreamAborted("gone".into()).is_fatal());
        assert!(!DeviceError::Backend("underrun".into()).is_fatal());
        assert!(!DeviceError::OpenFailed("no device".into()).is_fatal());
    }

    #[test]
    fn test_load_error_messages() {
        assert_eq!(LoadError::EmptyTrack.to_string(), "Track contains no samples");
        assert_eq!(
            LoadError::InvalidSampleRate(0).to_string(),
            "Invalid sample rate: 0 Hz"
        );
    }
}
