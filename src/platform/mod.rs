/// Platform abstraction for audio output
/// An output pulls blocks from a `Renderer` on its own thread and reports
/// device trouble through `DeviceStatus`.

use crate::engine::{PlaybackState, Renderer, SharedState};
use crate::error::DeviceError;
use crossbeam::channel::{Sender, TrySendError};
use std::sync::Arc;

/// Trait for platform-specific audio output implementations
pub trait AudioOutput {
    /// Pick a device and negotiate a stream config close to `sample_rate`
    fn initialize(&mut self, sample_rate: u32, block_size: u32) -> Result<(), DeviceError>;

    /// Build the stream around `renderer`; the output owns it from now on
    fn open(&mut self, renderer: Renderer, status: DeviceStatus) -> Result<(), DeviceError>;

    /// Start pulling audio
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Pause the stream without tearing it down
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Tear the stream down, dropping the renderer
    fn close(&mut self);

    /// Sample rate the device actually runs at
    fn sample_rate(&self) -> u32;

    /// Check if the audio output is active
    fn is_active(&self) -> bool;
}

/// Error reporting handle given to an output when it is opened
///
/// Safe to use from a device error callback: it never blocks. Fatal errors
/// stop playback right away so the engine does not keep claiming to play
/// into a dead stream.
#[derive(Clone)]
pub struct DeviceStatus {
    errors: Sender<DeviceError>,
    shared: Arc<SharedState>,
}

impl DeviceStatus {
    pub fn new(errors: Sender<DeviceError>, shared: Arc<SharedState>) -> Self {
        Self { errors, shared }
    }

    pub fn report(&self, error: DeviceError) {
        if error.is_fatal() {
            self.shared.set_stream_aborted(true);
            self.shared.set_state(PlaybackState::Stopped);
        }
        match self.errors.try_send(error) {
            Ok(()) => {}
            // The engine is gone or not polling; fatal state is already set
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(feature = "native")]
pub mod cpal_output;

#[cfg(feature = "native")]
pub use self::cpal_output::CpalOutput;
