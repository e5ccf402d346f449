//! Playback engine: control API on one side, real-time renderer on the other
//!
//! ```text
//!   control thread                         audio thread
//!   ──────────────                         ────────────
//!   AudioEngine ──RenderCommand (rtrb)───► Renderer::render()
//!        │                                      │
//!        └──────────── SharedState ◄────────────┘
//!          state, effect, volume, seek mailbox,
//!          published position, visualization ring
//! ```
//!
//! The engine owns the loaded track as a `basedrop::Shared` and frees
//! retired tracks from the control thread with its `Collector`.

pub mod command;
pub mod cursor;
pub mod renderer;
pub mod shared;

pub use command::{command_channel, RenderCommand, COMMAND_QUEUE_CAPACITY};
pub use cursor::{PlaybackCursor, SeekMailbox};
pub use renderer::{Renderer, RENDER_CHANNELS};
pub use shared::{PlaybackState, SharedState};

use crate::config::EngineConfig;
use crate::effects::EffectMode;
use crate::error::{DeviceError, LoadError};
use crate::platform::{AudioOutput, DeviceStatus};
use crate::track::resample::resample_mono;
use crate::track::{SampleBuffer, SymphoniaDecoder, TrackDecoder, TrackInfo};
use basedrop::{Collector, Shared};
use crossbeam::channel::{self, Receiver, Sender};
use rtrb::Producer;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Device errors buffered between polls
const DEVICE_ERROR_CAPACITY: usize = 32;

/// Everything a UI needs for one redraw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub effect: EffectMode,
    pub volume: f32,
}

pub struct AudioEngine {
    config: EngineConfig,
    /// Rate tracks are stored at; follows the device when one is attached
    sample_rate: u32,
    shared: Arc<SharedState>,
    commands: Producer<RenderCommand>,
    /// Renderer not yet handed to an output or caller
    pending_renderer: Option<Renderer>,
    decoder: Box<dyn TrackDecoder>,
    track: Option<Shared<SampleBuffer>>,
    output: Option<Box<dyn AudioOutput>>,
    device_errors_tx: Sender<DeviceError>,
    device_errors: Receiver<DeviceError>,
    collector: Collector,
}

impl AudioEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let shared = Arc::new(SharedState::new(
            config.volume,
            config.effect,
            config.visualization_capacity,
        ));
        let (commands, consumer) = command_channel(COMMAND_QUEUE_CAPACITY);
        let renderer = Renderer::new(
            shared.clone(),
            consumer,
            &config,
            config.working_sample_rate,
        );
        let (device_errors_tx, device_errors) = channel::bounded(DEVICE_ERROR_CAPACITY);

        Self {
            sample_rate: config.working_sample_rate,
            config,
            shared,
            commands,
            pending_renderer: Some(renderer),
            decoder: Box::new(SymphoniaDecoder::new()),
            track: None,
            output: None,
            device_errors_tx,
            device_errors,
            collector: Collector::new(),
        }
    }

    /// Replace the file decoder
    pub fn with_decoder(mut self, decoder: Box<dyn TrackDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rate tracks are decoded and rendered at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Hand out the renderer to drive playback without a device (offline
    /// rendering, tests). Returns `None` once it has been taken or given to
    /// an output.
    pub fn take_renderer(&mut self) -> Option<Renderer> {
        self.pending_renderer.take()
    }

    /// Open `output` and start it pulling audio from a fresh renderer.
    ///
    /// If the device cannot run at the working rate, the engine adopts the
    /// device rate and resamples the loaded track.
    pub fn attach_output(&mut self, mut output: Box<dyn AudioOutput>) -> Result<(), DeviceError> {
        self.collect_garbage();
        self.detach_output();

        output.initialize(self.sample_rate, self.config.block_size)?;
        let device_rate = output.sample_rate();
        if device_rate != self.sample_rate {
            self.change_sample_rate(device_rate)?;
        }

        let renderer = self.spawn_renderer();
        let started = output
            .open(renderer, self.device_status())
            .and_then(|()| output.start());
        if let Err(e) = started {
            log::warn!("Failed to start output: {}", e);
            output.close();
            // Keep the engine usable without a device
            let renderer = self.spawn_renderer();
            self.pending_renderer = Some(renderer);
            return Err(e);
        }

        self.shared.set_stream_aborted(false);
        self.output = Some(output);
        log::info!("Output attached at {} Hz", self.sample_rate);
        Ok(())
    }

    /// Convenience: attach the default cpal device
    #[cfg(feature = "native")]
    pub fn open_default_output(&mut self) -> Result<(), DeviceError> {
        self.attach_output(Box::new(crate::platform::CpalOutput::new()))
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Stop and drop the current output, if any
    pub fn detach_output(&mut self) {
        if let Some(mut output) = self.output.take() {
            self.shared.set_state(PlaybackState::Stopped);
            if let Err(e) = output.stop() {
                log::warn!("Failed to stop output: {}", e);
            }
            output.close();
        }
    }

    /// Decode `path` and make it the current track.
    ///
    /// Playback halts and the previous track is released first, so on error
    /// the engine is Stopped with nothing loaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<TrackInfo, LoadError> {
        let path = path.as_ref();
        log::info!("Loading {:?}", path);
        let generation = self.halt_and_release();

        let decoded = match self.decoder.decode_to_mono_pcm(path, self.sample_rate) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Failed to load {:?}: {}", path, e);
                self.send_unload(generation);
                return Err(e);
            }
        };
        self.install(decoded.samples, decoded.sample_rate, generation)
    }

    /// Load already-decoded mono PCM, resampling it to the working rate
    pub fn load_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<TrackInfo, LoadError> {
        let generation = self.halt_and_release();
        self.install(samples, sample_rate, generation)
    }

    /// Start or resume playback.
    ///
    /// Without a track this does nothing. A finished track starts over. If
    /// the stream died, one reopen is attempted.
    pub fn play(&mut self) -> Result<(), DeviceError> {
        self.collect_garbage();
        let Some(duration) = self.duration() else {
            log::warn!("play() with no track loaded");
            return Ok(());
        };

        if self.shared.stream_aborted() {
            self.reopen_output()?;
        }

        if self.shared.state() != PlaybackState::Paused && self.get_position() >= duration {
            self.request_seek(0.0);
        }
        self.shared.set_state(PlaybackState::Playing);
        log::info!("Playing from {:.2}s", self.get_position());
        Ok(())
    }

    /// Freeze playback at the current position
    pub fn pause(&self) {
        if self
            .shared
            .transition(PlaybackState::Playing, PlaybackState::Paused)
        {
            log::info!("Paused at {:.2}s", self.get_position());
        }
    }

    /// Continue after `pause()`; no effect in other states
    pub fn resume(&mut self) -> Result<(), DeviceError> {
        if self.shared.state() == PlaybackState::Paused {
            self.play()
        } else {
            Ok(())
        }
    }

    /// Stop playback and rewind to the start.
    ///
    /// With an output running, waits (bounded by `stop_timeout_ms`) until
    /// the callback has completed a block after the state change, so no
    /// track audio is produced once this returns.
    pub fn stop(&mut self) {
        self.collect_garbage();
        let blocks_before = self.shared.blocks_rendered();
        self.shared.set_state(PlaybackState::Stopped);
        if self.track.is_some() {
            self.request_seek(0.0);
        }

        let running = self.output.as_ref().is_some_and(|o| o.is_active())
            && !self.shared.stream_aborted();
        if running {
            let timeout = Duration::from_millis(self.config.stop_timeout_ms);
            let started = Instant::now();
            while self.shared.blocks_rendered() == blocks_before {
                if started.elapsed() >= timeout {
                    log::warn!("Audio callback did not confirm stop within {:?}", timeout);
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        log::info!("Stopped");
    }

    /// Jump to `position_seconds`, clamped to the track.
    ///
    /// Takes effect at the start of the next block; `get_position` reports
    /// the target immediately.
    pub fn seek(&self, position_seconds: f64) {
        if !position_seconds.is_finite() {
            log::warn!("Ignoring seek to {}", position_seconds);
            return;
        }
        if self.track.is_none() {
            return;
        }
        self.request_seek(position_seconds);
    }

    pub fn set_effect(&self, mode: EffectMode) {
        self.shared.set_effect(mode);
        log::info!("Effect: {}", mode);
    }

    pub fn effect(&self) -> EffectMode {
        self.shared.effect()
    }

    /// Set output volume, clamped to [0, 1]; NaN is ignored
    pub fn set_volume(&self, level: f32) {
        if level.is_nan() {
            return;
        }
        self.shared.set_volume(level.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Position in seconds; frozen while Paused
    pub fn get_position(&self) -> f64 {
        let position = self.shared.position();
        match self.duration() {
            Some(duration) => position.clamp(0.0, duration),
            None => 0.0,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.track.as_ref().map(|track| track.duration_seconds())
    }

    pub fn track_info(&self) -> Option<TrackInfo> {
        self.track.as_ref().map(|track| track.info())
    }

    /// The loaded track, shared with the renderer
    pub fn track(&self) -> Option<&SampleBuffer> {
        self.track.as_deref()
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state(),
            position_seconds: self.get_position(),
            duration_seconds: self.duration().unwrap_or(0.0),
            effect: self.effect(),
            volume: self.volume(),
        }
    }

    /// Copy of the visualization ring, oldest sample first
    pub fn get_visualization_snapshot(&self) -> Vec<f32> {
        self.shared.visualization().snapshot()
    }

    /// Drain device errors reported since the last call
    pub fn poll_device_errors(&mut self) -> Vec<DeviceError> {
        self.collect_garbage();
        let errors: Vec<DeviceError> = self.device_errors.try_iter().collect();
        for error in &errors {
            if error.is_fatal() {
                log::warn!("{}; playback stopped", error);
            } else {
                log::warn!("{}", error);
            }
        }
        errors
    }

    /// Reclaim track memory the renderer has let go of
    pub fn collect_garbage(&mut self) {
        self.collector.collect();
    }

    fn device_status(&self) -> DeviceStatus {
        DeviceStatus::new(self.device_errors_tx.clone(), self.shared.clone())
    }

    fn request_seek(&self, seconds: f64) {
        let seconds = seconds.clamp(0.0, self.duration().unwrap_or(0.0));
        self.shared.seek().request(seconds);
        self.shared.publish_position(seconds);
    }

    /// Stop, forget the current track and start a new generation
    fn halt_and_release(&mut self) -> u64 {
        self.collect_garbage();
        self.shared.set_state(PlaybackState::Stopped);
        self.shared.seek().clear();
        let generation = self.shared.next_generation();
        self.shared.publish_position(0.0);
        self.track = None;
        generation
    }

    fn install(&mut self, samples: Vec<f32>, sample_rate: u32, generation: u64) -> Result<TrackInfo, LoadError> {
        let buffer = match self.prepare(samples, sample_rate) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.send_unload(generation);
                return Err(e);
            }
        };

        let info = buffer.info();
        let track = Shared::new(&self.collector.handle(), buffer);
        if self
            .commands
            .push(RenderCommand::Load {
                track: track.clone(),
                generation,
            })
            .is_err()
        {
            log::warn!("Render command queue full; track not loaded");
            return Err(LoadError::QueueFull);
        }
        self.track = Some(track);
        log::info!(
            "Loaded {:.2}s of audio at {} Hz",
            info.duration_seconds,
            info.sample_rate
        );
        Ok(info)
    }

    fn prepare(&self, samples: Vec<f32>, sample_rate: u32) -> Result<SampleBuffer, LoadError> {
        if sample_rate == 0 {
            return Err(LoadError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(LoadError::EmptyTrack);
        }
        let samples = if sample_rate != self.sample_rate {
            resample_mono(&samples, sample_rate, self.sample_rate)?
        } else {
            samples
        };
        SampleBuffer::from_pcm(samples, self.sample_rate)
    }

    fn send_unload(&mut self, generation: u64) {
        if self
            .commands
            .push(RenderCommand::Unload { generation })
            .is_err()
        {
            log::warn!("Render command queue full; unload dropped");
        }
    }

    /// New command queue and renderer, primed with the current track and
    /// position
    fn spawn_renderer(&mut self) -> Renderer {
        let (commands, consumer) = command_channel(COMMAND_QUEUE_CAPACITY);
        self.commands = commands;
        self.pending_renderer = None;

        let renderer = Renderer::new(self.shared.clone(), consumer, &self.config, self.sample_rate);
        let generation = self.shared.generation();
        let position = self.get_position();
        match self.track.clone() {
            Some(track) => {
                // A fresh queue always has room
                let _ = self.commands.push(RenderCommand::Load { track, generation });
                self.shared.seek().request(position);
            }
            None => {
                let _ = self.commands.push(RenderCommand::Unload { generation });
            }
        }
        renderer
    }

    /// Move to a new working rate, resampling the loaded track
    fn change_sample_rate(&mut self, sample_rate: u32) -> Result<(), DeviceError> {
        if sample_rate == 0 {
            return Err(DeviceError::OpenFailed("device reported 0 Hz".to_string()));
        }
        log::info!(
            "Working sample rate {} Hz -> {} Hz",
            self.sample_rate,
            sample_rate
        );
        let old_rate = self.sample_rate;
        let position = self.get_position();
        self.sample_rate = sample_rate;

        let Some(track) = self.track.take() else {
            return Ok(());
        };
        let resampled = resample_mono(track.samples(), old_rate, sample_rate)
            .and_then(|samples| SampleBuffer::from_pcm(samples, sample_rate))
            .map_err(|e| DeviceError::OpenFailed(format!("resampling track: {}", e)))?;
        self.track = Some(Shared::new(&self.collector.handle(), resampled));
        self.shared.publish_position(position);
        Ok(())
    }

    /// Single reopen attempt after the stream died
    fn reopen_output(&mut self) -> Result<(), DeviceError> {
        let Some(mut output) = self.output.take() else {
            self.shared.set_stream_aborted(false);
            return Ok(());
        };
        log::info!("Reopening audio output after stream abort");
        output.close();
        self.collect_garbage();

        let result = output
            .initialize(self.sample_rate, self.config.block_size)
            .and_then(|()| {
                if output.sample_rate() != self.sample_rate {
                    self.change_sample_rate(output.sample_rate())?;
                }
                let renderer = self.spawn_renderer();
                output.open(renderer, self.device_status())?;
                output.start()
            });

        match result {
            Ok(()) => {
                self.shared.set_stream_aborted(false);
                self.output = Some(output);
                Ok(())
            }
            Err(e) => {
                log::warn!("Reopen failed: {}", e);
                output.close();
                self.output = Some(output);
                self.shared.set_state(PlaybackState::Stopped);
                Err(match e {
                    DeviceError::OpenFailed(_) => e,
                    other => DeviceError::OpenFailed(other.to_string()),
                })
            }
        }
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        // The stream goes first so nothing is reading the track when it is freed
        self.detach_output();
        self.pending_renderer = None;
        // Release tracks still queued for a renderer that is gone
        let (commands, _) = command_channel(1);
        self.commands = commands;
        self.track = None;
        self.collector.collect();
    }
}
