//! State shared between the control thread and the audio callback
//!
//! Every field is a single atomic word (or the lock-free visualization
//! ring), so the callback never waits on the control thread.

use super::cursor::SeekMailbox;
use crate::effects::EffectMode;
use crate::visualization::VisualizationSink;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Whether the callback emits track audio or silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct SharedState {
    state: AtomicU8,
    effect: AtomicU8,
    /// f32 bits
    volume: AtomicU32,
    /// f64 bits, seconds
    position: AtomicU64,
    /// Bumped by the control thread whenever the loaded track changes
    generation: AtomicU64,
    blocks_rendered: AtomicU64,
    stream_aborted: AtomicBool,
    seek: SeekMailbox,
    visualization: VisualizationSink,
}

impl SharedState {
    pub fn new(volume: f32, effect: EffectMode, visualization_capacity: usize) -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            effect: AtomicU8::new(effect.as_u8()),
            volume: AtomicU32::new(volume.to_bits()),
            position: AtomicU64::new(0.0f64.to_bits()),
            generation: AtomicU64::new(0),
            blocks_rendered: AtomicU64::new(0),
            stream_aborted: AtomicBool::new(false),
            seek: SeekMailbox::new(),
            visualization: VisualizationSink::new(visualization_capacity),
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to` only if nobody changed the state meanwhile
    pub fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn effect(&self) -> EffectMode {
        EffectMode::from_u8(self.effect.load(Ordering::Relaxed))
    }

    pub fn set_effect(&self, mode: EffectMode) {
        self.effect.store(mode.as_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Last published playback position in seconds
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    pub fn publish_position(&self, seconds: f64) {
        self.position.store(seconds.to_bits(), Ordering::Release);
    }

    /// Publish `seconds` only if the position still reads `observed`.
    /// Returns false when the control thread stored a value in between.
    pub fn replace_position(&self, observed: f64, seconds: f64) -> bool {
        self.position
            .compare_exchange(
                observed.to_bits(),
                seconds.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation and return it
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered.load(Ordering::Acquire)
    }

    #[inline]
    pub fn note_block(&self) {
        self.blocks_rendered.fetch_add(1, Ordering::Release);
    }

    pub fn stream_aborted(&self) -> bool {
        self.stream_aborted.load(Ordering::Acquire)
    }

    pub fn set_stream_aborted(&self, aborted: bool) {
        self.stream_aborted.store(aborted, Ordering::Release);
    }

    #[inline]
    pub fn seek(&self) -> &SeekMailbox {
        &self.seek
    }

    #[inline]
    pub fn visualization(&self) -> &VisualizationSink {
        &self.visualization
    }
}
