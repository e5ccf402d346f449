//! The audio callback body
//!
//! A `Renderer` is owned by whichever thread pulls audio (a cpal stream,
//! the offline bouncer, or a test). It holds everything the callback
//! mutates; the control thread reaches it only through `SharedState` and
//! the command queue. `render` never allocates, locks, or logs.

use super::command::RenderCommand;
use super::cursor::PlaybackCursor;
use super::shared::{PlaybackState, SharedState};
use crate::config::EngineConfig;
use crate::effects::{EffectProcessor, EffectState};
use crate::track::SampleBuffer;
use crate::utils::SmoothedParam;
use basedrop::Shared;
use rtrb::Consumer;
use std::sync::Arc;

/// Interleaved output channels produced by `render`
pub const RENDER_CHANNELS: usize = 2;

pub struct Renderer {
    shared: Arc<SharedState>,
    commands: Consumer<RenderCommand>,
    track: Option<Shared<SampleBuffer>>,
    /// Generation of the last command applied
    generation: u64,
    cursor: PlaybackCursor,
    phase: EffectState,
    effects: EffectProcessor,
    volume: SmoothedParam,
    rotation_speed: f64,
    smoothing_ms: f32,
    was_playing: bool,
}

impl Renderer {
    pub fn new(
        shared: Arc<SharedState>,
        commands: Consumer<RenderCommand>,
        config: &EngineConfig,
        sample_rate: u32,
    ) -> Self {
        Self {
            volume: SmoothedParam::new_gain(
                shared.volume(),
                sample_rate as f32,
                config.volume_smoothing_ms,
            ),
            shared,
            commands,
            track: None,
            generation: 0,
            cursor: PlaybackCursor::new(sample_rate),
            phase: EffectState::new(config.rotation_speed, sample_rate),
            effects: EffectProcessor::new(config.effects.clone()),
            rotation_speed: config.rotation_speed,
            smoothing_ms: config.volume_smoothing_ms,
            was_playing: false,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn phase(&self) -> &EffectState {
        &self.phase
    }

    /// Render one block of interleaved stereo into `out`.
    ///
    /// The whole block is overwritten: track audio while Playing, silence
    /// otherwise and after the end of the track. Returns the number of
    /// source frames consumed.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        // Anything the control thread publishes after this read wins
        let observed = self.shared.position();
        self.apply_commands();

        // Seeks are honored in every state so a scrub while paused moves
        // the position the UI shows
        if let Some(seconds) = self.shared.seek().take() {
            let len = self.track.as_ref().map_or(0, |track| track.len());
            self.cursor.seek_seconds(seconds, len);
        }

        let frames = if self.shared.state() == PlaybackState::Playing {
            self.render_track(out)
        } else {
            self.was_playing = false;
            0
        };

        self.publish_position(observed);
        self.shared.note_block();
        frames
    }

    fn render_track(&mut self, out: &mut [f32]) -> usize {
        let Some(track) = self.track.as_ref() else {
            self.shared
                .transition(PlaybackState::Playing, PlaybackState::Stopped);
            self.was_playing = false;
            return 0;
        };
        let samples = track.samples();
        let len = samples.len();
        let start = self.cursor.index();
        if start >= len {
            self.shared
                .transition(PlaybackState::Playing, PlaybackState::Stopped);
            self.was_playing = false;
            return 0;
        }

        // Effect and volume are read once per block
        let mode = self.shared.effect();
        let volume = self.shared.volume();
        if self.was_playing {
            self.volume.set_target(volume);
        } else {
            self.volume.set_immediate(volume);
        }

        let frames = (out.len() / RENDER_CHANNELS).min(len - start);
        let sink = self.shared.visualization();
        let echo = mode.uses_echo();

        for (offset, frame) in out
            .chunks_exact_mut(RENDER_CHANNELS)
            .take(frames)
            .enumerate()
        {
            let index = start + offset;
            let gain = self.volume.tick();
            let base = samples[index] * gain;
            sink.push(base);

            let tap = if echo {
                self.effects.echo_tap(samples, index) * gain
            } else {
                0.0
            };
            let stereo = self
                .effects
                .process_with_echo(base, tap, self.phase.angle(), mode);
            frame[0] = stereo.left;
            frame[1] = stereo.right;
            self.phase.advance();
        }

        self.cursor.advance(frames);
        if self.cursor.is_at_end(len) {
            self.shared
                .transition(PlaybackState::Playing, PlaybackState::Stopped);
            self.was_playing = false;
        } else {
            self.was_playing = true;
        }
        frames
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                RenderCommand::Load { track, generation } => {
                    let rate = track.sample_rate();
                    self.cursor.reset(rate);
                    self.phase.reset(self.rotation_speed, rate);
                    self.volume.set_smooth_time(rate as f32, self.smoothing_ms);
                    self.shared.visualization().clear();
                    // The previous track, if any, goes to the collector
                    self.track = Some(track);
                    self.generation = generation;
                }
                RenderCommand::Unload { generation } => {
                    let rate = self.cursor.sample_rate();
                    self.cursor.reset(rate);
                    self.phase.reset(self.rotation_speed, rate);
                    self.shared.visualization().clear();
                    self.track = None;
                    self.generation = generation;
                }
            }
            self.was_playing = false;
        }
    }

    fn publish_position(&self, observed: f64) {
        // A newer track or seek owns the published value until we catch up
        if self.generation != self.shared.generation() || self.shared.seek().is_pending() {
            return;
        }
        self.shared.replace_position(observed, self.cursor.position_seconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectMode;
    use crate::engine::command::command_channel;
    use basedrop::Collector;
    use rtrb::Producer;

    struct Harness {
        shared: Arc<SharedState>,
        tx: Producer<RenderCommand>,
        renderer: Renderer,
        collector: Collector,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            let shared = Arc::new(SharedState::new(
                config.volume,
                config.effect,
                config.visualization_capacity,
            ));
            let (tx, rx) = command_channel(8);
            let renderer = Renderer::new(shared.clone(), rx, &config, config.working_sample_rate);
            Self {
                shared,
                tx,
                renderer,
                collector: Collector::new(),
            }
        }

        fn load(&mut self, samples: Vec<f32>) {
            let generation = self.shared.next_generation();
            let track = Shared::new(
                &self.collector.handle(),
                SampleBuffer::from_pcm(samples, 22050).unwrap(),
            );
            assert!(self.tx.push(RenderCommand::Load { track, generation }).is_ok());
        }
    }

    fn flat_config() -> EngineConfig {
        EngineConfig {
            volume: 1.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_silence_until_playing() {
        let mut h = Harness::new(flat_config());
        h.load(vec![1.0; 4096]);
        let mut out = vec![1.0f32; 2048];

        assert_eq!(h.renderer.render(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(h.renderer.has_track());
        assert_eq!(h.shared.blocks_rendered(), 1);
    }

    #[test]
    fn test_flat_block_matches_source() {
        let mut h = Harness::new(flat_config());
        let source: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.01).sin()).collect();
        h.load(source.clone());
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 2048];
        assert_eq!(h.renderer.render(&mut out), 1024);
        let peak = source.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        for (i, frame) in out.chunks_exact(2).enumerate() {
            let expected = (source[i] / peak).tanh();
            assert!((frame[0] - expected).abs() < 1e-6);
            assert_eq!(frame[0], frame[1]);
        }
        assert_eq!(h.renderer.cursor().index(), 1024);
        assert!((h.shared.position() - 1024.0 / 22050.0).abs() < 1e-12);
    }

    #[test]
    fn test_end_of_track_stops_and_zero_fills() {
        let mut h = Harness::new(flat_config());
        h.load(vec![0.5; 1500]);
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 2048];
        assert_eq!(h.renderer.render(&mut out), 1024);
        assert_eq!(h.shared.state(), PlaybackState::Playing);

        out.fill(9.0);
        assert_eq!(h.renderer.render(&mut out), 476);
        assert_eq!(h.shared.state(), PlaybackState::Stopped);
        assert!(out[..952].iter().all(|&s| s != 0.0));
        assert!(out[952..].iter().all(|&s| s == 0.0));
        assert_eq!(h.renderer.cursor().index(), 1500);
    }

    #[test]
    fn test_seek_consumed_while_paused() {
        let mut h = Harness::new(flat_config());
        h.load(vec![0.5; 22050]);
        h.shared.set_state(PlaybackState::Paused);
        h.shared.seek().request(0.5);

        let mut out = vec![0.0f32; 2048];
        h.renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.renderer.cursor().index(), 11025);
        assert_eq!(h.shared.position(), 0.5);
    }

    #[test]
    fn test_phase_advances_once_per_rendered_sample() {
        let mut h = Harness::new(EngineConfig {
            effect: EffectMode::EightD,
            ..flat_config()
        });
        h.load(vec![0.5; 4096]);
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 512];
        h.renderer.render(&mut out);
        assert!((h.renderer.phase().angle() - 256.0 * 0.0006).abs() < 1e-9);
    }

    #[test]
    fn test_visualization_receives_pre_effect_samples() {
        let mut h = Harness::new(EngineConfig {
            volume: 0.5,
            effect: EffectMode::Rock,
            ..EngineConfig::default()
        });
        h.load(vec![1.0; 4096]);
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 2048];
        h.renderer.render(&mut out);
        let snapshot = h.shared.visualization().snapshot();
        assert!(snapshot.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_stale_generation_does_not_publish() {
        let mut h = Harness::new(flat_config());
        h.load(vec![0.5; 4096]);
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 256];
        h.renderer.render(&mut out);
        assert!(h.shared.position() > 0.0);

        // The control thread moved on to a new track that has not arrived yet
        h.shared.next_generation();
        h.shared.publish_position(0.0);
        h.renderer.render(&mut out);
        assert_eq!(h.shared.position(), 0.0);
    }

    #[test]
    fn test_seek_published_during_block_is_kept() {
        let mut h = Harness::new(flat_config());
        h.load(vec![0.5; 22050 * 4]);
        h.shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0f32; 512];
        h.renderer.render(&mut out);
        let observed = h.shared.position();

        // seek() lands after the mailbox check but before the store
        h.shared.publish_position(3.0);
        h.renderer.publish_position(observed);
        assert_eq!(h.shared.position(), 3.0);

        // Once nothing intervenes the renderer publishes again
        h.shared.seek().request(3.0);
        h.renderer.render(&mut out);
        assert!((h.shared.position() - (3.0 + 256.0 / 22050.0)).abs() < 1e-9);
    }

    #[test]
    fn test_eight_d_echo_follows_volume() {
        let mut h = Harness::new(EngineConfig {
            volume: 0.0,
            effect: EffectMode::EightD,
            ..EngineConfig::default()
        });
        h.load(vec![0.5; 22050 * 2]);
        h.shared.set_state(PlaybackState::Playing);
        // Well past the echo delay so every frame has a tap
        h.shared.seek().request(1.0);

        let mut out = vec![1.0f32; 2048];
        assert_eq!(h.renderer.render(&mut out), 1024);
        assert!(h.renderer.cursor().index() > 22050);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_playing_without_track_stops() {
        let mut h = Harness::new(flat_config());
        h.shared.set_state(PlaybackState::Playing);
        let mut out = vec![0.0f32; 64];
        assert_eq!(h.renderer.render(&mut out), 0);
        assert_eq!(h.shared.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_unload_frees_through_collector() {
        let mut h = Harness::new(flat_config());
        h.load(vec![0.5; 64]);
        let mut out = vec![0.0f32; 64];
        h.renderer.render(&mut out);

        let generation = h.shared.next_generation();
        assert!(h.tx.push(RenderCommand::Unload { generation }).is_ok());
        h.renderer.render(&mut out);
        assert!(!h.renderer.has_track());
        h.collector.collect();
        assert_eq!(h.collector.alloc_count(), 0);
    }
}
