// Integration tests for the engine's output lifecycle, using a manually
// pulled output in place of a sound card

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use whirl::engine::{AudioEngine, PlaybackState, Renderer, RENDER_CHANNELS};
use whirl::{AudioOutput, DeviceError, DeviceStatus, EffectMode, EngineConfig};

const RATE: u32 = 22050;

/// Test side of a `ManualOutput`: pull blocks and inject device errors
#[derive(Clone, Default)]
struct OutputHandle {
    renderer: Arc<Mutex<Option<Renderer>>>,
    status: Arc<Mutex<Option<DeviceStatus>>>,
    fail_open: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl OutputHandle {
    /// Render one block the way a device callback would
    fn pull(&self, frames: usize) -> Option<Vec<f32>> {
        let mut guard = self.renderer.lock().unwrap();
        let renderer = guard.as_mut()?;
        let mut out = vec![0.0; frames * RENDER_CHANNELS];
        renderer.render(&mut out);
        Some(out)
    }

    fn report(&self, error: DeviceError) {
        if let Some(status) = self.status.lock().unwrap().as_ref() {
            status.report(error);
        }
    }
}

struct ManualOutput {
    device_rate: u32,
    active: bool,
    handle: OutputHandle,
}

impl ManualOutput {
    fn new(device_rate: u32) -> (Box<Self>, OutputHandle) {
        let handle = OutputHandle::default();
        let output = Box::new(Self {
            device_rate,
            active: false,
            handle: handle.clone(),
        });
        (output, handle)
    }
}

impl AudioOutput for ManualOutput {
    fn initialize(&mut self, _sample_rate: u32, _block_size: u32) -> Result<(), DeviceError> {
        Ok(())
    }

    fn open(&mut self, renderer: Renderer, status: DeviceStatus) -> Result<(), DeviceError> {
        if self.handle.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::OpenFailed("device unplugged".into()));
        }
        self.handle.opens.fetch_add(1, Ordering::SeqCst);
        *self.handle.renderer.lock().unwrap() = Some(renderer);
        *self.handle.status.lock().unwrap() = Some(status);
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.active = false;
        Ok(())
    }

    fn close(&mut self) {
        self.handle.closes.fetch_add(1, Ordering::SeqCst);
        self.handle.renderer.lock().unwrap().take();
        self.handle.status.lock().unwrap().take();
        self.active = false;
    }

    fn sample_rate(&self) -> u32 {
        self.device_rate
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

fn tone(seconds: f32, rate: u32) -> Vec<f32> {
    let frames = (seconds * rate as f32) as usize;
    (0..frames)
        .map(|i| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / rate as f32).sin())
        .collect()
}

fn engine_with(config: EngineConfig) -> AudioEngine {
    AudioEngine::new(EngineConfig {
        volume: 1.0,
        ..config
    })
}

#[test]
fn test_attached_output_pulls_audio() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    assert!(engine.has_output());
    assert!(engine.take_renderer().is_none());

    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.play().unwrap();

    let block = handle.pull(512).unwrap();
    assert!(block.iter().any(|&s| s != 0.0));
    assert!((engine.get_position() - 512.0 / RATE as f64).abs() < 1e-9);
}

#[test]
fn test_device_rate_mismatch_resamples_loaded_track() {
    let mut engine = engine_with(EngineConfig::default());
    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.seek(0.5);

    let (output, handle) = ManualOutput::new(44100);
    engine.attach_output(output).unwrap();

    assert_eq!(engine.sample_rate(), 44100);
    let info = engine.track_info().unwrap();
    assert_eq!(info.sample_rate, 44100);
    assert!((info.frames as i64 - 44100).abs() <= 1);
    assert!((engine.get_position() - 0.5).abs() < 1e-9);

    // The new renderer picks up the old position
    handle.pull(256).unwrap();
    assert!((engine.get_position() - 0.5).abs() < 1e-9);

    engine.play().unwrap();
    handle.pull(441).unwrap();
    assert!((engine.get_position() - 0.51).abs() < 1e-9);

    // Later loads arrive at the device rate directly
    let info = engine.load_samples(tone(0.5, RATE), RATE).unwrap();
    assert_eq!(info.sample_rate, 44100);
}

#[test]
fn test_stream_abort_stops_and_play_reopens() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(2.0, RATE), RATE).unwrap();
    engine.play().unwrap();
    handle.pull(1024).unwrap();
    let before = engine.get_position();

    handle.report(DeviceError::StreamAborted("unplugged".into()));
    assert_eq!(engine.state(), PlaybackState::Stopped);
    let errors = engine.poll_device_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_fatal());
    assert!(engine.poll_device_errors().is_empty());

    engine.play().unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(handle.opens.load(Ordering::SeqCst), 2);
    assert!(!engine.shared().stream_aborted());

    // Playback continues from where the stream died
    handle.pull(1024).unwrap();
    assert!(engine.get_position() > before);
}

#[test]
fn test_failed_reopen_reports_open_failed() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.play().unwrap();

    handle.report(DeviceError::StreamAborted("backend restarted".into()));
    handle.fail_open.store(true, Ordering::SeqCst);

    let err = engine.play().unwrap_err();
    assert!(matches!(err, DeviceError::OpenFailed(_)));
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(handle.pull(64).is_none());

    // Device is back: the next play() tries again
    handle.fail_open.store(false, Ordering::SeqCst);
    engine.play().unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert!(handle.pull(64).is_some());
}

#[test]
fn test_backend_errors_do_not_stop_playback() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.play().unwrap();

    handle.report(DeviceError::Backend("underrun".into()));
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(
        engine.poll_device_errors(),
        vec![DeviceError::Backend("underrun".into())]
    );
}

#[test]
fn test_stop_waits_for_the_callback() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(5.0, RATE), RATE).unwrap();
    engine.play().unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let puller = {
        let handle = handle.clone();
        let running = running.clone();
        std::thread::spawn(move || {
            let mut pulled = 0usize;
            while running.load(Ordering::SeqCst) {
                if handle.pull(128).is_some() {
                    pulled += 1;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            pulled
        })
    };

    std::thread::sleep(Duration::from_millis(20));
    engine.stop();
    assert_eq!(engine.state(), PlaybackState::Stopped);

    // Every block rendered after stop() returned is silent
    for _ in 0..3 {
        let after = handle.pull(128).unwrap();
        assert!(after.iter().all(|&s| s == 0.0));
    }

    running.store(false, Ordering::SeqCst);
    assert!(puller.join().unwrap() > 0);
    assert_eq!(engine.get_position(), 0.0);
}

#[test]
fn test_stop_gives_up_when_no_callback_runs() {
    let mut engine = engine_with(EngineConfig {
        stop_timeout_ms: 30,
        ..Default::default()
    });
    let (output, _handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.play().unwrap();

    let started = Instant::now();
    engine.stop();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(30));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(engine.state(), PlaybackState::Stopped);
}

#[test]
fn test_failed_attach_keeps_engine_usable() {
    let mut engine = engine_with(EngineConfig::default());
    let (output, handle) = ManualOutput::new(RATE);
    handle.fail_open.store(true, Ordering::SeqCst);

    assert!(engine.attach_output(output).is_err());
    assert!(!engine.has_output());
    assert_eq!(handle.closes.load(Ordering::SeqCst), 1);

    let mut renderer = engine.take_renderer().expect("renderer is handed back");
    engine.load_samples(tone(0.5, RATE), RATE).unwrap();
    engine.play().unwrap();
    let mut out = vec![0.0; 64 * RENDER_CHANNELS];
    assert_eq!(renderer.render(&mut out), 64);
}

#[test]
fn test_detach_stops_and_closes() {
    let mut engine = engine_with(EngineConfig {
        effect: EffectMode::EightD,
        ..Default::default()
    });
    let (output, handle) = ManualOutput::new(RATE);
    engine.attach_output(output).unwrap();
    engine.load_samples(tone(1.0, RATE), RATE).unwrap();
    engine.play().unwrap();
    handle.pull(256).unwrap();

    engine.detach_output();
    assert!(!engine.has_output());
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
    assert!(handle.pull(64).is_none());
}

#[test]
fn test_dropping_engine_closes_output() {
    let (output, handle) = ManualOutput::new(RATE);
    {
        let mut engine = engine_with(EngineConfig::default());
        engine.attach_output(output).unwrap();
        engine.load_samples(tone(1.0, RATE), RATE).unwrap();
        engine.play().unwrap();
        handle.pull(128).unwrap();
    }
    assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
    assert!(handle.pull(64).is_none());
}
