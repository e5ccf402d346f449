/* Whirl - terminal player for the effect engine.
Loads one track, plays it through the selected effect and draws the
position and a live spectrum.
*/

use clap::Parser;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use whirl::engine::{AudioEngine, PlaybackState, PlaybackStatus};
use whirl::utils::init_logger;
use whirl::visualization::spectrum::{SpectrumAnalyzer, DEFAULT_BINS};
use whirl::{EffectMode, EngineConfig};

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const SPECTRUM_ROWS: usize = 8;
/// ~30 Hz redraw
const FRAME: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "whirl", about = "Play a track through 3D/8D and tonal effects")]
struct Args {
    /// Audio file to play
    file: PathBuf,

    /// Initial effect (flat, rock, 3d, 8d, dolby, pop, classical, hiphop, folk, dance, jazz)
    #[arg(short, long)]
    effect: Option<EffectMode>,

    /// Initial volume, 0-1
    #[arg(short, long)]
    volume: Option<f32>,

    /// YAML engine config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    bounce: Option<PathBuf>,
}

// Create a visual bar for normalized value
fn make_bar(normalized: f32, width: usize) -> String {
    let filled = (normalized.clamp(0.0, 1.0) * width as f32).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

// Key for effect slot: 1-9 then 0
fn effect_for_key(c: char) -> Option<EffectMode> {
    let slot = match c {
        '1'..='9' => c as usize - '1' as usize,
        '0' => 9,
        _ => return None,
    };
    EffectMode::ALL.get(slot).copied()
}

fn next_effect(current: EffectMode) -> EffectMode {
    let index = EffectMode::ALL
        .iter()
        .position(|&mode| mode == current)
        .unwrap_or(0);
    EffectMode::ALL[(index + 1) % EffectMode::ALL.len()]
}

fn render_display(name: &str, status: &PlaybackStatus, spectrum: &[f32], message: &str) {
    print!("\x1b[2J\x1b[H\x1b[?7l");

    print!("=== Whirl: {} ===\r\n", name);
    print!("SPACE=play/pause S=stop ←→=seek 5s +/-=volume 1-0=effect E=next effect Q=quit\r\n");
    let effects: Vec<String> = EffectMode::ALL
        .iter()
        .enumerate()
        .map(|(i, mode)| {
            let label = match i {
                0..=9 => format!("{}:{}", (i + 1) % 10, mode),
                _ => mode.to_string(),
            };
            if *mode == status.effect {
                format!("[{}]", label)
            } else {
                format!(" {} ", label)
            }
        })
        .collect();
    print!("{}\r\n\r\n", effects.join(""));

    let progress = if status.duration_seconds > 0.0 {
        (status.position_seconds / status.duration_seconds) as f32
    } else {
        0.0
    };
    print!(
        "{:<8} {} / {} [{}]\r\n",
        status.state.name(),
        format_time(status.position_seconds),
        format_time(status.duration_seconds),
        make_bar(progress, 40)
    );
    print!(
        "Volume  [{}] {:>3.0}%\r\n\r\n",
        make_bar(status.volume, 20),
        status.volume * 100.0
    );

    // Spectrum, tallest bar scaled to the full height
    let peak = spectrum.iter().fold(1e-6f32, |acc, &m| acc.max(m));
    for row in (0..SPECTRUM_ROWS).rev() {
        let threshold = (row as f32 + 0.5) / SPECTRUM_ROWS as f32;
        let line: String = spectrum
            .iter()
            .map(|&m| if m / peak >= threshold { '█' } else { ' ' })
            .collect();
        print!("{}\r\n", line);
    }

    print!("\r\n{}", message);
    let _ = io::stdout().flush();
}

fn run_player(engine: &mut AudioEngine, name: &str) -> anyhow::Result<()> {
    let mut analyzer = SpectrumAnalyzer::new(engine.config().visualization_capacity, DEFAULT_BINS);
    let mut snapshot = Vec::with_capacity(engine.config().visualization_capacity);
    let mut message = String::new();

    loop {
        for error in engine.poll_device_errors() {
            message = error.to_string();
        }

        let status = engine.status();
        engine.shared().visualization().snapshot_into(&mut snapshot);
        let spectrum = if status.state == PlaybackState::Playing {
            analyzer.analyze(&snapshot).to_vec()
        } else {
            vec![0.0; DEFAULT_BINS]
        };
        render_display(name, &status, &spectrum, &message);

        if !event::poll(FRAME)? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char(' ') => match engine.state() {
                PlaybackState::Playing => engine.pause(),
                _ => {
                    if let Err(e) = engine.play() {
                        message = e.to_string();
                    }
                }
            },
            KeyCode::Char('s') => engine.stop(),
            KeyCode::Left => engine.seek(engine.get_position() - SEEK_STEP_SECONDS),
            KeyCode::Right => engine.seek(engine.get_position() + SEEK_STEP_SECONDS),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                engine.set_volume(engine.volume() + VOLUME_STEP)
            }
            KeyCode::Char('-') | KeyCode::Down => engine.set_volume(engine.volume() - VOLUME_STEP),
            KeyCode::Char('e') | KeyCode::Tab => engine.set_effect(next_effect(engine.effect())),
            KeyCode::Char(c) => {
                if let Some(mode) = effect_for_key(c) {
                    engine.set_effect(mode);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(effect) = args.effect {
        config.effect = effect;
    }
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    let config = config.sanitized();

    if let Some(output) = &args.bounce {
        return bounce(&args.file, output, config);
    }

    let mut engine = AudioEngine::new(config);
    engine.open_default_output()?;
    let info = engine.load(&args.file)?;
    log::info!("Track length {}", format_time(info.duration_seconds));
    engine.play()?;

    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    execute!(io::stdout(), Clear(ClearType::All), cursor::Hide)?;
    enable_raw_mode()?;
    let result = run_player(&mut engine, &name);

    // Restore the terminal before reporting anything
    disable_raw_mode()?;
    execute!(io::stdout(), cursor::Show)?;
    print!("\x1b[?7h\r\n");
    engine.stop();
    result
}

fn bounce(input: &std::path::Path, output: &std::path::Path, config: EngineConfig) -> anyhow::Result<()> {
    let options = whirl::bounce::BounceOptions::from_config(config);
    let report = whirl::bounce::bounce_file(input, output, &options)?;
    println!(
        "Wrote {} ({} at {} Hz)",
        output.display(),
        format_time(report.duration_seconds()),
        report.sample_rate
    );
    Ok(())
}
