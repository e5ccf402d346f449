//! Engine configuration
//!
//! `EngineConfig` carries every tunable the engine reads at construction
//! time. It round-trips through YAML so a player can persist it next to its
//! own settings. Missing fields fall back to defaults.

use crate::effects::{EffectMode, EffectParams};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Working sample rate tracks are decoded to. Halving the usual 44.1 kHz
/// halves the per-sample effect cost at the price of top-octave detail.
pub const DEFAULT_WORKING_SAMPLE_RATE: u32 = 22050;

/// Frames per device callback
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

/// Slots in the visualization ring
pub const DEFAULT_VISUALIZATION_CAPACITY: usize = 256;

/// Rotation speed in rad/s; 0.0006 rad/sample at 22050 Hz
pub const DEFAULT_ROTATION_SPEED: f64 = 0.0006 * DEFAULT_WORKING_SAMPLE_RATE as f64;

const MIN_BLOCK_SIZE: u32 = 64;
const MAX_BLOCK_SIZE: u32 = 8192;
const MIN_VISUALIZATION_CAPACITY: usize = 64;
const MAX_VISUALIZATION_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub working_sample_rate: u32,
    pub block_size: u32,
    pub visualization_capacity: usize,
    /// Radians per second of the shared rotation clock
    pub rotation_speed: f64,
    /// Initial volume (0-1)
    pub volume: f32,
    /// Initial effect mode
    pub effect: EffectMode,
    /// Smoothing time for volume changes during playback
    pub volume_smoothing_ms: f32,
    /// Upper bound on how long `stop()` waits for the callback to go silent
    pub stop_timeout_ms: u64,
    pub effects: EffectParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_sample_rate: DEFAULT_WORKING_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            visualization_capacity: DEFAULT_VISUALIZATION_CAPACITY,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            volume: 0.8,
            effect: EffectMode::Flat,
            volume_smoothing_ms: 15.0,
            stop_timeout_ms: 100,
            effects: EffectParams::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document; absent keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        Ok(config.sanitized())
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading engine config from {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Save configuration to a YAML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(io_err)?;
        log::info!("Saved engine config to {:?}", path);
        Ok(())
    }

    /// Clamp every field into the range the engine can run with
    pub fn sanitized(mut self) -> Self {
        if self.working_sample_rate == 0 {
            self.working_sample_rate = DEFAULT_WORKING_SAMPLE_RATE;
        }
        self.block_size = self.block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
        self.visualization_capacity = self
            .visualization_capacity
            .clamp(MIN_VISUALIZATION_CAPACITY, MAX_VISUALIZATION_CAPACITY);
        if !self.rotation_speed.is_finite() || self.rotation_speed < 0.0 {
            self.rotation_speed = DEFAULT_ROTATION_SPEED;
        }
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            0.8
        };
        if !self.volume_smoothing_ms.is_finite() || self.volume_smoothing_ms < 0.0 {
            self.volume_smoothing_ms = 0.0;
        }
        self.effects = self.effects.sanitized();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rotation_matches_per_sample_increment() {
        let per_sample = DEFAULT_ROTATION_SPEED / DEFAULT_WORKING_SAMPLE_RATE as f64;
        assert!((per_sample - 0.0006).abs() < 1e-12);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("volume: 0.5\neffect: 8d\n").unwrap();
        assert_eq!(config.volume, 0.5);
        assert_eq!(config.effect, EffectMode::EightD);
        assert_eq!(config.working_sample_rate, DEFAULT_WORKING_SAMPLE_RATE);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let config = EngineConfig {
            working_sample_rate: 0,
            block_size: 1,
            visualization_capacity: 1_000_000,
            volume: 7.0,
            rotation_speed: f64::NAN,
            ..EngineConfig::default()
        }
        .sanitized();

        assert_eq!(config.working_sample_rate, DEFAULT_WORKING_SAMPLE_RATE);
        assert_eq!(config.block_size, MIN_BLOCK_SIZE);
        assert_eq!(config.visualization_capacity, MAX_VISUALIZATION_CAPACITY);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.rotation_speed, DEFAULT_ROTATION_SPEED);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.yaml");

        let config = EngineConfig {
            effect: EffectMode::Dolby,
            volume: 0.3,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = EngineConfig::from_yaml_str("volume: [not, a, number]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
