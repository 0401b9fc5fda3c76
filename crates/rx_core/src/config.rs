//! Extraction configuration
//!
//! One explicit record handed to the frame loop at construction. Loadable from
//! JSON or YAML; command-line flags override individual fields afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::pacing::MIN_FPS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Feature layer resolutions (square layers, cells per side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolutions {
    pub screen: u32,
    pub minimap: u32,
}

impl Default for Resolutions {
    fn default() -> Self {
        Self { screen: 84, minimap: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Target frames per second in stepped mode (default: 30)
    pub fps: f64,

    /// Game steps per observation (default: 10)
    pub step_mul: u32,

    /// Screen feature layer resolution (default: 84)
    pub screen_resolution: u32,

    /// Minimap feature layer resolution (default: 64)
    pub minimap_resolution: u32,

    /// Which player's perspective to extract (default: 1)
    pub observed_player: u32,

    /// Let the frame source pace itself instead of stepping it
    pub realtime: bool,

    /// Collect per-stage timings and print them at the end
    pub profile: bool,

    /// Stop once the observed game loop reaches this value (0 = unlimited)
    pub max_game_steps: u64,

    /// Root directory; one session directory is created beneath it
    pub output_root: PathBuf,

    /// Check every encoded grid before it is appended
    pub verify_grids: bool,

    /// Persist the replay artifact (live sources only) plus a score file
    pub save_replay: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            step_mul: 10,
            screen_resolution: 84,
            minimap_resolution: 64,
            observed_player: 1,
            realtime: false,
            profile: false,
            max_game_steps: 0,
            output_root: PathBuf::from("replay_data"),
            verify_grids: true,
            save_replay: false,
        }
    }
}

impl ExtractConfig {
    /// Load from a `.yaml`/`.yml` or JSON file and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            _ => Self::from_json(&content)?,
        };
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ExtractConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ExtractConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() || self.fps < MIN_FPS {
            return Err(ConfigError::Validation(format!(
                "fps must be a number of at least {MIN_FPS}, got {}",
                self.fps
            )));
        }
        if self.step_mul == 0 {
            return Err(ConfigError::Validation("step_mul must be >= 1".to_string()));
        }
        if self.screen_resolution == 0 || self.minimap_resolution == 0 {
            return Err(ConfigError::Validation(format!(
                "resolutions must be >= 1, got screen={} minimap={}",
                self.screen_resolution, self.minimap_resolution
            )));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation("output_root must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn resolutions(&self) -> Resolutions {
        Resolutions { screen: self.screen_resolution, minimap: self.minimap_resolution }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ExtractConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolutions(), Resolutions { screen: 84, minimap: 64 });
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ExtractConfig::from_json(r#"{ "fps": 60.0, "observed_player": 2 }"#).unwrap();
        assert_eq!(config.fps, 60.0);
        assert_eq!(config.observed_player, 2);
        assert_eq!(config.step_mul, 10);
        assert!(config.verify_grids);
    }

    #[test]
    fn test_yaml_config() {
        let yaml = "step_mul: 8\nscreen_resolution: 64\nrealtime: true\n";
        let config = ExtractConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.step_mul, 8);
        assert_eq!(config.screen_resolution, 64);
        assert!(config.realtime);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = ExtractConfig::default();
        config.fps = 0.0;
        assert!(config.validate().is_err());

        let mut config = ExtractConfig::default();
        config.fps = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ExtractConfig::default();
        config.fps = 1e-20;
        assert!(config.validate().is_err());

        let mut config = ExtractConfig::default();
        config.step_mul = 0;
        assert!(config.validate().is_err());

        let mut config = ExtractConfig::default();
        config.minimap_resolution = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.yml");
        fs::write(&path, "fps: 15\nmax_game_steps: 2000\n").unwrap();

        let config = ExtractConfig::load(&path).unwrap();
        assert_eq!(config.fps, 15.0);
        assert_eq!(config.max_game_steps, 2000);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = ExtractConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
