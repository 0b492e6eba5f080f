use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_DEDUP_DISTANCE, DEFAULT_PROXIMITY_THRESHOLD,
    DEFAULT_SESSION_TIMEOUT_SECS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be a positive finite number, got {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Tunable thresholds of the tracking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_dedup_distance")]
    pub dedup_distance: f64,
    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold: f64,
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: f64,
}

fn default_dedup_distance() -> f64 {
    DEFAULT_DEDUP_DISTANCE
}

fn default_proximity_threshold() -> f64 {
    DEFAULT_PROXIMITY_THRESHOLD
}

fn default_session_timeout_secs() -> f64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            dedup_distance: DEFAULT_DEDUP_DISTANCE,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
        }
    }
}

impl TrackerConfig {
    /// Platform config location, e.g. `~/.config/presence/config.json` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config at `path`. Any field absent from the file keeps its default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the platform default file if it exists, otherwise returns defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("dedup_distance", self.dedup_distance)?;
        check_positive("proximity_threshold", self.proximity_threshold)?;
        check_positive("session_timeout_secs", self.session_timeout_secs)?;
        Ok(())
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_relative_eq!(config.dedup_distance, 50.0);
        assert_relative_eq!(config.proximity_threshold, 100.0);
        assert_relative_eq!(config.session_timeout_secs, 30.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"session_timeout_secs": 5.0}}"#).unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_relative_eq!(config.session_timeout_secs, 5.0);
        assert_relative_eq!(config.proximity_threshold, 100.0);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrackerConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_json_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = TrackerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"proximity_threshold": -1.0}}"#).unwrap();
        let err = TrackerConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "proximity_threshold",
                ..
            }
        ));
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-3.0)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn test_validate_rejects(#[case] value: f64) {
        let config = TrackerConfig {
            dedup_distance: value,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_ends_with_config_file() {
        if let Some(path) = TrackerConfig::default_path() {
            assert!(path.ends_with("presence/config.json"));
        }
    }
}
