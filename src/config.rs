use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::router::TypingMode;

pub const DEFAULT_CONFIG_PATH: &str = "airtype.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            gesture: GestureConfig::default(),
            classifier: ClassifierConfig::default(),
            keyboard: KeyboardConfig::default(),
            router: RouterConfig::default(),
            profiles: ProfilesConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ============================================================================
// Gesture Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct GestureConfig {
    /// Confidence every palm joint (wrist + 5 tips) must exceed
    #[serde(default = "default_palm_confidence")]
    pub palm_confidence: f32,

    /// How long an open palm must be held to toggle typing
    #[serde(default = "default_hold_secs")]
    pub hold_secs: f32,

    /// Vertical fingertip travel between processed frames that counts as a tap
    #[serde(default = "default_tap_threshold")]
    pub tap_threshold: f32,

    /// Index tip confidence required by the single-finger tap
    #[serde(default = "default_tap_confidence")]
    pub tap_confidence: f32,

    /// Fingertip confidence required by the per-finger taps in QWERTY mode
    #[serde(default = "default_finger_tap_confidence")]
    pub finger_tap_confidence: f32,

    /// Consecutive hand-less frames tolerated before tap memory is dropped
    #[serde(default = "default_occlusion_grace_frames")]
    pub occlusion_grace_frames: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            palm_confidence: default_palm_confidence(),
            hold_secs: default_hold_secs(),
            tap_threshold: default_tap_threshold(),
            tap_confidence: default_tap_confidence(),
            finger_tap_confidence: default_finger_tap_confidence(),
            occlusion_grace_frames: default_occlusion_grace_frames(),
        }
    }
}

fn default_palm_confidence() -> f32 {
    0.5
}

fn default_hold_secs() -> f32 {
    2.0
}

fn default_tap_threshold() -> f32 {
    0.05
}

fn default_tap_confidence() -> f32 {
    0.7
}

fn default_finger_tap_confidence() -> f32 {
    0.5
}

fn default_occlusion_grace_frames() -> u32 {
    1
}

// ============================================================================
// Classifier Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Mean per-joint distance a profile must beat (strictly) to match
    #[serde(default = "default_classifier_threshold")]
    pub match_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            match_threshold: default_classifier_threshold(),
        }
    }
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_classifier_threshold() -> f32 {
    5.0
}

// ============================================================================
// Keyboard Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct KeyboardConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Maximum distance, in key units, between a finger and its nearest key
    #[serde(default = "default_key_threshold")]
    pub match_threshold: f32,

    /// Right pinky row units above which backspace is considered
    #[serde(default = "default_backspace_row")]
    pub backspace_row: f32,

    /// Right pinky column units above which backspace is considered
    #[serde(default = "default_backspace_column")]
    pub backspace_column: f32,

    /// Where a calibration record is loaded from and saved to
    #[serde(default)]
    pub calibration_path: Option<PathBuf>,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            match_threshold: default_key_threshold(),
            backspace_row: default_backspace_row(),
            backspace_column: default_backspace_column(),
            calibration_path: None,
        }
    }
}

fn default_key_threshold() -> f32 {
    1.5
}

fn default_backspace_row() -> f32 {
    0.5
}

fn default_backspace_column() -> f32 {
    0.3
}

// ============================================================================
// Router Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Only every Nth captured frame reaches the detectors
    #[serde(default = "default_frame_skip")]
    pub frame_skip: u32,

    #[serde(default)]
    pub mode: TypingMode,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            frame_skip: default_frame_skip(),
            mode: TypingMode::default(),
        }
    }
}

fn default_frame_skip() -> u32 {
    3
}

// ============================================================================
// Profiles Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ProfilesConfig {
    #[serde(default = "default_profiles_path")]
    pub path: PathBuf,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            path: default_profiles_path(),
        }
    }
}

fn default_profiles_path() -> PathBuf {
    PathBuf::from("profiles.json")
}

impl Config {
    /// Parse a config file, failing on unreadable or malformed input.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load `path`, or `airtype.toml` when none is given. An explicit path
    /// must parse. The default file may be absent, and if it is broken the
    /// defaults are used and the parse error is handed back for reporting once
    /// logging is up.
    pub fn load(path: Option<&Path>) -> anyhow::Result<(Self, Option<anyhow::Error>)> {
        if let Some(path) = path {
            return Ok((Self::from_path(path)?, None));
        }

        let path = Path::new(DEFAULT_CONFIG_PATH);
        if !path.exists() {
            return Ok((Config::default(), None));
        }
        match Self::from_path(path) {
            Ok(config) => Ok((config, None)),
            Err(e) => Ok((Config::default(), Some(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gesture.hold_secs, 2.0);
        assert_eq!(config.gesture.tap_threshold, 0.05);
        assert_eq!(config.gesture.tap_confidence, 0.7);
        assert_eq!(config.classifier.match_threshold, 5.0);
        assert_eq!(config.keyboard.match_threshold, 1.5);
        assert_eq!(config.router.frame_skip, 3);
        assert_eq!(config.router.mode, TypingMode::Gesture);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [router]
            frame_skip = 1
            mode = "qwerty"

            [gesture]
            hold_secs = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.router.frame_skip, 1);
        assert_eq!(config.router.mode, TypingMode::Qwerty);
        assert_eq!(config.gesture.hold_secs, 1.5);
        // Untouched fields keep their defaults
        assert_eq!(config.gesture.tap_threshold, 0.05);
        assert_eq!(config.profiles.path, PathBuf::from("profiles.json"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/airtype.toml"))).is_err());
    }

    #[test]
    fn test_from_path_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airtype.toml");
        fs::write(&path, "router = [").unwrap();
        let err = Config::from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config"));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airtype.toml");
        fs::write(&path, "[keyboard]\ncalibration_path = \"cal.json\"\n").unwrap();
        let (config, warning) = Config::load(Some(&path)).unwrap();
        assert!(warning.is_none());
        assert_eq!(config.keyboard.calibration_path, Some(PathBuf::from("cal.json")));
    }
}
