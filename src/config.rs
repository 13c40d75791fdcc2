//! Configuration file management.
//!
//! Settings live in `pinch-dodge.toml` next to the binary (or wherever the
//! first command-line argument points). Every key is optional; accessors
//! supply the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::exercise::{ExerciseKind, GameMode};
use crate::player::PLAYER_RADIUS;

/// Smallest canvas side that still fits the player between the margins.
const MIN_CANVAS: f32 = 2.0 * PLAYER_RADIUS;

pub const DEFAULT_CONFIG_PATH: &str = "pinch-dodge.toml";

pub const CONFIG_TEMPLATE: &str = r#"# pinch-dodge configuration file

# Tracker WebSocket endpoint and reconnect back-off
# tracker_url = "ws://localhost:8080"
# reconnect_delay_ms = 2000

# thumb_index_pinch | make_a_fist | pronation_supination | wrist_arom
# exercise = "thumb_index_pinch"

# regular | endless
# mode = "regular"

# Fraction of the exercise range that covers the full screen (0.01 - 1.0)
# movement_range = 1.0

# Gameplay
# max_health = 5
# game_speed = 3.0
# spawn_interval_ms = 2000
# canvas_width = 800
# canvas_height = 400
# fps = 60

# Audio
# audio = true
# sequence_file = "PinchSong.json"
# samples_dir = "samples"
# music_bpm = 193.0       # overrides the tempo in the sequence file

# log_file = "pinch-dodge.log"
"#;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    pub tracker_url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub exercise: Option<String>,
    pub mode: Option<GameMode>,
    pub movement_range: Option<f32>,

    pub max_health: Option<u32>,
    pub game_speed: Option<f32>,
    pub spawn_interval_ms: Option<u64>,
    pub canvas_width: Option<f32>,
    pub canvas_height: Option<f32>,
    pub fps: Option<u32>,

    pub audio: Option<bool>,
    pub sequence_file: Option<PathBuf>,
    pub samples_dir: Option<PathBuf>,
    pub music_bpm: Option<f64>,

    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Reads the config at `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Writes the commented template if no config exists yet.
    pub fn write_template(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }
        fs::write(path, CONFIG_TEMPLATE)
    }

    pub fn tracker_url(&self) -> &str {
        self.tracker_url.as_deref().unwrap_or("ws://localhost:8080")
    }
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms.unwrap_or(2000))
    }

    pub fn exercise(&self) -> ExerciseKind {
        match self.exercise.as_deref() {
            None => ExerciseKind::ThumbIndexPinch,
            Some(name) => ExerciseKind::from_name(name).unwrap_or_else(|| {
                warn!("unknown exercise type {name:?}, using thumb_index_pinch");
                ExerciseKind::ThumbIndexPinch
            }),
        }
    }
    pub fn mode(&self) -> GameMode {
        self.mode.unwrap_or_default()
    }
    pub fn movement_range(&self) -> f32 {
        self.movement_range.unwrap_or(1.0)
    }

    pub fn max_health(&self) -> u32 {
        self.max_health.unwrap_or(5).max(1)
    }
    /// Scroll speed; non-positive values would leave obstacles on screen forever.
    pub fn game_speed(&self) -> f32 {
        positive_or("game_speed", self.game_speed, 0.0, 3.0)
    }
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms.unwrap_or(2000).max(1))
    }
    pub fn canvas_width(&self) -> f32 {
        positive_or("canvas_width", self.canvas_width, MIN_CANVAS, 800.0)
    }
    pub fn canvas_height(&self) -> f32 {
        positive_or("canvas_height", self.canvas_height, MIN_CANVAS, 400.0)
    }
    pub fn frame_duration(&self) -> Duration {
        let fps = self.fps.unwrap_or(60).clamp(1, 240);
        Duration::from_secs_f64(1.0 / fps as f64)
    }

    pub fn audio(&self) -> bool {
        self.audio.unwrap_or(true)
    }
    pub fn sequence_file(&self) -> &Path {
        self.sequence_file
            .as_deref()
            .unwrap_or(Path::new("PinchSong.json"))
    }
    pub fn samples_dir(&self) -> &Path {
        self.samples_dir.as_deref().unwrap_or(Path::new("samples"))
    }
    pub fn music_bpm(&self) -> Option<f64> {
        self.music_bpm.filter(|bpm| *bpm > 0.0)
    }

    pub fn log_file(&self) -> &Path {
        self.log_file
            .as_deref()
            .unwrap_or(Path::new("pinch-dodge.log"))
    }
}

/// `value` if it is finite and above `min`, otherwise `default`.
fn positive_or(key: &str, value: Option<f32>, min: f32, default: f32) -> f32 {
    match value {
        None => default,
        Some(v) if v.is_finite() && v > min => v,
        Some(v) => {
            warn!("{key} = {v} is out of range, using {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.tracker_url(), "ws://localhost:8080");
        assert_eq!(cfg.exercise(), ExerciseKind::ThumbIndexPinch);
        assert_eq!(cfg.mode(), GameMode::Regular);
        assert_eq!(cfg.max_health(), 5);
        assert_eq!(cfg.spawn_interval(), Duration::from_millis(2000));
        assert_eq!(cfg.canvas_height(), 400.0);
        assert!(cfg.music_bpm().is_none());
    }

    #[test]
    fn template_parses_as_all_defaults() {
        let cfg = Config::parse(CONFIG_TEMPLATE).unwrap();
        assert!(cfg.tracker_url.is_none());
        assert!(cfg.audio());
    }

    #[test]
    fn values_override_defaults() {
        let cfg = Config::parse(
            r#"
            exercise = "make_a_fist"
            mode = "endless"
            max_health = 3
            music_bpm = 120.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.exercise(), ExerciseKind::MakeAFist);
        assert_eq!(cfg.mode(), GameMode::Endless);
        assert_eq!(cfg.max_health(), 3);
        assert_eq!(cfg.music_bpm(), Some(120.0));
    }

    #[test]
    fn unknown_exercise_falls_back_to_pinch() {
        let cfg = Config::parse(r#"exercise = "finger_guns""#).unwrap();
        assert_eq!(cfg.exercise(), ExerciseKind::ThumbIndexPinch);
    }

    #[test]
    fn degenerate_canvas_and_speed_fall_back() {
        let cfg = Config::parse(
            r#"
            canvas_width = -5.0
            canvas_height = 30.0
            game_speed = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.canvas_width(), 800.0);
        assert_eq!(cfg.canvas_height(), 400.0);
        assert_eq!(cfg.game_speed(), 3.0);

        let cfg = Config::parse("canvas_height = 120.0\ngame_speed = 0.5").unwrap();
        assert_eq!(cfg.canvas_height(), 120.0);
        assert_eq!(cfg.game_speed(), 0.5);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let cfg = Config::load(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.fps, None);
    }
}
