//! Exercise selection and the input normaliser.
//!
//! A raw metric arrives from the tracker (millimetres for the pinch, a ratio
//! or angle fraction for the rest). Each frame the displayed value is eased
//! toward the latest raw value, mapped through a kind-specific range, and
//! clamped into `[0, 1]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-frame easing of the displayed metric toward the raw one.
pub const INTERPOLATION_FACTOR: f32 = 0.1;

/// Metric value used when the hand is absent or a field is missing.
pub const NEUTRAL_VALUE: f32 = 0.5;

/// Fallback thumb-index distance (mm); also the startup value.
pub const DEFAULT_PINCH: f32 = 70.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    ThumbIndexPinch,
    MakeAFist,
    PronationSupination,
    WristArom,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::ThumbIndexPinch,
        ExerciseKind::MakeAFist,
        ExerciseKind::PronationSupination,
        ExerciseKind::WristArom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExerciseKind::ThumbIndexPinch => "thumb_index_pinch",
            ExerciseKind::MakeAFist => "make_a_fist",
            ExerciseKind::PronationSupination => "pronation_supination",
            ExerciseKind::WristArom => "wrist_arom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Next kind in selection order, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// `(closed, open)` endpoints of the raw metric. `None` means the tracker
    /// already reports a `[0, 1]` value.
    ///
    /// For the fist the endpoints run backwards: an open hand reads about
    /// 0.95 and a closed fist about 0.3.
    fn range(self) -> Option<(f32, f32)> {
        match self {
            ExerciseKind::ThumbIndexPinch => Some((37.0, 60.0)),
            ExerciseKind::MakeAFist => Some((0.95, 0.3)),
            ExerciseKind::PronationSupination | ExerciseKind::WristArom => None,
        }
    }

    /// Maps a raw metric into `[0, 1]`.
    pub fn normalise(self, value: f32) -> f32 {
        let v = match self.range() {
            Some((min, max)) => (value - min) / (max - min),
            None => value,
        };
        v.clamp(0.0, 1.0)
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Regular,
    Endless,
}

impl GameMode {
    pub fn toggled(self) -> Self {
        match self {
            GameMode::Regular => GameMode::Endless,
            GameMode::Endless => GameMode::Regular,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameMode::Regular => "regular",
            GameMode::Endless => "endless",
        })
    }
}

/// Latest and displayed metric for the selected exercise.
#[derive(Clone, Debug)]
pub struct ExerciseState {
    pub kind: ExerciseKind,
    pub mode: GameMode,
    /// Last value received from the tracker.
    pub raw: f32,
    /// Value eased toward `raw` once per frame; this is what the game uses.
    pub displayed: f32,
    /// Fraction of the metric range needed to cover the full screen.
    movement_range: f32,
}

impl ExerciseState {
    pub fn new(kind: ExerciseKind, mode: GameMode, movement_range: f32) -> Self {
        Self {
            kind,
            mode,
            raw: DEFAULT_PINCH,
            displayed: DEFAULT_PINCH,
            movement_range: clamp_range(movement_range),
        }
    }

    pub fn movement_range(&self) -> f32 {
        self.movement_range
    }

    pub fn set_movement_range(&mut self, range: f32) {
        self.movement_range = clamp_range(range);
    }

    /// One frame of smoothing followed by normalisation.
    pub fn step(&mut self) -> f32 {
        self.displayed += (self.raw - self.displayed) * INTERPOLATION_FACTOR;
        self.normalised()
    }

    /// Normalised value of the displayed metric, scaled by the movement range.
    pub fn normalised(&self) -> f32 {
        (self.kind.normalise(self.displayed) / self.movement_range).min(1.0)
    }
}

fn clamp_range(range: f32) -> f32 {
    if range.is_finite() {
        range.clamp(0.01, 1.0)
    } else {
        1.0
    }
}

/// Screen row the player should head for, kept a radius away from both edges.
/// An area too short for the margins pins the player to its middle.
pub fn target_y(normalised: f32, height: f32, radius: f32) -> f32 {
    if height.is_nan() || height - radius < radius {
        return height / 2.0;
    }
    (normalised * height).clamp(radius, height - radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinch_endpoints_and_midpoint() {
        let k = ExerciseKind::ThumbIndexPinch;
        assert_eq!(k.normalise(60.0), 1.0);
        assert_eq!(k.normalise(37.0), 0.0);
        assert!((k.normalise(48.5) - 0.5).abs() < 1e-4);
        assert_eq!(k.normalise(90.0), 1.0);
        assert_eq!(k.normalise(10.0), 0.0);
    }

    #[test]
    fn fist_range_is_inverted() {
        let k = ExerciseKind::MakeAFist;
        assert!(k.normalise(0.95).abs() < 1e-6);
        assert!((k.normalise(0.3) - 1.0).abs() < 1e-6);
        assert!(k.normalise(0.6) > 0.5);
    }

    #[test]
    fn rotation_metrics_pass_through_clamped() {
        for k in [ExerciseKind::PronationSupination, ExerciseKind::WristArom] {
            assert_eq!(k.normalise(0.25), 0.25);
            assert_eq!(k.normalise(-0.4), 0.0);
            assert_eq!(k.normalise(1.7), 1.0);
        }
    }

    #[test]
    fn smoothing_moves_a_tenth_of_the_gap() {
        let mut s = ExerciseState::new(ExerciseKind::ThumbIndexPinch, GameMode::Regular, 1.0);
        s.raw = 40.0;
        s.step();
        assert!((s.displayed - 67.0).abs() < 1e-4);
        for _ in 0..200 {
            s.step();
        }
        assert!((s.displayed - 40.0).abs() < 1e-3);
    }

    #[test]
    fn movement_range_amplifies_small_motion() {
        let mut s = ExerciseState::new(ExerciseKind::WristArom, GameMode::Regular, 0.5);
        s.displayed = 0.3;
        assert!((s.normalised() - 0.6).abs() < 1e-6);
        s.displayed = 0.8;
        assert_eq!(s.normalised(), 1.0);
        s.set_movement_range(0.0);
        assert_eq!(s.movement_range(), 0.01);
    }

    #[test]
    fn target_y_stays_inside_the_margins() {
        assert_eq!(target_y(0.0, 400.0, 20.0), 20.0);
        assert_eq!(target_y(1.0, 400.0, 20.0), 380.0);
        assert_eq!(target_y(0.5, 400.0, 20.0), 200.0);
        assert_eq!(target_y(1.0, 30.0, 20.0), 15.0);
        assert_eq!(target_y(0.0, 0.0, 20.0), 0.0);
    }

    #[test]
    fn names_round_trip_and_cycle() {
        for k in ExerciseKind::ALL {
            assert_eq!(ExerciseKind::from_name(k.name()), Some(k));
        }
        assert_eq!(ExerciseKind::from_name("jazz_hands"), None);
        assert_eq!(ExerciseKind::WristArom.next(), ExerciseKind::ThumbIndexPinch);
        assert_eq!(GameMode::Regular.toggled(), GameMode::Endless);
    }
}
