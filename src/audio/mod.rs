//! Sound effects for game events.
//!
//! [`AudioTriggers`] decides *when* a cue sounds (pitch changes, crash rate
//! limiting); an [`AudioOut`] decides *how*. The real output renders with
//! `fundsp` and plays through `rodio`; without a device the game runs on
//! [`Silent`].

pub mod notes;
pub mod synth;

use std::time::{Duration, Instant};

use tracing::trace;

use crate::session::GameEvent;

/// Movement pitches, highest first. The normalised exercise value indexes
/// into this table.
pub const MOVEMENT_SCALE: [&str; 29] = [
    "C6", "B5", "A5", "G5", "F5", "E5", "D5", "C5", "B4", "A4", "G4", "F4", "E4", "D4", "C4",
    "B3", "A3", "G3", "F3", "E3", "D3", "C3", "B2", "A2", "G2", "F2", "E2", "D2", "C2",
];

/// Minimum spacing between two crash cues.
pub const CRASH_RATE_LIMIT: Duration = Duration::from_millis(500);

/// One note of a fixed phrase; times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhraseNote {
    pub name: &'static str,
    pub duration: f32,
    pub delay: f32,
}

const fn pn(name: &'static str, duration: f32, delay: f32) -> PhraseNote {
    PhraseNote {
        name,
        duration,
        delay,
    }
}

pub const GOOD_PHRASE: [PhraseNote; 2] = [pn("C6", 0.233_160_75, 0.0), pn("F6", 0.388_601_25, 0.077_720_25)];

pub const BAD_ARPEGGIO: [PhraseNote; 9] = [
    pn("F7", 0.038_860_125, 0.0),
    pn("E7", 0.038_860_125, 0.038_860_125),
    pn("D7", 0.038_860_125, 0.077_720_25),
    pn("C#7", 0.038_860_125, 0.116_580_375),
    pn("B6", 0.038_860_125, 0.155_440_5),
    pn("A#6", 0.038_860_125, 0.194_300_625),
    pn("G6", 0.038_860_125, 0.233_160_75),
    pn("F#6", 0.038_860_125, 0.272_020_875),
    pn("F6", 0.388_601_25, 0.310_881),
];

pub const RESPAWN_PHRASE: [PhraseNote; 4] = [
    pn("C4", 0.5, 0.0),
    pn("E4", 0.5, 0.1),
    pn("G4", 0.5, 0.2),
    pn("C5", 1.0, 0.3),
];

/// A pre-built sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    Movement { note: &'static str },
    CrashNoise,
    BadArpeggio,
    GoodPhrase,
    Respawn,
    GameOver,
}

/// Somewhere cues can be played.
pub trait AudioOut {
    fn play(&mut self, cue: Cue);
}

impl<T: AudioOut + ?Sized> AudioOut for Box<T> {
    fn play(&mut self, cue: Cue) {
        (**self).play(cue);
    }
}

/// Output used when no audio device is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl AudioOut for Silent {
    fn play(&mut self, _cue: Cue) {}
}

pub struct AudioTriggers<O: AudioOut> {
    out: O,
    last_note_index: usize,
    last_crash: Option<Instant>,
}

impl<O: AudioOut> AudioTriggers<O> {
    pub fn new(out: O) -> Self {
        Self {
            out,
            last_note_index: 0,
            last_crash: None,
        }
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    /// Routes a game event to its trigger.
    pub fn handle(&mut self, event: GameEvent, now: Instant) {
        match event {
            GameEvent::Movement(value) => self.on_movement_tick(value),
            GameEvent::Score => self.on_score(),
            GameEvent::Crash => self.on_crash(now),
            GameEvent::Respawn => self.on_respawn(),
            GameEvent::GameOver => self.on_game_over(),
        }
    }

    /// Sounds the scale note for `value`, only when it differs from the last.
    pub fn on_movement_tick(&mut self, value: f32) {
        let index = note_index(value);
        if index != self.last_note_index {
            let note = MOVEMENT_SCALE[index];
            trace!(note, "movement note");
            self.out.play(Cue::Movement { note });
            self.last_note_index = index;
        }
    }

    /// Noise burst plus the bad arpeggio, at most once per
    /// [`CRASH_RATE_LIMIT`].
    pub fn on_crash(&mut self, now: Instant) {
        if let Some(last) = self.last_crash {
            if now.saturating_duration_since(last) < CRASH_RATE_LIMIT {
                return;
            }
        }
        self.out.play(Cue::CrashNoise);
        self.out.play(Cue::BadArpeggio);
        self.last_crash = Some(now);
    }

    pub fn on_score(&mut self) {
        self.out.play(Cue::GoodPhrase);
    }

    pub fn on_respawn(&mut self) {
        self.out.play(Cue::Respawn);
    }

    pub fn on_game_over(&mut self) {
        self.out.play(Cue::GameOver);
    }
}

fn note_index(value: f32) -> usize {
    let last = MOVEMENT_SCALE.len() - 1;
    ((value.clamp(0.0, 1.0) * last as f32).floor() as usize).min(last)
}
