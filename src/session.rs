//! The game session: every piece of mutable game state, and the per-frame
//! step that moves it forward.
//!
//! A session is created once, started and stopped any number of times, and
//! disposed at exit. Nothing here touches the terminal or the audio device;
//! the step reports what happened as [`GameEvent`]s and the caller decides
//! what to draw and play.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::Config;
use crate::exercise::{self, ExerciseKind, ExerciseState, GameMode};
use crate::obstacle::ObstacleField;
use crate::player::{CrashOutcome, Player, RESPAWN_CLEARANCE, RESPAWN_PENALTY};
use crate::tracker::TrackerEvent;

/// Fixed gameplay parameters for a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Rules {
    pub width: f32,
    pub height: f32,
    pub max_health: u32,
    pub game_speed: f32,
    pub spawn_interval: Duration,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            max_health: 5,
            game_speed: 3.0,
            spawn_interval: Duration::from_millis(2000),
        }
    }
}

impl Rules {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            width: cfg.canvas_width(),
            height: cfg.canvas_height(),
            max_health: cfg.max_health(),
            game_speed: cfg.game_speed(),
            spawn_interval: cfg.spawn_interval(),
        }
    }
}

/// Something the audio layer (or anyone else) may want to react to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GameEvent {
    /// Emitted every frame with the normalised exercise value.
    Movement(f32),
    Score,
    Crash,
    Respawn,
    GameOver,
}

/// A fixed-period timer polled from the frame loop.
#[derive(Clone, Debug)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Fires at most once per call. A timer that fell more than a period
    /// behind restarts from `now` instead of bursting.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if now < next {
            return false;
        }
        let following = next + self.period;
        self.next = Some(if following <= now {
            now + self.period
        } else {
            following
        });
        true
    }
}

/// Final numbers of a finished run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub score: u32,
    pub best: u32,
    pub game_over: bool,
}

pub struct GameSession<R: Rng = StdRng> {
    rules: Rules,
    pub player: Player,
    pub obstacles: ObstacleField,
    pub exercise: ExerciseState,
    score: u32,
    best: u32,
    running: bool,
    frames: u64,
    spawner: Interval,
    summary: Option<Summary>,
    /// Tracker messages per second, for the HUD.
    message_rate: u32,
    tracker_connected: bool,
    rng: R,
}

impl<R: Rng> GameSession<R> {
    pub fn new(rules: Rules, exercise: ExerciseState, rng: R) -> Self {
        Self {
            player: Player::new(rules.max_health, rules.height),
            obstacles: ObstacleField::new(),
            exercise,
            score: 0,
            best: 0,
            running: false,
            frames: 0,
            spawner: Interval::new(rules.spawn_interval),
            summary: None,
            message_rate: 0,
            tracker_connected: false,
            rng,
            rules,
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }
    pub fn score(&self) -> u32 {
        self.score
    }
    pub fn best(&self) -> u32 {
        self.best
    }
    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn frames(&self) -> u64 {
        self.frames
    }
    pub fn spawner_running(&self) -> bool {
        self.spawner.is_running()
    }
    /// Result of the last run, once it has ended.
    pub fn summary(&self) -> Option<Summary> {
        self.summary
    }
    pub fn message_rate(&self) -> u32 {
        self.message_rate
    }
    pub fn tracker_connected(&self) -> bool {
        self.tracker_connected
    }

    pub fn set_exercise(&mut self, kind: ExerciseKind) {
        info!("exercise changed to {kind}");
        self.exercise.kind = kind;
    }

    pub fn set_mode(&mut self, mode: GameMode) {
        info!("game mode changed to {mode}");
        self.exercise.mode = mode;
    }

    pub fn set_movement_range(&mut self, range: f32) {
        self.exercise.set_movement_range(range);
        info!("movement range set to {:.2}", self.exercise.movement_range());
    }

    /// Starts a run. Returns `false` if one is already going.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        self.score = 0;
        self.obstacles.clear();
        self.player.reset();
        self.summary = None;
        self.running = true;
        self.spawner.start(now);
        info!(
            exercise = %self.exercise.kind,
            mode = %self.exercise.mode,
            "session started"
        );
        true
    }

    /// Ends the run. Returns `false` if none was going.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.spawner.stop();
        self.best = self.best.max(self.score);
        self.summary = Some(Summary {
            score: self.score,
            best: self.best,
            game_over: self.player.is_game_over(),
        });
        info!(score = self.score, frames = self.frames, "session stopped");
        true
    }

    /// Stops any run and hands back the last summary.
    pub fn dispose(mut self) -> Option<Summary> {
        self.stop();
        self.summary
    }

    pub fn apply_tracker(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::Connected => self.tracker_connected = true,
            TrackerEvent::Disconnected => self.tracker_connected = false,
            TrackerEvent::Frame(frame) => {
                self.exercise.raw = frame.value_for(self.exercise.kind);
            }
            TrackerEvent::Rate(rate) => self.message_rate = *rate,
        }
    }

    /// Adds one obstacle, if a run is going.
    pub fn spawn(&mut self) {
        if !self.running {
            return;
        }
        self.obstacles
            .spawn(&mut self.rng, self.rules.width, self.rules.height);
    }

    /// Spawns when the spawn timer is due.
    pub fn poll_spawner(&mut self, now: Instant) {
        if self.spawner.poll(now) {
            self.spawn();
        }
    }

    /// One frame of game logic. Does nothing unless a run is going.
    pub fn tick(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        if !self.running {
            return;
        }
        self.player.recover(now);

        let value = self.exercise.step();
        let target = exercise::target_y(value, self.rules.height, self.player.radius);
        self.player.ease_toward(target);
        events.push(GameEvent::Movement(value));

        let contacts = self.obstacles.advance(
            self.rules.game_speed,
            &self.player.bounds(),
            self.player.is_crashed(),
        );
        for _ in 0..contacts.collected {
            self.score += 1;
            events.push(GameEvent::Score);
        }
        if contacts.crashed {
            events.push(GameEvent::Crash);
            self.crash(now, events);
        }

        self.frames += 1;
    }

    fn crash(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        match self.player.crash(self.exercise.mode, now) {
            CrashOutcome::Ignored => {}
            CrashOutcome::Hurt => debug!(health = self.player.health, "crashed"),
            CrashOutcome::Respawned => {
                self.score = self.score.saturating_sub(RESPAWN_PENALTY);
                self.player.recenter(self.rules.height);
                self.obstacles
                    .clear_before(self.player.x + RESPAWN_CLEARANCE);
                events.push(GameEvent::Respawn);
            }
            CrashOutcome::GameOver => {
                events.push(GameEvent::GameOver);
                self.stop();
            }
        }
    }
}
