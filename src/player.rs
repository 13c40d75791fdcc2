//! The player circle and its crash / respawn / game-over state machine.

use std::time::{Duration, Instant};

use tracing::info;

use crate::exercise::GameMode;
use crate::obstacle::Bounds;

pub const PLAYER_X: f32 = 50.0;
pub const PLAYER_RADIUS: f32 = 20.0;
/// Per-frame easing of the player toward its target row.
pub const POSITION_SMOOTHING: f32 = 0.2;
/// Invulnerability window after a bad hit.
pub const CRASH_COOLDOWN: Duration = Duration::from_millis(1000);
/// Points lost on an endless-mode respawn.
pub const RESPAWN_PENALTY: u32 = 10;
/// Obstacles at or left of `x + RESPAWN_CLEARANCE` are cleared on respawn.
pub const RESPAWN_CLEARANCE: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Active,
    Crashed { until: Instant },
    GameOver,
}

/// What a bad hit led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrashOutcome {
    /// Already crashed; the hit was ignored.
    Ignored,
    /// Lost a point of health and entered the cooldown.
    Hurt,
    /// Health ran out in endless mode; health restored.
    Respawned,
    /// Health ran out in regular mode.
    GameOver,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub health: u32,
    pub max_health: u32,
    pub state: PlayerState,
}

impl Player {
    pub fn new(max_health: u32, canvas_height: f32) -> Self {
        Self {
            x: PLAYER_X,
            y: canvas_height / 2.0,
            radius: PLAYER_RADIUS,
            health: max_health,
            max_health,
            state: PlayerState::Active,
        }
    }

    /// Restores full health and clears any crash, keeping the position.
    pub fn reset(&mut self) {
        self.health = self.max_health;
        self.state = PlayerState::Active;
    }

    pub fn is_crashed(&self) -> bool {
        matches!(self.state, PlayerState::Crashed { .. })
    }

    pub fn is_game_over(&self) -> bool {
        self.state == PlayerState::GameOver
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::square(self.x, self.y, self.radius)
    }

    /// Fraction of health left, for the health bar.
    pub fn health_fraction(&self) -> f32 {
        self.health as f32 / self.max_health.max(1) as f32
    }

    /// Eases toward `target_y`.
    pub fn ease_toward(&mut self, target_y: f32) {
        self.y += (target_y - self.y) * POSITION_SMOOTHING;
    }

    /// Ends the crash cooldown once it has run out.
    pub fn recover(&mut self, now: Instant) {
        if let PlayerState::Crashed { until } = self.state {
            if now >= until {
                self.state = PlayerState::Active;
            }
        }
    }

    /// Applies a bad hit.
    pub fn crash(&mut self, mode: GameMode, now: Instant) -> CrashOutcome {
        if self.state != PlayerState::Active {
            return CrashOutcome::Ignored;
        }
        self.health = self.health.saturating_sub(1);
        if self.health > 0 {
            self.state = PlayerState::Crashed {
                until: now + CRASH_COOLDOWN,
            };
            return CrashOutcome::Hurt;
        }
        match mode {
            GameMode::Endless => {
                self.reset();
                info!("out of health, respawning");
                CrashOutcome::Respawned
            }
            GameMode::Regular => {
                self.state = PlayerState::GameOver;
                info!("out of health, game over");
                CrashOutcome::GameOver
            }
        }
    }

    pub fn recenter(&mut self, canvas_height: f32) {
        self.y = canvas_height / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_enters_cooldown_then_recovers() {
        let t0 = Instant::now();
        let mut p = Player::new(5, 400.0);
        assert_eq!(p.crash(GameMode::Regular, t0), CrashOutcome::Hurt);
        assert_eq!(p.health, 4);
        assert!(p.is_crashed());

        p.recover(t0 + Duration::from_millis(999));
        assert!(p.is_crashed());
        p.recover(t0 + CRASH_COOLDOWN);
        assert_eq!(p.state, PlayerState::Active);
    }

    #[test]
    fn repeated_crash_during_cooldown_is_ignored() {
        let t0 = Instant::now();
        let mut p = Player::new(5, 400.0);
        p.crash(GameMode::Regular, t0);
        let later = t0 + Duration::from_millis(300);
        assert_eq!(p.crash(GameMode::Regular, later), CrashOutcome::Ignored);
        assert_eq!(p.health, 4);
    }

    #[test]
    fn last_health_ends_regular_game() {
        let t0 = Instant::now();
        let mut p = Player::new(1, 400.0);
        assert_eq!(p.crash(GameMode::Regular, t0), CrashOutcome::GameOver);
        assert_eq!(p.health, 0);
        assert!(p.is_game_over());
        assert_eq!(p.crash(GameMode::Regular, t0), CrashOutcome::Ignored);
    }

    #[test]
    fn last_health_respawns_in_endless() {
        let t0 = Instant::now();
        let mut p = Player::new(1, 400.0);
        assert_eq!(p.crash(GameMode::Endless, t0), CrashOutcome::Respawned);
        assert_eq!(p.health, 1);
        assert_eq!(p.state, PlayerState::Active);
    }

    #[test]
    fn bounds_use_radius_as_half_extent() {
        let p = Player::new(5, 400.0);
        assert_eq!(
            p.bounds(),
            Bounds { x: 30.0, y: 180.0, w: 40.0, h: 40.0 }
        );
        assert_eq!(p.health_fraction(), 1.0);
    }
}
