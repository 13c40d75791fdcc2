use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pinch_dodge::audio::{AudioOut, AudioTriggers, Cue};
use pinch_dodge::exercise::{ExerciseKind, ExerciseState, GameMode};
use pinch_dodge::obstacle::Obstacle;
use pinch_dodge::session::{GameEvent, GameSession, Rules};
use pinch_dodge::tracker::{TrackerEvent, TrackerFrame};

#[derive(Default)]
struct Recorder(Vec<Cue>);

impl AudioOut for Recorder {
    fn play(&mut self, cue: Cue) {
        self.0.push(cue);
    }
}

/// A started session whose player sits still in the middle of the screen.
fn steady(mode: GameMode, t0: Instant) -> GameSession {
    let mut exercise = ExerciseState::new(ExerciseKind::ThumbIndexPinch, mode, 1.0);
    // (48.5 - 37) / (60 - 37) = 0.5, which targets the starting height.
    exercise.raw = 48.5;
    exercise.displayed = 48.5;
    let mut s = GameSession::new(Rules::default(), exercise, StdRng::seed_from_u64(7));
    assert!(s.start(t0));
    s
}

/// An obstacle that overlaps the centred player after one step.
fn at_player(is_good: bool) -> Obstacle {
    Obstacle::new(53.0, 170.0, is_good)
}

fn crash_times(t0: Instant, n: u32) -> impl Iterator<Item = Instant> {
    (0..n).map(move |i| t0 + Duration::from_millis(1_100) * i)
}

#[test]
fn good_collision_scores_one() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    assert_eq!(s.score(), 0);

    s.obstacles.push(at_player(true));
    let mut events = Vec::new();
    s.tick(t0, &mut events);

    assert_eq!(s.score(), 1);
    assert!(s.obstacles.is_empty());
    assert!(events.contains(&GameEvent::Score));
    assert_eq!(s.player.health, s.player.max_health);
}

#[test]
fn regular_mode_ends_and_halts_spawning() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    let mut events = Vec::new();

    for t in crash_times(t0, 5) {
        s.obstacles.push(at_player(false));
        s.tick(t, &mut events);
    }

    assert_eq!(s.player.health, 0);
    assert!(s.player.is_game_over());
    assert!(!s.is_running());
    assert!(!s.spawner_running());
    assert_eq!(
        events.iter().filter(|e| **e == GameEvent::Crash).count(),
        5
    );
    assert_eq!(events.last(), Some(&GameEvent::GameOver));
    let summary = s.summary().unwrap();
    assert!(summary.game_over);

    let before = s.obstacles.len();
    s.spawn();
    s.poll_spawner(t0 + Duration::from_secs(60));
    assert_eq!(s.obstacles.len(), before);

    // A finished run no longer moves.
    let frames = s.frames();
    s.tick(t0 + Duration::from_secs(61), &mut events);
    assert_eq!(s.frames(), frames);
}

#[test]
fn endless_mode_respawns_with_penalty() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Endless, t0);
    let mut events = Vec::new();

    for _ in 0..12 {
        s.obstacles.push(at_player(true));
    }
    s.tick(t0, &mut events);
    assert_eq!(s.score(), 12);

    // Far away, survives the respawn clearance.
    s.obstacles.push(Obstacle::new(700.0, 10.0, false));
    events.clear();
    for t in crash_times(t0 + Duration::from_millis(100), 5) {
        s.obstacles.push(at_player(false));
        s.tick(t, &mut events);
    }

    assert_eq!(events.last(), Some(&GameEvent::Respawn));
    assert!(s.is_running());
    assert_eq!(s.score(), 2);
    assert_eq!(s.player.health, s.player.max_health);
    assert_eq!(s.player.y, s.rules().height / 2.0);
    assert_eq!(s.obstacles.len(), 1);
    assert!(s.obstacles.iter().all(|o| o.x > s.player.x + 100.0));
}

#[test]
fn respawn_penalty_floors_at_zero() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Endless, t0);
    let mut events = Vec::new();
    for t in crash_times(t0, 5) {
        s.obstacles.push(at_player(false));
        s.tick(t, &mut events);
    }
    assert_eq!(s.score(), 0);
    assert!(events.contains(&GameEvent::Respawn));
}

#[test]
fn health_and_position_stay_in_range() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Endless, t0);
    let mut input = StdRng::seed_from_u64(99);
    let mut events = Vec::new();
    let r = s.player.radius;
    let h = s.rules().height;

    for frame in 0..3_000u32 {
        let now = t0 + Duration::from_millis(16) * frame;
        s.exercise.raw = input.random_range(0.0..100.0);
        s.poll_spawner(now);
        s.tick(now, &mut events);

        assert!(s.player.health <= s.player.max_health);
        assert!(s.player.y >= r && s.player.y <= h - r, "y={}", s.player.y);
        assert!(s.obstacles.iter().all(|o| o.x + o.width >= 0.0));
    }
    assert_eq!(s.frames(), 3_000);
    assert!(events.iter().any(|e| matches!(e, GameEvent::Movement(_))));
}

#[test]
fn spawner_fires_on_its_period() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    s.poll_spawner(t0 + Duration::from_millis(1_999));
    assert!(s.obstacles.is_empty());
    s.poll_spawner(t0 + Duration::from_millis(2_000));
    s.poll_spawner(t0 + Duration::from_millis(2_001));
    assert_eq!(s.obstacles.len(), 1);
    let o = s.obstacles.iter().next().unwrap();
    assert_eq!(o.x, s.rules().width);
    assert!(o.y >= 0.0 && o.y < s.rules().height);
}

#[test]
fn close_bad_hits_sound_once() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    let mut audio = AudioTriggers::new(Recorder::default());
    let mut events = Vec::new();

    for (i, ms) in [0u64, 300].into_iter().enumerate() {
        let now = t0 + Duration::from_millis(ms);
        s.obstacles.push(Obstacle::new(53.0 + i as f32 * 3.0, 170.0, false));
        s.tick(now, &mut events);
        for ev in events.drain(..) {
            audio.handle(ev, now);
        }
    }
    // Triggers alone also hold back a second crash inside the window.
    audio.handle(GameEvent::Crash, t0 + Duration::from_millis(400));

    let crashes = audio
        .output()
        .0
        .iter()
        .filter(|c| **c == Cue::CrashNoise)
        .count();
    assert_eq!(crashes, 1);
    assert_eq!(s.player.health, s.player.max_health - 1);
}

#[test]
fn tracker_frames_steer_the_player() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    s.apply_tracker(&TrackerEvent::Connected);
    s.apply_tracker(&TrackerEvent::Rate(30));
    let frame =
        TrackerFrame::parse(r#"{ "handPresent": true, "distances": { "thumbIndex": 60 } }"#)
            .unwrap();
    s.apply_tracker(&TrackerEvent::Frame(frame));
    assert!(s.tracker_connected());
    assert_eq!(s.message_rate(), 30);
    assert_eq!(s.exercise.raw, 60.0);

    let mut events = Vec::new();
    for i in 0..120u32 {
        s.tick(t0 + Duration::from_millis(16) * i, &mut events);
    }
    assert!(s.player.y > 370.0, "y={}", s.player.y);

    let gone = TrackerFrame::parse(r#"{ "handPresent": false }"#).unwrap();
    s.apply_tracker(&TrackerEvent::Frame(gone));
    assert_eq!(s.exercise.raw, 0.5);

    assert!(TrackerFrame::parse("{ not json").is_err());
    assert_eq!(s.exercise.raw, 0.5);
}

#[test]
fn stop_and_restart_keeps_best() {
    let t0 = Instant::now();
    let mut s = steady(GameMode::Regular, t0);
    let mut events = Vec::new();
    for _ in 0..3 {
        s.obstacles.push(at_player(true));
    }
    s.tick(t0, &mut events);
    assert!(s.stop());
    assert!(!s.stop());
    assert_eq!(s.best(), 3);

    assert!(s.start(t0 + Duration::from_secs(1)));
    assert_eq!(s.score(), 0);
    assert!(s.obstacles.is_empty());
    assert!(s.summary().is_none());
    let summary = s.dispose().unwrap();
    assert_eq!((summary.score, summary.best), (0, 3));
}
