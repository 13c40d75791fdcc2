use std::fs::File;
use std::io::{self, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, terminal,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pinch_dodge::audio::synth::{Output, RodioOut};
use pinch_dodge::audio::{AudioOut, AudioTriggers, Silent};
use pinch_dodge::config::{Config, DEFAULT_CONFIG_PATH};
use pinch_dodge::exercise::ExerciseState;
use pinch_dodge::music::MusicPlayer;
use pinch_dodge::render::{self, PixelBuf};
use pinch_dodge::session::{GameEvent, GameSession, Rules, Summary};
use pinch_dodge::tracker::{WsTracker, spawn_tracker};

const RANGE_STEP: f32 = 0.05;

// ── Audio ───────────────────────────────────────────────────────────────────

struct Audio {
    // Keeps the device open for the effects and music sinks.
    _output: Option<Output>,
    effects: AudioTriggers<Box<dyn AudioOut>>,
    music: MusicPlayer,
}

impl Audio {
    fn silent() -> Self {
        Self {
            _output: None,
            effects: AudioTriggers::new(Box::new(Silent)),
            music: MusicPlayer::disabled(),
        }
    }

    fn open(cfg: &Config) -> Self {
        if !cfg.audio() {
            info!("audio disabled in config");
            return Self::silent();
        }
        let output = match Output::open() {
            Ok(output) => output,
            Err(e) => {
                warn!("{e}; running without sound");
                return Self::silent();
            }
        };
        let music = MusicPlayer::load(
            Some(output.handle().clone()),
            cfg.sequence_file().to_path_buf(),
            cfg.samples_dir().to_path_buf(),
            cfg.music_bpm(),
        );
        Self {
            effects: AudioTriggers::new(Box::new(RodioOut::new(&output))),
            _output: Some(output),
            music,
        }
    }

    fn music_status(&self) -> &'static str {
        if self.music.is_playing() {
            "playing"
        } else if self.music.is_loading() {
            "loading"
        } else if self.music.is_ready() {
            "ready"
        } else {
            "off"
        }
    }
}

// ── Setup ───────────────────────────────────────────────────────────────────

fn init_logging(path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

// ── Main loop ───────────────────────────────────────────────────────────────

fn run(out: &mut io::Stdout, cfg: &Config) -> Result<Option<Summary>> {
    let tracker = spawn_tracker(WsTracker {
        url: cfg.tracker_url().to_string(),
        reconnect_delay: cfg.reconnect_delay(),
    });
    let mut audio = Audio::open(cfg);

    let exercise = ExerciseState::new(cfg.exercise(), cfg.mode(), cfg.movement_range());
    let mut session = GameSession::new(Rules::from_config(cfg), exercise, StdRng::from_os_rng());

    let (cols, rows) = terminal::size()?;
    let mut buf = PixelBuf::for_terminal(cols, rows);
    let frame_dur = cfg.frame_duration();
    let mut events = Vec::new();

    loop {
        let frame_start = Instant::now();

        for msg in tracker.drain() {
            session.apply_tracker(&msg);
        }

        // Input
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracker.shutdown();
                        audio.music.stop();
                        return Ok(session.dispose());
                    }
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        if session.start(frame_start) {
                            audio.music.start();
                        }
                    }
                    KeyCode::Char('s') => {
                        if session.stop() {
                            audio.music.stop();
                        }
                    }
                    KeyCode::Char('e') => session.set_exercise(session.exercise.kind.next()),
                    KeyCode::Char('m') => session.set_mode(session.exercise.mode.toggled()),
                    KeyCode::Char('+') | KeyCode::Char('=') => session
                        .set_movement_range(session.exercise.movement_range() + RANGE_STEP),
                    KeyCode::Char('-') => session
                        .set_movement_range(session.exercise.movement_range() - RANGE_STEP),
                    _ => {}
                },
                Event::Resize(c, r) => buf.resize(c as usize, r as usize * 2),
                _ => {}
            }
        }

        // Update
        let now = Instant::now();
        session.poll_spawner(now);
        session.tick(now, &mut events);
        for ev in events.drain(..) {
            audio.effects.handle(ev, now);
            if ev == GameEvent::GameOver {
                audio.music.stop();
            }
        }
        audio.music.poll();

        // Render
        let view = render::draw_scene(&mut buf, &session);
        buf.render(out)?;
        render::draw_text(out, &buf, &view, &session, audio.music_status())?;
        out.flush()?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < frame_dur {
            std::thread::sleep(frame_dur - elapsed);
        }
    }
}

fn main() -> Result<()> {
    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--init") {
        Config::write_template(Path::new(DEFAULT_CONFIG_PATH))
            .with_context(|| format!("writing {DEFAULT_CONFIG_PATH}"))?;
        println!("wrote {DEFAULT_CONFIG_PATH}");
        return Ok(());
    }

    let config_path = arg.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (cfg, config_err) = match Config::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(cfg.log_file())?;
    if let Some(e) = config_err {
        warn!("{e}; using default settings");
    }
    info!("config from {}", config_path.display());

    terminal::enable_raw_mode().context("enabling raw mode")?;
    let mut out = stdout();
    execute!(
        out,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::DisableLineWrap,
    )
    .context("preparing terminal")?;

    let cleanup = |out: &mut io::Stdout| -> io::Result<()> {
        execute!(
            out,
            terminal::LeaveAlternateScreen,
            cursor::Show,
            terminal::EnableLineWrap,
        )?;
        terminal::disable_raw_mode()
    };

    let result = run(&mut out, &cfg);
    cleanup(&mut out).context("restoring terminal")?;

    if let Some(summary) = result? {
        info!(score = summary.score, best = summary.best, "exiting");
        println!("Final score: {}  Best: {}", summary.score, summary.best);
    }
    Ok(())
}
