//! Terminal drawing: a half-block pixel buffer for the game area and plain
//! text lines for the HUD.
//!
//! Each terminal cell shows two vertical pixels using `▀` with separate
//! foreground (top) and background (bottom) colours. The logical game area
//! is stretched over the whole buffer.

use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{self, Color},
};
use rand::Rng;

use crate::session::{GameSession, Rules, Summary};

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }

    fn term(self) -> Color {
        Color::Rgb {
            r: self.0,
            g: self.1,
            b: self.2,
        }
    }
}

pub const BG_TOP: Rgb = Rgb(18, 20, 34);
pub const BG_BOT: Rgb = Rgb(34, 38, 58);
pub const PLAYER: Rgb = Rgb(50, 100, 240);
pub const PLAYER_CRASHED: Rgb = Rgb(235, 50, 50);
pub const GOOD: Rgb = Rgb(60, 200, 90);
pub const BAD: Rgb = Rgb(220, 55, 55);
pub const HEALTH_EMPTY: Rgb = Rgb(200, 30, 30);
pub const HEALTH_FULL: Rgb = Rgb(40, 190, 60);
pub const OUTLINE: Rgb = Rgb(0, 0, 0);
const TEXT: Color = Color::White;
const TEXT_DIM: Color = Color::Grey;

/// Health bar placement in logical units.
const HEALTH_BAR: (f32, f32, f32, f32) = (110.0, 10.0, 100.0, 20.0);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

pub struct PixelBuf {
    w: usize,
    /// Pixel height, terminal rows * 2.
    h: usize,
    px: Vec<Rgb>,
}

impl PixelBuf {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            px: vec![BG_TOP; w * h],
        }
    }

    /// Buffer covering a terminal of `cols` × `rows` cells.
    pub fn for_terminal(cols: u16, rows: u16) -> Self {
        Self::new(cols as usize, rows as usize * 2)
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.px.resize(w * h, BG_TOP);
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    pub fn outline_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dx in 0..w {
            self.set(x + dx, y, c);
            self.set(x + dx, y + h - 1, c);
        }
        for dy in 0..h {
            self.set(x, y + dy, c);
            self.set(x + w - 1, y + dy, c);
        }
    }

    /// Filled ellipse; terminal pixels are rarely square, so the two radii
    /// differ after scaling.
    pub fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, c: Rgb) {
        let (rx, ry) = (rx.max(0.5), ry.max(0.5));
        let (x0, x1) = ((cx - rx).floor() as i32, (cx + rx).ceil() as i32);
        let (y0, y1) = ((cy - ry).floor() as i32, (cy + ry).ceil() as i32);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = (x as f32 + 0.5 - cx) / rx;
                let dy = (y as f32 + 0.5 - cy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    self.set(x, y, c);
                }
            }
        }
    }

    fn clear(&mut self) {
        let h = self.h.max(1);
        for y in 0..self.h {
            let c = Rgb::lerp(BG_TOP, BG_BOT, (y * 256 / h) as u16);
            self.px[y * self.w..(y + 1) * self.w].fill(c);
        }
    }

    /// Queues the whole buffer. The caller flushes once text is on top.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut prev_fg = None;
        let mut prev_bg = None;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);

                if prev_bg != Some(bot) {
                    queue!(out, style::SetBackgroundColor(bot.term()))?;
                    prev_bg = Some(bot);
                }
                if top == bot {
                    queue!(out, style::Print(' '))?;
                } else {
                    if prev_fg != Some(top) {
                        queue!(out, style::SetForegroundColor(top.term()))?;
                        prev_fg = Some(top);
                    }
                    queue!(out, style::Print('\u{2580}'))?; // ▀
                }
            }
            if row + 1 < rows {
                queue!(out, style::ResetColor, style::Print("\r\n"))?;
                prev_fg = None;
                prev_bg = None;
            }
        }
        queue!(out, style::ResetColor)
    }
}

// ── Logical → screen mapping ────────────────────────────────────────────────

/// Scale from logical game units to buffer pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub sx: f32,
    pub sy: f32,
}

impl Viewport {
    pub fn fit(buf: &PixelBuf, rules: &Rules) -> Self {
        Self {
            sx: buf.width() as f32 / rules.width,
            sy: buf.height() as f32 / rules.height,
        }
    }

    pub fn px(&self, x: f32) -> i32 {
        (x * self.sx).round() as i32
    }

    pub fn py(&self, y: f32) -> i32 {
        (y * self.sy).round() as i32
    }

    /// Terminal row holding logical `y`.
    pub fn row(&self, y: f32) -> u16 {
        (self.py(y).max(0) / 2) as u16
    }
}

// ── Scene ───────────────────────────────────────────────────────────────────

/// Draws the game area for the current session state. A finished run
/// leaves only the background behind its summary.
pub fn draw_scene<R: Rng>(buf: &mut PixelBuf, session: &GameSession<R>) -> Viewport {
    let view = Viewport::fit(buf, session.rules());
    buf.clear();
    if session.summary().is_some() {
        return view;
    }

    for o in session.obstacles.iter() {
        buf.fill_rect(
            view.px(o.x),
            view.py(o.y),
            view.px(o.width).max(1),
            view.py(o.height).max(1),
            if o.is_good { GOOD } else { BAD },
        );
    }

    let p = &session.player;
    let color = if p.is_crashed() { PLAYER_CRASHED } else { PLAYER };
    buf.fill_ellipse(
        p.x * view.sx,
        p.y * view.sy,
        p.radius * view.sx,
        p.radius * view.sy,
        color,
    );

    draw_health(buf, &view, session);
    view
}

fn draw_health<R: Rng>(buf: &mut PixelBuf, view: &Viewport, session: &GameSession<R>) {
    let (from_right, top, w, h) = HEALTH_BAR;
    let x = view.px(session.rules().width - from_right);
    let y = view.py(top);
    let (pw, ph) = (view.px(w).max(1), view.py(h).max(1));
    let filled = (session.player.health_fraction() * pw as f32).round() as i32;

    buf.fill_rect(x, y, pw, ph, HEALTH_EMPTY);
    buf.fill_rect(x, y, filled, ph, HEALTH_FULL);
    buf.outline_rect(x - 1, y - 1, pw + 2, ph + 2, OUTLINE);
}

// ── Text ────────────────────────────────────────────────────────────────────

/// Queues `text` centred on terminal column `cx`.
fn centred(out: &mut impl Write, cx: u16, row: u16, text: &str, color: Color) -> io::Result<()> {
    let col = cx.saturating_sub(text.chars().count() as u16 / 2);
    queue!(
        out,
        cursor::MoveTo(col, row),
        style::SetForegroundColor(color),
        style::Print(text),
        style::ResetColor
    )
}

/// Score, exercise value and message rate, centred at the top.
pub fn hud_lines<R: Rng>(session: &GameSession<R>) -> [String; 3] {
    let ex = &session.exercise;
    [
        format!("Score: {}", session.score()),
        format!("{}: {:.2}", ex.kind, ex.displayed),
        format!("Frame Rate: {}", session.message_rate()),
    ]
}

/// Bottom status line: settings, connection and key help.
pub fn status_line<R: Rng>(session: &GameSession<R>, music: &str) -> String {
    let ex = &session.exercise;
    format!(
        " {} | {} | range {:.2} | tracker {} | music {} | [space] start [s] stop [e] exercise [m] mode [+/-] range [q] quit",
        ex.kind,
        ex.mode,
        ex.movement_range(),
        if session.tracker_connected() { "connected" } else { "offline" },
        music,
    )
}

pub fn summary_lines(summary: &Summary) -> [String; 4] {
    [
        "Game Over".to_string(),
        format!("Final Score: {}", summary.score),
        format!("Best: {}", summary.best),
        "Press space to play again".to_string(),
    ]
}

/// Queues every text element on top of the already-rendered buffer.
pub fn draw_text<R: Rng>(
    out: &mut impl Write,
    buf: &PixelBuf,
    view: &Viewport,
    session: &GameSession<R>,
    music: &str,
) -> io::Result<()> {
    let width = session.rules().width;
    let height = session.rules().height;
    let cx = view.px(width / 2.0).max(0) as u16;

    if session.is_running() {
        for (i, line) in hud_lines(session).iter().enumerate() {
            centred(out, cx, view.row(30.0 * (i + 1) as f32), line, TEXT)?;
        }
    } else if let Some(summary) = session.summary() {
        let mid = view.row(height / 2.0);
        for (i, line) in summary_lines(&summary).iter().enumerate() {
            let row = mid.saturating_sub(2) + i as u16 + if i == 3 { 1 } else { 0 };
            centred(out, cx, row, line, if i == 3 { TEXT_DIM } else { TEXT })?;
        }
    } else {
        let mid = view.row(height / 2.0);
        centred(out, cx, mid.saturating_sub(1), "PINCH DODGE", TEXT)?;
        centred(out, cx, mid + 1, "Press space to start", TEXT_DIM)?;
    }

    let last_row = (buf.height() / 2).saturating_sub(1) as u16;
    let mut status = status_line(session, music);
    status.truncate(buf.width());
    queue!(
        out,
        cursor::MoveTo(0, last_row),
        style::SetForegroundColor(TEXT_DIM),
        style::Print(status),
        style::ResetColor
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{ExerciseKind, ExerciseState, GameMode};
    use crate::obstacle::Obstacle;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Instant;

    fn session() -> GameSession {
        GameSession::new(
            Rules::default(),
            ExerciseState::new(ExerciseKind::ThumbIndexPinch, GameMode::Regular, 1.0),
            StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn set_ignores_out_of_range() {
        let mut buf = PixelBuf::new(4, 4);
        buf.set(-1, 0, GOOD);
        buf.set(4, 0, GOOD);
        buf.fill_rect(2, 2, 10, 10, GOOD);
        assert_eq!(buf.get(3, 3), GOOD);
        assert_eq!(buf.get(1, 1), BG_TOP);
    }

    #[test]
    fn viewport_stretches_logical_area() {
        let buf = PixelBuf::for_terminal(80, 20);
        let view = Viewport::fit(&buf, &Rules::default());
        assert_eq!(view.px(800.0), 80);
        assert_eq!(view.py(400.0), 40);
        assert_eq!(view.row(200.0), 10);
    }

    #[test]
    fn player_colour_tracks_crash_state() {
        let mut s = session();
        let mut buf = PixelBuf::new(80, 40);
        draw_scene(&mut buf, &s);
        assert_eq!(buf.get(5, 20), PLAYER);

        s.start(Instant::now());
        s.player.crash(GameMode::Regular, Instant::now());
        draw_scene(&mut buf, &s);
        assert_eq!(buf.get(5, 20), PLAYER_CRASHED);
    }

    #[test]
    fn obstacles_use_their_kind_colour() {
        let mut s = session();
        s.obstacles.push(Obstacle::new(400.0, 100.0, true));
        s.obstacles.push(Obstacle::new(600.0, 100.0, false));
        let mut buf = PixelBuf::new(80, 40);
        draw_scene(&mut buf, &s);
        assert_eq!(buf.get(41, 12), GOOD);
        assert_eq!(buf.get(61, 12), BAD);
    }

    #[test]
    fn health_bar_fill_is_proportional() {
        let mut s = session();
        let mut buf = PixelBuf::new(160, 80);
        draw_scene(&mut buf, &s);
        // bar spans x 138..158, y 2..6
        assert_eq!(buf.get(139, 3), HEALTH_FULL);
        assert_eq!(buf.get(156, 3), HEALTH_FULL);
        assert_eq!(buf.get(137, 1), OUTLINE);

        s.player.health = 0;
        draw_scene(&mut buf, &s);
        assert_eq!(buf.get(139, 3), HEALTH_EMPTY);
    }

    #[test]
    fn half_blocks_only_where_rows_differ() {
        let mut buf = PixelBuf::new(2, 2);
        buf.set(1, 0, GOOD);
        let mut out = Vec::new();
        buf.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('\u{2580}').count(), 1);
    }

    #[test]
    fn stopped_run_clears_the_canvas() {
        let mut s = session();
        s.start(Instant::now());
        s.obstacles.push(Obstacle::new(400.0, 100.0, true));
        let mut buf = PixelBuf::new(80, 40);
        draw_scene(&mut buf, &s);
        assert_eq!(buf.get(41, 12), GOOD);

        s.stop();
        draw_scene(&mut buf, &s);
        let background = Rgb::lerp(BG_TOP, BG_BOT, 12 * 256 / 40);
        assert_eq!(buf.get(41, 12), background);
        assert_ne!(buf.get(5, 20), PLAYER);
    }

    #[test]
    fn text_reflects_session_state() {
        let mut s = session();
        assert!(status_line(&s, "off").contains("offline"));
        s.exercise.displayed = 48.5;
        let hud = hud_lines(&s);
        assert_eq!(hud[0], "Score: 0");
        assert_eq!(hud[1], "thumb_index_pinch: 48.50");
        s.start(Instant::now());
        s.stop();
        let summary = s.summary().unwrap();
        assert_eq!(summary_lines(&summary)[1], "Final Score: 0");
    }
}
