//! Falling obstacles: spawning, scrolling, pruning and contact tests.

use rand::Rng;

pub const OBSTACLE_WIDTH: f32 = 30.0;
pub const OBSTACLE_HEIGHT: f32 = 60.0;
/// Chance that a freshly spawned obstacle is a good one.
pub const GOOD_PROBABILITY: f64 = 0.7;

/// Axis-aligned box, `x`/`y` at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bounds {
    /// The square a circle of `radius` at `(cx, cy)` is tested with.
    pub fn square(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            x: cx - radius,
            y: cy - radius,
            w: radius * 2.0,
            h: radius * 2.0,
        }
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x + self.w > other.x
            && self.x < other.x + other.w
            && self.y + self.h > other.y
            && self.y < other.y + other.h
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub is_good: bool,
}

impl Obstacle {
    pub fn new(x: f32, y: f32, is_good: bool) -> Self {
        Self {
            x,
            y,
            width: OBSTACLE_WIDTH,
            height: OBSTACLE_HEIGHT,
            is_good,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            w: self.width,
            h: self.height,
        }
    }

    pub fn off_screen(&self) -> bool {
        self.x + self.width < 0.0
    }
}

/// Result of one collision pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts {
    /// Good obstacles collected (and removed) this frame.
    pub collected: u32,
    /// Whether a bad obstacle was hit. The obstacle stays in the field.
    pub crashed: bool,
}

#[derive(Debug, Default)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
}

impl ObstacleField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn clear(&mut self) {
        self.obstacles.clear();
    }

    pub fn push(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    /// Adds one obstacle at the right edge of a `width`×`height` area.
    pub fn spawn<R: Rng + ?Sized>(&mut self, rng: &mut R, width: f32, height: f32) {
        let y = rng.random::<f32>() * height;
        let is_good = rng.random_bool(GOOD_PROBABILITY);
        self.obstacles.push(Obstacle::new(width, y, is_good));
    }

    /// Scrolls every obstacle left by `speed`, drops the ones that left the
    /// screen, then tests the rest against `player`.
    ///
    /// A crashed player collides with nothing, and the first bad hit counts
    /// as crashing for the remainder of the pass.
    pub fn advance(&mut self, speed: f32, player: &Bounds, already_crashed: bool) -> Contacts {
        for o in &mut self.obstacles {
            o.x -= speed;
        }
        self.obstacles.retain(|o| !o.off_screen());

        let mut contacts = Contacts::default();
        if already_crashed {
            return contacts;
        }
        self.obstacles.retain(|o| {
            if contacts.crashed || !player.overlaps(&o.bounds()) {
                return true;
            }
            if o.is_good {
                contacts.collected += 1;
                false
            } else {
                contacts.crashed = true;
                true
            }
        });
        contacts
    }

    /// Drops every obstacle at or left of `x`.
    pub fn clear_before(&mut self, x: f32) {
        self.obstacles.retain(|o| o.x > x);
    }
}
