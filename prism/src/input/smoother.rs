const SPRING: f32 = 0.1;
const DAMP: f32 = 0.6;

/// Spring-damper filter over a 2D position stream.
///
/// Each [`GestureSmoother::move_to`] pulls the tracked point toward the
/// target with a force proportional to the remaining distance, then damps the
/// accumulated velocity, trading responsiveness for smoothness.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureSmoother {
    x: f32,
    y: f32,
    old_x: f32,
    old_y: f32,
    vx: f32,
    vy: f32,
}

impl GestureSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn old_x(&self) -> f32 {
        self.old_x
    }

    pub fn old_y(&self) -> f32 {
        self.old_y
    }

    /// Magnitude of the current velocity.
    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.old_x = self.x;
        self.old_y = self.y;

        self.vx = (self.vx + (x - self.x) * SPRING) * DAMP;
        self.vy = (self.vy + (y - self.y) * SPRING) * DAMP;

        self.x += self.vx;
        self.y += self.vy;
    }

    /// Jumps to `(x, y)`. Velocity is kept, so a new drag picks up the
    /// momentum of the previous one.
    pub fn reset_to(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.old_x = x;
        self.old_y = y;
    }
}
