use super::smoother::GestureSmoother;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
}

/// A raw pointer sample as delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn down(x: f32, y: f32) -> Self {
        Self {
            action: PointerAction::Down,
            x,
            y,
        }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self {
            action: PointerAction::Move,
            x,
            y,
        }
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self {
            action: PointerAction::Up,
            x,
            y,
        }
    }

    pub(crate) fn at(self, x: f32, y: f32) -> Self {
        Self { x, y, ..self }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Gesture state after the most recent logical event. Raw positions start at
/// `(-1, -1)` until the first event arrives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gesture {
    pub x: f32,
    pub y: f32,
    pub previous_x: f32,
    pub previous_y: f32,
    pub touched: bool,
    pub moving: bool,
    pub(crate) smoother: GestureSmoother,
}

impl Default for Gesture {
    fn default() -> Self {
        Self {
            x: -1.0,
            y: -1.0,
            previous_x: -1.0,
            previous_y: -1.0,
            touched: false,
            moving: false,
            smoother: GestureSmoother::default(),
        }
    }
}

impl Gesture {
    pub fn smooth_x(&self) -> f32 {
        self.smoother.x()
    }

    pub fn smooth_y(&self) -> f32 {
        self.smoother.y()
    }

    pub fn previous_smooth_x(&self) -> f32 {
        self.smoother.old_x()
    }

    pub fn previous_smooth_y(&self) -> f32 {
        self.smoother.old_y()
    }

    pub fn speed(&self) -> f32 {
        self.smoother.speed()
    }

    pub fn horizontal_direction(&self) -> Direction {
        if self.smoother.x() > self.smoother.old_x() {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    pub fn vertical_direction(&self) -> Direction {
        if self.smoother.y() > self.smoother.old_y() {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}
