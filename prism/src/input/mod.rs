mod event;
mod pipeline;
mod smoother;

pub use event::{Direction, Gesture, PointerAction, PointerEvent};
pub use pipeline::{GestureListener, InputPipeline, MOVE_SUBDIVISIONS};
pub use smoother::GestureSmoother;
