pub use crate::canvas::{
    Canvas, FixedHost, HostSurface, Rasterizer, SurfaceHandle, SurfaceSize,
};
pub use crate::core::logging::init_logger;
pub use crate::core::logging::{debug, error, info, trace, warn};
pub use crate::image::{LoadImageListener, load_async};
pub use crate::input::{
    Direction, Gesture, GestureListener, InputPipeline, PointerAction,
    PointerEvent,
};
pub use crate::runtime::config::EngineConfig;
pub use crate::runtime::controller::{Rate, SketchController, SketchState};
pub use crate::runtime::error::{EngineError, EngineResult};
pub use crate::runtime::events::{
    ClockKind, EngineEvent, EngineEventReceiver, EngineEventSender,
    event_channel,
};
pub use crate::sketch::{Context, Sketch, SketchConfig};
