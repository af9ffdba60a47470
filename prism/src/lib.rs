#[path = "render/canvas.rs"]
pub mod canvas;
pub mod core;
#[path = "render/image.rs"]
pub mod image;
pub mod input;
pub mod prelude;
pub mod runtime;
#[path = "sketches/sketch.rs"]
pub mod sketch;

pub use runtime::controller::{Rate, SketchController, SketchState};
pub use runtime::error::{EngineError, EngineResult};
