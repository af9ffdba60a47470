use crate::canvas::{Canvas, Rasterizer};

pub struct SketchConfig {
    pub name: &'static str,
    pub display_name: &'static str,
    pub step_rate: u32,
    pub frame_rate: u32,
    pub w: u32,
    pub h: u32,
}

/// Per-step view handed to [`Sketch::step`].
pub struct Context<'a, R> {
    pub canvas: &'a mut Canvas<R>,
    pub step_count: u64,
}

/// Lifecycle hooks of a sketch. Every hook defaults to a no-op. Hooks run one
/// at a time: a hook is never entered while another hook of the same sketch
/// is still running.
#[allow(unused_variables)]
pub trait Sketch<R: Rasterizer>: Send + 'static {
    /// First-time setup, run off the caller's thread inside a paint pass.
    fn setup(&mut self, canvas: &mut Canvas<R>) {}

    fn start(&mut self) {}

    fn resume(&mut self) {}

    /// One simulation step; runs on the step clock.
    fn step(&mut self, ctx: &mut Context<R>) {}

    fn pause(&mut self) {}

    fn stop(&mut self) {}

    /// Last chance to touch the canvas before it is released.
    fn destroy(&mut self, canvas: Option<&mut Canvas<R>>) {}
}
