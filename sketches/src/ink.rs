use std::sync::Arc;

use parking_lot::Mutex;
use prism::prelude::*;

use crate::raster::LogRasterizer;

pub static SKETCH_CONFIG: SketchConfig = SketchConfig {
    name: "ink",
    display_name: "Ink",
    step_rate: 60,
    frame_rate: 60,
    w: 640,
    h: 360,
};

const MAX_DROPS: usize = 256;
const SPREAD: f32 = 1.04;
const FADE: f32 = 0.97;

#[derive(Clone, Copy, Debug)]
struct Blot {
    x: f32,
    y: f32,
    radius: f32,
    ink: f32,
}

type Drops = Arc<Mutex<Vec<Blot>>>;

/// Drops of ink that spread and fade every step. Drops are laid down by
/// [`InkBrush`] while dragging.
pub struct Ink {
    drops: Drops,
}

pub fn init() -> (Ink, InkBrush) {
    let drops = Drops::default();
    (
        Ink {
            drops: drops.clone(),
        },
        InkBrush { drops },
    )
}

impl Sketch<LogRasterizer> for Ink {
    fn setup(&mut self, canvas: &mut Canvas<LogRasterizer>) {
        info!(
            "{} set up on {}x{}",
            SKETCH_CONFIG.display_name,
            canvas.w(),
            canvas.h()
        );
    }

    fn step(&mut self, ctx: &mut Context<LogRasterizer>) {
        let mut drops = self.drops.lock();
        spread(&mut drops);

        ctx.canvas.paint(|canvas| {
            for drop in drops.iter() {
                canvas.raster_mut().circle(drop.x, drop.y, drop.radius);
            }
        });

        if ctx.step_count % 60 == 0 {
            debug!("step {}: {} drops", ctx.step_count, drops.len());
        }
    }

    fn pause(&mut self) {
        debug!("{} paused", SKETCH_CONFIG.display_name);
    }

    fn destroy(&mut self, canvas: Option<&mut Canvas<LogRasterizer>>) {
        if let Some(canvas) = canvas {
            info!(
                "{} finished: {} passes, {} marks",
                SKETCH_CONFIG.display_name,
                canvas.raster().passes(),
                canvas.raster().total_marks()
            );
        }
        self.drops.lock().clear();
    }
}

fn spread(drops: &mut Vec<Blot>) {
    for drop in drops.iter_mut() {
        drop.radius *= SPREAD;
        drop.ink *= FADE;
    }
    drops.retain(|drop| drop.ink > 0.05);
}

/// Lays ink along the smoothed pointer path; faster strokes leave larger
/// drops.
pub struct InkBrush {
    drops: Drops,
}

impl InkBrush {
    fn lay(&self, gesture: &Gesture, radius: f32) {
        let mut drops = self.drops.lock();
        if drops.len() >= MAX_DROPS {
            drops.remove(0);
        }
        drops.push(Blot {
            x: gesture.smooth_x(),
            y: gesture.smooth_y(),
            radius,
            ink: 1.0,
        });
    }
}

impl GestureListener<LogRasterizer> for InkBrush {
    fn on_touch(
        &mut self,
        gesture: &Gesture,
        surface: &SurfaceHandle<LogRasterizer>,
    ) {
        self.lay(gesture, 2.0);
        surface.with_canvas(|canvas| {
            canvas.paint(|c| c.raster_mut().circle(gesture.x, gesture.y, 2.0))
        });
    }

    fn on_drag(
        &mut self,
        gesture: &Gesture,
        _surface: &SurfaceHandle<LogRasterizer>,
    ) {
        self.lay(gesture, 1.0 + gesture.speed() * 0.5);
    }

    fn on_release(
        &mut self,
        gesture: &Gesture,
        _surface: &SurfaceHandle<LogRasterizer>,
    ) {
        trace!(
            "Stroke released at ({}, {}) heading {:?}",
            gesture.x,
            gesture.y,
            gesture.horizontal_direction()
        );
    }
}
