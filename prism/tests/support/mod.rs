#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prism::prelude::*;

pub fn wait_until(timeout: Duration, f: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    f()
}

#[derive(Debug, Default)]
pub struct RecordingRasterizer {
    pub size: Option<SurfaceSize>,
    pub begun: u64,
    pub ended: u64,
    pub in_pass: bool,
    pub nested_passes: u64,
}

impl Rasterizer for RecordingRasterizer {
    fn allocate(size: SurfaceSize) -> EngineResult<Self> {
        Ok(Self {
            size: Some(size),
            ..Self::default()
        })
    }

    fn begin_pass(&mut self) {
        if self.in_pass {
            self.nested_passes += 1;
        }
        self.in_pass = true;
        self.begun += 1;
    }

    fn end_pass(&mut self) {
        self.in_pass = false;
        self.ended += 1;
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = Some(size);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hook {
    Setup,
    Start,
    Resume,
    Step(u64),
    Pause,
    Stop,
    Destroy { had_canvas: bool },
}

pub type HookLog = Arc<Mutex<Vec<Hook>>>;

#[derive(Default)]
pub struct RecordingSketch {
    pub log: HookLog,
    pub step_delay: Option<Duration>,
    pub panic_on_step: bool,
}

impl RecordingSketch {
    pub fn new() -> (Self, HookLog) {
        let sketch = Self::default();
        let log = sketch.log.clone();
        (sketch, log)
    }
}

impl Sketch<RecordingRasterizer> for RecordingSketch {
    fn setup(&mut self, canvas: &mut Canvas<RecordingRasterizer>) {
        assert!(canvas.raster().in_pass, "setup runs inside a paint pass");
        self.log.lock().push(Hook::Setup);
    }

    fn start(&mut self) {
        self.log.lock().push(Hook::Start);
    }

    fn resume(&mut self) {
        self.log.lock().push(Hook::Resume);
    }

    fn step(&mut self, ctx: &mut Context<RecordingRasterizer>) {
        if self.panic_on_step {
            panic!("step {} exploded", ctx.step_count);
        }
        if let Some(delay) = self.step_delay {
            thread::sleep(delay);
        }
        self.log.lock().push(Hook::Step(ctx.step_count));
    }

    fn pause(&mut self) {
        self.log.lock().push(Hook::Pause);
    }

    fn stop(&mut self) {
        self.log.lock().push(Hook::Stop);
    }

    fn destroy(&mut self, canvas: Option<&mut Canvas<RecordingRasterizer>>) {
        self.log.lock().push(Hook::Destroy {
            had_canvas: canvas.is_some(),
        });
    }
}

pub fn hooks_without_steps(log: &HookLog) -> Vec<Hook> {
    log.lock()
        .iter()
        .copied()
        .filter(|hook| !matches!(hook, Hook::Step(_)))
        .collect()
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        step_rate: 200,
        frame_rate: 200,
        input_rate: 1000,
        shutdown_timeout_ms: 2_000,
        ..EngineConfig::default()
    }
}
