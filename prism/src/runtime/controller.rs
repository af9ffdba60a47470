use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use super::config::{EngineConfig, validate_rate};
use super::error::EngineResult;
use super::events::{EngineEvent, EngineEventSender, EventSink};
use super::scheduler::{DualClockScheduler, FailureHook};
use super::tasks::{AsyncSetupTask, RedrawTick, StepTick};
use crate::canvas::{Canvas, HostSurface, Rasterizer, SurfaceHandle, SurfaceSize};
use crate::input::InputPipeline;
use crate::sketch::{Context, Sketch};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SketchState {
    /// Surface not yet sized.
    Uninitialized,
    /// Set up and stopped.
    Ready,
    /// Started and resumed; both clocks active.
    Running,
    /// Started but paused; clocks inactive.
    Suspended,
    /// Terminal.
    Destroyed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rate {
    Step,
    Frame,
    Input,
}

impl Rate {
    fn name(self) -> &'static str {
        match self {
            Self::Step => "step_rate",
            Self::Frame => "frame_rate",
            Self::Input => "input_rate",
        }
    }
}

pub(crate) struct Core<R: Rasterizer> {
    this: Weak<Core<R>>,
    // Serializes lifecycle transitions. Clock and input workers never take
    // it; they only read `state`.
    lifecycle: Mutex<()>,
    state: Mutex<SketchState>,
    sketch: Mutex<Box<dyn Sketch<R>>>,
    surface: SurfaceHandle<R>,
    scheduler: Mutex<DualClockScheduler>,
    setup_task: Mutex<Option<AsyncSetupTask>>,
    input: InputPipeline<R>,
    host: Box<dyn HostSurface>,
    step_count: AtomicU64,
    step_rate: AtomicU32,
    frame_rate: AtomicU32,
    scale: f32,
    vsync: AtomicBool,
    shutdown_timeout: Duration,
    events: EventSink,
}

impl<R: Rasterizer> Core<R> {
    pub fn is_running(&self) -> bool {
        *self.state.lock() == SketchState::Running
    }

    pub fn is_vsync(&self) -> bool {
        self.vsync.load(Ordering::Acquire)
    }

    fn state(&self) -> SketchState {
        *self.state.lock()
    }

    fn set_state(&self, state: SketchState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        debug!("{:?} -> {:?}", previous, state);
    }

    pub fn perform_step(&self) {
        let mut sketch = self.sketch.lock();

        // Re-checked under the sketch lock so a step never lands after the
        // pause hook of a concurrent pause.
        if !self.is_running() {
            return;
        }

        self.surface.with_canvas(|canvas| {
            let step_count = self.step_count.fetch_add(1, Ordering::AcqRel) + 1;
            sketch.step(&mut Context { canvas, step_count });
        });

        // A destroy that timed out waiting on this step left the surface
        // for us to release.
        if self.state() == SketchState::Destroyed && self.surface.release() {
            debug!("Released surface after the last in-flight step");
        }
    }

    pub fn perform_draw(&self) {
        self.surface.with_canvas(|canvas| canvas.paint(|_| ()));
    }

    pub(crate) fn step_tick(&self) -> StepTick<R> {
        let flag = self.scheduler.lock().redraw_pending();
        StepTick::new(self.this.clone(), flag)
    }

    pub(crate) fn redraw_tick(&self) -> RedrawTick<R> {
        let flag = self.scheduler.lock().redraw_pending();
        RedrawTick::new(self.this.clone(), flag)
    }

    fn failure_hook(&self) -> FailureHook {
        let this = self.this.clone();
        Arc::new(move |clock| {
            if let Some(core) = this.upgrade() {
                core.events.emit(EngineEvent::TickFailed { clock });
            }
        })
    }

    // Lifecycle hooks wait for the sketch at most the shutdown timeout, since
    // a step that outlived a timed-out shutdown may still hold it.
    fn run_hook(
        &self,
        hook: &'static str,
        f: impl FnOnce(&mut Box<dyn Sketch<R>>),
    ) {
        match self.sketch.try_lock_for(self.shutdown_timeout) {
            Some(mut sketch) => f(&mut sketch),
            None => self.skip_hook(hook),
        }
    }

    fn skip_hook(&self, hook: &'static str) {
        warn!(
            "Skipping {} hook; sketch still busy after {:?}",
            hook, self.shutdown_timeout
        );
        self.events.emit(EngineEvent::HookSkipped { hook });
    }

    pub fn run_first_setup(&self, cancelled: &AtomicBool) {
        let _guard = self.lifecycle.lock();

        if cancelled.load(Ordering::Acquire) {
            trace!("Setup cancelled while waiting for the controller");
            return;
        }

        if self.setup_locked().is_ok() {
            self.start_locked();
        }
    }

    fn setup_locked(&self) -> EngineResult<()> {
        if self.state() != SketchState::Uninitialized {
            trace!("setup ignored in {:?}", self.state());
            return Ok(());
        }

        let allocated = SurfaceSize::scaled(self.host.size(), self.scale)
            .and_then(Canvas::<R>::allocate);

        let mut canvas = match allocated {
            Ok(canvas) => canvas,
            Err(err) => {
                warn!("Deferring setup: {}", err);
                self.events.emit(EngineEvent::SetupFailed(err.to_string()));
                return Err(err);
            }
        };

        let size = canvas.size();
        canvas.paint(|canvas| self.sketch.lock().setup(canvas));
        self.surface.install(canvas);

        self.set_state(SketchState::Ready);
        self.events.emit(EngineEvent::SetupComplete {
            w: size.w,
            h: size.h,
        });
        Ok(())
    }

    fn start_locked(&self) {
        let restartable = match self.state() {
            SketchState::Ready => true,
            SketchState::Running | SketchState::Suspended => {
                self.scheduler.lock().is_terminated()
            }
            SketchState::Uninitialized | SketchState::Destroyed => false,
        };

        if !restartable {
            trace!("start ignored in {:?}", self.state());
            return;
        }

        self.run_hook("start", |sketch| sketch.start());
        self.events.emit(EngineEvent::Started);
        self.set_state(SketchState::Suspended);
        self.resume_locked();
    }

    fn resume_locked(&self) {
        if self.state() != SketchState::Suspended {
            trace!("resume ignored in {:?}", self.state());
            return;
        }

        self.run_hook("resume", |sketch| sketch.resume());
        self.events.emit(EngineEvent::Resumed);
        self.set_state(SketchState::Running);

        let step = self.step_tick();
        let redraw = self.redraw_tick();
        let scheduled = self.scheduler.lock().schedule_at(
            self.step_rate.load(Ordering::Acquire),
            self.frame_rate.load(Ordering::Acquire),
            move || step.run(),
            move || redraw.run(),
            self.failure_hook(),
        );

        if let Err(err) = scheduled {
            error!("Failed to schedule clocks: {}", err);
            self.set_state(SketchState::Suspended);
        }
    }

    fn pause_locked(&self) {
        if self.state() != SketchState::Running {
            trace!("pause ignored in {:?}", self.state());
            return;
        }

        self.set_state(SketchState::Suspended);

        for clock in self.scheduler.lock().shutdown() {
            self.events.emit(EngineEvent::ShutdownTimedOut { clock });
        }

        self.run_hook("pause", |sketch| sketch.pause());
        self.events.emit(EngineEvent::Paused);
    }

    fn stop_locked(&self) {
        if !matches!(
            self.state(),
            SketchState::Running | SketchState::Suspended
        ) {
            trace!("stop ignored in {:?}", self.state());
            return;
        }

        self.pause_locked();
        self.cancel_setup();

        self.run_hook("stop", |sketch| sketch.stop());
        self.events.emit(EngineEvent::Stopped);
        self.set_state(SketchState::Ready);
    }

    fn destroy_locked(&self) {
        if self.state() == SketchState::Destroyed {
            return;
        }

        self.cancel_setup();
        self.stop_locked();

        self.input.detach();
        self.set_state(SketchState::Destroyed);

        let released = match self.sketch.try_lock_for(self.shutdown_timeout) {
            Some(mut sketch) => self
                .surface
                .release_with(self.shutdown_timeout, |c| sketch.destroy(c)),
            None => false,
        };

        if !released {
            self.skip_hook("destroy");
            debug!("Surface release deferred to the in-flight step");
        }

        self.events.emit(EngineEvent::Destroyed);
    }

    fn cancel_setup(&self) {
        if let Some(task) = self.setup_task.lock().take() {
            task.cancel();
        }
    }

    fn set_rate_locked(&self, rate: Rate, value: u32) -> EngineResult<()> {
        validate_rate(rate.name(), value)?;

        match rate {
            Rate::Step => self.step_rate.store(value, Ordering::Release),
            Rate::Frame => self.frame_rate.store(value, Ordering::Release),
            Rate::Input => self.input.set_input_rate(value),
        }

        if self.state() == SketchState::Running {
            debug!("Restarting clocks for {} = {}", rate.name(), value);
            self.stop_locked();
            self.start_locked();
        }

        Ok(())
    }
}

/// Facade over a running sketch: owns the lifecycle state machine, the
/// dual-rate scheduler, the input pipeline and the rendering surface.
///
/// Lifecycle calls made from a state that does not permit them are ignored.
/// Dropping the controller destroys it.
pub struct SketchController<R: Rasterizer> {
    core: Arc<Core<R>>,
}

impl<R: Rasterizer> SketchController<R> {
    pub fn new(
        sketch: impl Sketch<R>,
        host: impl HostSurface,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;

        let surface = SurfaceHandle::default();
        let input = InputPipeline::new(surface.clone(), config.input_rate)?;

        let core = Arc::new_cyclic(|this| Core {
            this: this.clone(),
            lifecycle: Mutex::new(()),
            state: Mutex::new(SketchState::Uninitialized),
            sketch: Mutex::new(Box::new(sketch)),
            surface,
            scheduler: Mutex::new(DualClockScheduler::new(
                config.shutdown_timeout(),
            )),
            setup_task: Mutex::new(None),
            input,
            host: Box::new(host),
            step_count: AtomicU64::new(0),
            step_rate: AtomicU32::new(config.step_rate),
            frame_rate: AtomicU32::new(config.frame_rate),
            scale: config.scale,
            vsync: AtomicBool::new(config.vsync),
            shutdown_timeout: config.shutdown_timeout(),
            events: EventSink::default(),
        });

        Ok(Self { core })
    }

    pub fn with_events(self, sender: EngineEventSender) -> Self {
        self.core.events.set(sender);
        self
    }

    /// Host notification that the surface can be drawn to. Before setup this
    /// spawns the background setup (which then starts the sketch); afterwards
    /// it performs a single redraw.
    pub fn on_surface_ready(&self) {
        let _guard = self.core.lifecycle.lock();

        match self.core.state() {
            SketchState::Destroyed => {}
            SketchState::Uninitialized => {
                let mut setup_task = self.core.setup_task.lock();
                if setup_task.as_ref().is_some_and(AsyncSetupTask::is_pending) {
                    return;
                }
                match AsyncSetupTask::spawn(self.core.this.clone()) {
                    Ok(task) => *setup_task = Some(task),
                    Err(err) => error!("Failed to spawn setup: {}", err),
                }
            }
            _ => self.core.perform_draw(),
        }
    }

    /// Sizes and allocates the surface and runs the setup hook. Fails, leaving
    /// the controller uninitialized, when the scaled host size is empty.
    pub fn setup(&self) -> EngineResult<()> {
        let _guard = self.core.lifecycle.lock();
        self.core.setup_locked()
    }

    pub fn start(&self) {
        let _guard = self.core.lifecycle.lock();
        self.core.start_locked();
    }

    pub fn resume(&self) {
        let _guard = self.core.lifecycle.lock();
        self.core.resume_locked();
    }

    /// Stops both clocks, waiting at most the configured shutdown timeout.
    pub fn pause(&self) {
        let _guard = self.core.lifecycle.lock();
        self.core.pause_locked();
    }

    pub fn stop(&self) {
        let _guard = self.core.lifecycle.lock();
        self.core.stop_locked();
    }

    pub fn destroy(&self) {
        let _guard = self.core.lifecycle.lock();
        self.core.destroy_locked();
    }

    /// Re-measures the host and resizes the canvas if its size changed.
    pub fn reset(&self) -> EngineResult<()> {
        let _guard = self.core.lifecycle.lock();

        if matches!(
            self.core.state(),
            SketchState::Uninitialized | SketchState::Destroyed
        ) {
            return Ok(());
        }

        let size = SurfaceSize::scaled(self.core.host.size(), self.core.scale)?;
        self.core.surface.with_canvas(|canvas| canvas.resize(size));
        Ok(())
    }

    pub fn set_step_rate(&self, rate: u32) -> EngineResult<()> {
        self.set_rate(Rate::Step, rate)
    }

    pub fn set_frame_rate(&self, rate: u32) -> EngineResult<()> {
        self.set_rate(Rate::Frame, rate)
    }

    pub fn set_input_rate(&self, rate: u32) -> EngineResult<()> {
        self.set_rate(Rate::Input, rate)
    }

    /// Takes effect on the next start unless running, in which case the
    /// clocks are restarted right away.
    pub fn set_rate(&self, rate: Rate, value: u32) -> EngineResult<()> {
        let _guard = self.core.lifecycle.lock();
        self.core.set_rate_locked(rate, value)
    }

    pub fn set_vsync(&self, vsync: bool) {
        self.core.vsync.store(vsync, Ordering::Release);
    }

    pub fn state(&self) -> SketchState {
        self.core.state()
    }

    pub fn step_count(&self) -> u64 {
        self.core.step_count.load(Ordering::Acquire)
    }

    pub fn step_rate(&self) -> u32 {
        self.core.step_rate.load(Ordering::Acquire)
    }

    pub fn frame_rate(&self) -> u32 {
        self.core.frame_rate.load(Ordering::Acquire)
    }

    pub fn input_rate(&self) -> u32 {
        self.core.input.input_rate()
    }

    pub fn is_vsync(&self) -> bool {
        self.core.is_vsync()
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.core.surface.size()
    }

    pub fn surface(&self) -> SurfaceHandle<R> {
        self.core.surface.clone()
    }

    pub fn input(&self) -> &InputPipeline<R> {
        &self.core.input
    }
}

impl<R: Rasterizer> Drop for SketchController<R> {
    fn drop(&mut self) {
        self.destroy();
    }
}
