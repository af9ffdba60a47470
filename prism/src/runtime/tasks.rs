use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use log::trace;

use super::controller::Core;
use super::error::{EngineError, EngineResult};
use super::scheduler::RedrawFlag;
use crate::canvas::Rasterizer;

const SETUP_THREAD: &str = "prism-setup";

/// Step clock work: one simulation step, then the pending redraw when the
/// controller is vsync-synchronized. Holds only a weak reference so a tick can
/// never keep a released controller alive.
pub(crate) struct StepTick<R: Rasterizer> {
    core: Weak<Core<R>>,
    redraw_pending: Arc<RedrawFlag>,
}

impl<R: Rasterizer> StepTick<R> {
    pub fn new(core: Weak<Core<R>>, redraw_pending: Arc<RedrawFlag>) -> Self {
        Self {
            core,
            redraw_pending,
        }
    }

    pub fn run(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };

        if !core.is_running() {
            return;
        }

        core.perform_step();

        if core.is_running()
            && core.is_vsync()
            && self.redraw_pending.take()
        {
            core.perform_draw();
        }
    }
}

/// Screen-update clock work: in vsync mode only marks a redraw as pending,
/// otherwise redraws directly.
pub(crate) struct RedrawTick<R: Rasterizer> {
    core: Weak<Core<R>>,
    redraw_pending: Arc<RedrawFlag>,
}

impl<R: Rasterizer> RedrawTick<R> {
    pub fn new(core: Weak<Core<R>>, redraw_pending: Arc<RedrawFlag>) -> Self {
        Self {
            core,
            redraw_pending,
        }
    }

    pub fn run(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };

        if !core.is_running() {
            return;
        }

        if core.is_vsync() {
            self.redraw_pending.request();
        } else {
            core.perform_draw();
        }
    }
}

/// One-shot first-time setup on a background thread. Cancelling only has an
/// effect before the task has claimed the controller; once running it
/// completes.
pub(crate) struct AsyncSetupTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl AsyncSetupTask {
    pub fn spawn<R: Rasterizer>(core: Weak<Core<R>>) -> EngineResult<Self> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = thread::Builder::new()
            .name(SETUP_THREAD.to_string())
            .spawn(move || {
                if flag.load(Ordering::Acquire) {
                    trace!("Setup cancelled before it started");
                    return;
                }

                match core.upgrade() {
                    Some(core) => core.run_first_setup(&flag),
                    None => trace!("Controller released before setup"),
                }
            })
            .map_err(|source| EngineError::Spawn {
                name: SETUP_THREAD.to_string(),
                source,
            })?;

        Ok(Self { cancelled, handle })
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        !self.is_finished() && !self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
