use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use log::{debug, trace};
use parking_lot::Mutex;

use super::event::{Gesture, PointerAction, PointerEvent};
use crate::canvas::{Rasterizer, SurfaceHandle};
use crate::runtime::config::period_for;
use crate::runtime::error::{EngineError, EngineResult};

/// Number of logical events a single move is split into.
pub const MOVE_SUBDIVISIONS: u32 = 2;

const WORKER_NAME: &str = "prism-input";

/// Receives gesture notifications on the input worker. Every callback gets
/// the gesture state after the event and the shared rendering surface.
#[allow(unused_variables)]
pub trait GestureListener<R>: Send + 'static {
    fn on_touch(&mut self, gesture: &Gesture, surface: &SurfaceHandle<R>) {}

    fn on_release(&mut self, gesture: &Gesture, surface: &SurfaceHandle<R>) {}

    fn on_drag(&mut self, gesture: &Gesture, surface: &SurfaceHandle<R>) {}

    /// Called after the phase callback for every logical event.
    fn on_motion(&mut self, gesture: &Gesture, surface: &SurfaceHandle<R>) {}
}

struct Shared<R> {
    listener: Mutex<Option<Box<dyn GestureListener<R>>>>,
    gesture: Mutex<Gesture>,
    surface: SurfaceHandle<R>,
    // Bumped on detach; a worker only dispatches while its generation is
    // current.
    generation: AtomicU64,
    input_rate: AtomicU32,
}

/// Serializes raw pointer events onto one dedicated worker, subdivides moves,
/// classifies gesture phases and forwards them to the attached listener.
pub struct InputPipeline<R> {
    shared: Arc<Shared<R>>,
    sender: Mutex<Option<Sender<PointerEvent>>>,
}

impl<R: Rasterizer> InputPipeline<R> {
    pub fn new(surface: SurfaceHandle<R>, input_rate: u32) -> EngineResult<Self> {
        let pipeline = Self {
            shared: Arc::new(Shared {
                listener: Mutex::new(None),
                gesture: Mutex::new(Gesture::default()),
                surface,
                generation: AtomicU64::new(0),
                input_rate: AtomicU32::new(input_rate.max(1)),
            }),
            sender: Mutex::new(None),
        };
        pipeline.spawn_worker()?;
        Ok(pipeline)
    }

    /// Queues `event` for the input worker. Safe to call from any thread.
    /// Returns false when the pipeline is detached.
    pub fn post_event(&self, event: PointerEvent) -> bool {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => {
                trace!("Dropping {:?}; input pipeline is detached", event);
                false
            }
        }
    }

    /// Installs `listener`, restarting the worker if the pipeline was
    /// detached.
    pub fn attach(
        &self,
        listener: impl GestureListener<R>,
    ) -> EngineResult<()> {
        *self.shared.listener.lock() = Some(Box::new(listener));

        if self.sender.lock().is_none() {
            self.spawn_worker()?;
        }

        Ok(())
    }

    /// Clears the listener and shuts the worker down. Events posted but not
    /// yet processed are discarded.
    pub fn detach(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.listener.lock().take();

        if self.sender.lock().take().is_some() {
            debug!("Input pipeline detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.shared.listener.lock().is_some()
    }

    pub fn gesture(&self) -> Gesture {
        *self.shared.gesture.lock()
    }

    pub fn input_rate(&self) -> u32 {
        self.shared.input_rate.load(Ordering::Relaxed)
    }

    pub fn set_input_rate(&self, rate: u32) {
        self.shared.input_rate.store(rate.max(1), Ordering::Relaxed);
    }

    fn spawn_worker(&self) -> EngineResult<()> {
        let (tx, rx) = mpsc::channel();
        let shared = self.shared.clone();
        let generation = shared.generation.load(Ordering::Acquire);

        thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run_worker(&shared, &rx, generation))
            .map_err(|source| EngineError::Spawn {
                name: WORKER_NAME.to_string(),
                source,
            })?;

        *self.sender.lock() = Some(tx);
        Ok(())
    }
}

fn run_worker<R: Rasterizer>(
    shared: &Shared<R>,
    rx: &Receiver<PointerEvent>,
    generation: u64,
) {
    while let Ok(first) = rx.recv() {
        let drained_at = Instant::now();

        for event in std::iter::once(first).chain(rx.try_iter()) {
            if !shared.is_current(generation) {
                trace!("Discarding queued input after detach");
                return;
            }
            shared.dispatch(event, generation);
        }

        let period = period_for(shared.input_rate.load(Ordering::Relaxed));
        if let Some(remaining) = period.checked_sub(drained_at.elapsed()) {
            thread::sleep(remaining);
        }
    }

    debug!("Input worker exiting");
}

impl<R: Rasterizer> Shared<R> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn dispatch(&self, event: PointerEvent, generation: u64) {
        match event.action {
            PointerAction::Down | PointerAction::Up => {
                self.process(event, generation)
            }
            PointerAction::Move => {
                let (px, py) = {
                    let gesture = self.gesture.lock();
                    (gesture.x, gesture.y)
                };
                let dx = event.x - px;
                let dy = event.y - py;
                let n = MOVE_SUBDIVISIONS as f32;

                for i in 1..=MOVE_SUBDIVISIONS {
                    let t = i as f32 / n;
                    self.process(event.at(px + dx * t, py + dy * t), generation);
                }
            }
        }
    }

    fn process(&self, event: PointerEvent, generation: u64) {
        let snapshot = {
            let mut gesture = self.gesture.lock();
            gesture.x = event.x;
            gesture.y = event.y;

            match event.action {
                PointerAction::Down => {
                    gesture.touched = true;
                    gesture.moving = false;
                    gesture.smoother.reset_to(event.x, event.y);
                }
                PointerAction::Up => {
                    gesture.touched = false;
                    gesture.moving = false;
                    gesture.smoother.reset_to(event.x, event.y);
                }
                PointerAction::Move => {
                    gesture.touched = true;
                    gesture.moving = true;
                    gesture.smoother.move_to(event.x, event.y);
                }
            }

            *gesture
        };

        self.notify(event.action, &snapshot, generation);

        let mut gesture = self.gesture.lock();
        gesture.previous_x = snapshot.x;
        gesture.previous_y = snapshot.y;
    }

    // The listener is taken out of its slot while callbacks run so a callback
    // may attach or detach without deadlocking.
    fn notify(&self, action: PointerAction, gesture: &Gesture, generation: u64) {
        let Some(mut listener) = self.listener.lock().take() else {
            return;
        };

        match action {
            PointerAction::Down => listener.on_touch(gesture, &self.surface),
            PointerAction::Up => listener.on_release(gesture, &self.surface),
            PointerAction::Move => listener.on_drag(gesture, &self.surface),
        }
        listener.on_motion(gesture, &self.surface);

        if self.is_current(generation) {
            let mut slot = self.listener.lock();
            if slot.is_none() {
                *slot = Some(listener);
            }
        }
    }
}
