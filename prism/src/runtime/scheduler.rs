use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

use super::config::period_for;
use super::error::{EngineError, EngineResult};
use super::events::ClockKind;

pub(crate) type FailureHook = Arc<dyn Fn(ClockKind) + Send + Sync>;

/// Fixed-rate deadline tracking for a single clock. The first tick is due one
/// period after `start`. A clock that falls behind fires once immediately and
/// then continues from "now" rather than bursting through missed ticks.
#[derive(Debug)]
pub(crate) struct Pacer {
    period: Duration,
    next: Instant,
    missed: u64,
}

impl Pacer {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
            missed: 0,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Call after a tick fired at `now`.
    pub fn advance(&mut self, now: Instant) {
        self.next += self.period;

        if self.next < now {
            let behind = now.saturating_duration_since(self.next);
            self.missed +=
                (behind.as_nanos() / self.period.as_nanos().max(1)) as u64 + 1;
            self.next = now;
        }
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }
}

/// A recurring tick on its own named thread. Panics raised by the tick are
/// caught and logged so a failing tick never kills the clock.
pub struct FixedRateClock {
    kind: ClockKind,
    cancel_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl FixedRateClock {
    pub(crate) fn spawn<F>(
        kind: ClockKind,
        rate: u32,
        mut tick: F,
        on_failure: FailureHook,
    ) -> EngineResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let period = period_for(rate);

        let handle = thread::Builder::new()
            .name(kind.thread_name().to_string())
            .spawn(move || {
                // Dropped on exit, which is what `await_termination` observes.
                let _done_tx = done_tx;
                let mut pacer = Pacer::new(period, Instant::now());

                loop {
                    let wait = pacer
                        .next_deadline()
                        .saturating_duration_since(Instant::now());

                    match cancel_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let result =
                        panic::catch_unwind(AssertUnwindSafe(&mut tick));

                    if let Err(payload) = result {
                        error!(
                            "{:?} tick panicked: {}",
                            kind,
                            panic_message(payload.as_ref())
                        );
                        on_failure(kind);
                    }

                    pacer.advance(Instant::now());
                }

                debug!(
                    "{:?} clock exiting; {} ticks missed",
                    kind,
                    pacer.missed()
                );
            })
            .map_err(|source| EngineError::Spawn {
                name: kind.thread_name().to_string(),
                source,
            })?;

        debug!("{:?} clock started at {} Hz", kind, rate);

        Ok(Self {
            kind,
            cancel_tx: Some(cancel_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    pub fn kind(&self) -> ClockKind {
        self.kind
    }

    /// Stops future ticks. A tick already executing runs to completion.
    pub fn cancel(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }

    /// Waits up to `timeout` for the worker to exit. Returns false on timeout,
    /// in which case the worker is detached.
    pub fn await_termination(&mut self, timeout: Duration) -> bool {
        let on_own_thread = self
            .handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id());

        if on_own_thread {
            trace!("{:?} clock awaited from its own thread", self.kind);
            self.handle.take();
            return false;
        }

        let terminated = match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        if let Some(handle) = self.handle.take() {
            if terminated {
                let _ = handle.join();
            }
        }

        terminated
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.done_rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Coalesces any number of redraw requests into one pending redraw.
#[derive(Debug, Default)]
pub struct RedrawFlag(AtomicBool);

impl RedrawFlag {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the flag, returning whether a redraw was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owns the simulation-step clock and the screen-update clock.
pub struct DualClockScheduler {
    step: Option<FixedRateClock>,
    redraw: Option<FixedRateClock>,
    // Clocks whose shutdown wait timed out; kept until their worker exits.
    detached: Vec<FixedRateClock>,
    redraw_pending: Arc<RedrawFlag>,
    shutdown_timeout: Duration,
}

impl DualClockScheduler {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            step: None,
            redraw: None,
            detached: Vec::new(),
            redraw_pending: Arc::new(RedrawFlag::default()),
            shutdown_timeout,
        }
    }

    pub fn redraw_pending(&self) -> Arc<RedrawFlag> {
        self.redraw_pending.clone()
    }

    /// Starts both clocks, replacing any clocks still running.
    pub(crate) fn schedule_at<S, D>(
        &mut self,
        step_rate: u32,
        frame_rate: u32,
        step_tick: S,
        redraw_tick: D,
        on_failure: FailureHook,
    ) -> EngineResult<()>
    where
        S: FnMut() + Send + 'static,
        D: FnMut() + Send + 'static,
    {
        if self.step.is_some() || self.redraw.is_some() {
            self.shutdown();
        }

        let step = FixedRateClock::spawn(
            ClockKind::Step,
            step_rate,
            step_tick,
            on_failure.clone(),
        )?;

        let redraw = match FixedRateClock::spawn(
            ClockKind::Redraw,
            frame_rate,
            redraw_tick,
            on_failure,
        ) {
            Ok(redraw) => redraw,
            Err(err) => {
                self.step = Some(step);
                self.shutdown();
                return Err(err);
            }
        };

        self.step = Some(step);
        self.redraw = Some(redraw);
        Ok(())
    }

    /// Cancels both clocks and waits up to the shutdown timeout for each.
    /// Never fails; returns the clocks that did not stop in time.
    pub fn shutdown(&mut self) -> Vec<ClockKind> {
        let mut clocks: Vec<FixedRateClock> =
            self.step.take().into_iter().chain(self.redraw.take()).collect();

        for clock in &mut clocks {
            clock.cancel();
        }

        let mut timed_out = Vec::new();
        for mut clock in clocks {
            if !clock.await_termination(self.shutdown_timeout) {
                warn!(
                    "{:?} clock did not stop within {:?}; detaching",
                    clock.kind(),
                    self.shutdown_timeout
                );
                timed_out.push(clock.kind());
                self.detached.push(clock);
            }
        }

        self.detached.retain(|clock| !clock.is_terminated());
        timed_out
    }

    /// True only once every clock this scheduler started has fully stopped,
    /// including clocks detached after a timed-out shutdown.
    pub fn is_terminated(&self) -> bool {
        self.step.as_ref().is_none_or(FixedRateClock::is_terminated)
            && self.redraw.as_ref().is_none_or(FixedRateClock::is_terminated)
            && self.detached.iter().all(FixedRateClock::is_terminated)
    }
}

impl Drop for DualClockScheduler {
    fn drop(&mut self) {
        for clock in self.step.iter_mut().chain(self.redraw.iter_mut()) {
            clock.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
