use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender};

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockKind {
    Step,
    Redraw,
}

impl ClockKind {
    pub fn thread_name(self) -> &'static str {
        match self {
            Self::Step => "prism-step",
            Self::Redraw => "prism-redraw",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    SetupComplete { w: u32, h: u32 },
    SetupFailed(String),
    Started,
    Resumed,
    Paused,
    Stopped,
    Destroyed,
    TickFailed { clock: ClockKind },
    ShutdownTimedOut { clock: ClockKind },
    /// A lifecycle hook was skipped because a step still held the sketch.
    HookSkipped { hook: &'static str },
}

pub type EngineEventSender = Sender<EngineEvent>;
pub type EngineEventReceiver = Receiver<EngineEvent>;

pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::channel()
}

/// Optional observer; sends to a dropped receiver are ignored.
#[derive(Default)]
pub(crate) struct EventSink(Mutex<Option<EngineEventSender>>);

impl EventSink {
    pub fn set(&self, sender: EngineEventSender) {
        *self.0.lock() = Some(sender);
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(sender) = self.0.lock().as_ref() {
            let _ = sender.send(event);
        }
    }
}
