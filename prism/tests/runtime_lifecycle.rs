mod support;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prism::prelude::*;
use serial_test::serial;

use support::{
    Hook, RecordingRasterizer, RecordingSketch, fast_config,
    hooks_without_steps, wait_until,
};

type Controller = SketchController<RecordingRasterizer>;

const WAIT: Duration = Duration::from_secs(5);

fn controller(sketch: RecordingSketch, config: EngineConfig) -> Controller {
    SketchController::new(sketch, FixedHost(64, 48), config).unwrap()
}

fn passes(controller: &Controller) -> u64 {
    controller.surface().with_canvas(|c| c.passes()).unwrap_or(0)
}

#[derive(Clone)]
struct ResizableHost(Arc<Mutex<(u32, u32)>>);

impl HostSurface for ResizableHost {
    fn size(&self) -> (u32, u32) {
        *self.0.lock()
    }
}

#[test]
fn lifecycle_calls_before_setup_are_ignored() {
    let (sketch, log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());

    controller.start();
    controller.resume();
    controller.pause();
    controller.stop();

    assert_eq!(controller.state(), SketchState::Uninitialized);
    assert!(log.lock().is_empty());
    assert!(controller.size().is_none());
}

#[test]
#[serial]
fn full_lifecycle_runs_hooks_in_order() {
    let (sketch, log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());

    controller.setup().unwrap();
    assert_eq!(controller.state(), SketchState::Ready);
    assert_eq!(controller.size(), Some(SurfaceSize { w: 64, h: 48 }));

    controller.start();
    assert_eq!(controller.state(), SketchState::Running);
    assert!(wait_until(WAIT, || controller.step_count() >= 3));

    controller.pause();
    assert_eq!(controller.state(), SketchState::Suspended);

    controller.resume();
    assert_eq!(controller.state(), SketchState::Running);

    controller.stop();
    assert_eq!(controller.state(), SketchState::Ready);

    assert_eq!(
        hooks_without_steps(&log),
        vec![
            Hook::Setup,
            Hook::Start,
            Hook::Resume,
            Hook::Pause,
            Hook::Resume,
            Hook::Pause,
            Hook::Stop,
        ]
    );
}

#[test]
#[serial]
fn steps_only_advance_while_running() {
    let (sketch, log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());

    controller.setup().unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(controller.step_count(), 0);

    controller.start();
    assert!(wait_until(WAIT, || controller.step_count() >= 2));
    controller.pause();

    let paused_at = controller.step_count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.step_count(), paused_at);

    let steps: Vec<u64> = log
        .lock()
        .iter()
        .filter_map(|hook| match hook {
            Hook::Step(n) => Some(*n),
            _ => None,
        })
        .collect();
    let expected: Vec<u64> = (1..=paused_at).collect();
    assert_eq!(steps, expected);
}

#[test]
#[serial]
fn pause_lets_a_short_in_flight_step_finish() {
    let (mut sketch, log) = RecordingSketch::new();
    sketch.step_delay = Some(Duration::from_millis(80));
    let controller = controller(sketch, fast_config());

    controller.setup().unwrap();
    controller.start();
    assert!(wait_until(WAIT, || controller.step_count() >= 1));

    controller.pause();

    let log = log.lock();
    assert_eq!(log.last(), Some(&Hook::Pause));
    assert!(log.iter().any(|hook| matches!(hook, Hook::Step(_))));
}

fn stuck_step_config() -> EngineConfig {
    EngineConfig {
        shutdown_timeout_ms: 50,
        ..fast_config()
    }
}

#[test]
#[serial]
fn pause_is_bounded_while_a_step_is_still_running() {
    let (mut sketch, log) = RecordingSketch::new();
    sketch.step_delay = Some(Duration::from_millis(1_500));
    let (tx, rx) = event_channel();
    let controller = controller(sketch, stuck_step_config()).with_events(tx);

    controller.setup().unwrap();
    controller.start();
    assert!(wait_until(WAIT, || controller.step_count() >= 1));

    let started = Instant::now();
    controller.pause();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(500), "pause took {elapsed:?}");
    assert_eq!(controller.state(), SketchState::Suspended);

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    assert!(events.contains(&EngineEvent::ShutdownTimedOut {
        clock: ClockKind::Step
    }));
    assert!(events.contains(&EngineEvent::HookSkipped { hook: "pause" }));
    assert!(events.contains(&EngineEvent::Paused));
    assert!(!log.lock().contains(&Hook::Pause));
}

#[test]
#[serial]
fn destroy_is_bounded_while_a_step_is_still_running() {
    let (mut sketch, log) = RecordingSketch::new();
    sketch.step_delay = Some(Duration::from_millis(1_500));
    let controller = controller(sketch, stuck_step_config());

    controller.setup().unwrap();
    controller.start();
    assert!(wait_until(WAIT, || controller.step_count() >= 1));

    let surface = controller.surface();
    let started = Instant::now();
    drop(controller);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(800), "destroy took {elapsed:?}");

    // The surface goes once the stuck step returns.
    assert!(wait_until(WAIT, || !surface.is_allocated()));
    assert!(
        !log.lock()
            .iter()
            .any(|hook| matches!(hook, Hook::Destroy { .. }))
    );
}

#[test]
#[serial]
fn start_after_a_timed_out_pause_waits_for_the_clocks_to_exit() {
    let (mut sketch, log) = RecordingSketch::new();
    sketch.step_delay = Some(Duration::from_millis(400));
    let (tx, rx) = event_channel();
    let controller = controller(sketch, stuck_step_config()).with_events(tx);

    controller.setup().unwrap();
    controller.start();
    assert!(wait_until(WAIT, || controller.step_count() >= 1));

    controller.pause();
    assert_eq!(controller.state(), SketchState::Suspended);
    let _ = rx.try_iter().count();

    // The detached step clock is still inside its tick.
    controller.start();
    assert_eq!(controller.state(), SketchState::Suspended);
    assert!(rx.try_iter().next().is_none());

    assert!(wait_until(WAIT, || {
        controller.start();
        controller.state() == SketchState::Running
    }));

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    assert_eq!(events, vec![EngineEvent::Started, EngineEvent::Resumed]);
    assert!(wait_until(WAIT, || {
        log.lock().iter().filter(|h| **h == Hook::Start).count() == 2
    }));
}

#[test]
fn destroy_is_terminal() {
    let (sketch, log) = RecordingSketch::new();
    let (tx, rx) = event_channel();
    let controller = controller(sketch, fast_config()).with_events(tx);

    controller.setup().unwrap();
    controller.start();
    controller.destroy();

    assert_eq!(controller.state(), SketchState::Destroyed);
    assert!(!controller.surface().is_allocated());

    controller.setup().unwrap();
    controller.start();
    controller.resume();
    controller.destroy();
    controller.on_surface_ready();
    assert_eq!(controller.state(), SketchState::Destroyed);

    assert_eq!(
        hooks_without_steps(&log),
        vec![
            Hook::Setup,
            Hook::Start,
            Hook::Resume,
            Hook::Pause,
            Hook::Stop,
            Hook::Destroy { had_canvas: true },
        ]
    );

    let destroyed = rx
        .try_iter()
        .filter(|event| *event == EngineEvent::Destroyed)
        .count();
    assert_eq!(destroyed, 1);
}

#[test]
fn destroy_before_setup_has_no_canvas() {
    let (sketch, log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());

    controller.destroy();

    assert_eq!(*log.lock(), vec![Hook::Destroy { had_canvas: false }]);
}

#[test]
fn dropping_the_controller_destroys_it() {
    let (sketch, log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());
    controller.setup().unwrap();
    controller.start();

    drop(controller);

    assert_eq!(
        log.lock().last(),
        Some(&Hook::Destroy { had_canvas: true })
    );
}

#[test]
#[serial]
fn surface_ready_sets_up_and_starts_in_background() {
    let (sketch, log) = RecordingSketch::new();
    let (tx, rx) = event_channel();
    let controller = SketchController::new(
        sketch,
        FixedHost(64, 48),
        EngineConfig {
            scale: 0.5,
            ..fast_config()
        },
    )
    .unwrap()
    .with_events(tx);

    controller.on_surface_ready();

    assert!(wait_until(WAIT, || controller.state() == SketchState::Running));
    assert_eq!(controller.size(), Some(SurfaceSize { w: 32, h: 24 }));
    assert_eq!(
        controller
            .surface()
            .with_canvas(|c| c.raster().size)
            .flatten(),
        Some(SurfaceSize { w: 32, h: 24 })
    );

    let events: Vec<EngineEvent> = rx.try_iter().take(3).collect();
    assert_eq!(
        events,
        vec![
            EngineEvent::SetupComplete { w: 32, h: 24 },
            EngineEvent::Started,
            EngineEvent::Resumed,
        ]
    );
    assert_eq!(
        hooks_without_steps(&log),
        vec![Hook::Setup, Hook::Start, Hook::Resume]
    );
}

#[test]
fn empty_host_defers_setup() {
    let (sketch, log) = RecordingSketch::new();
    let (tx, rx) = event_channel();
    let controller =
        SketchController::new(sketch, FixedHost(0, 48), fast_config())
            .unwrap()
            .with_events(tx);

    let err = controller.setup().unwrap_err();
    assert!(matches!(err, EngineError::InvalidSurfaceSize { .. }));
    assert_eq!(controller.state(), SketchState::Uninitialized);
    assert!(log.lock().is_empty());
    assert!(matches!(rx.try_recv(), Ok(EngineEvent::SetupFailed(_))));

    controller.on_surface_ready();
    assert!(matches!(
        rx.recv_timeout(WAIT),
        Ok(EngineEvent::SetupFailed(_))
    ));
    assert_eq!(controller.state(), SketchState::Uninitialized);
}

#[test]
fn setup_is_retryable_once_the_host_is_sized() {
    let size = Arc::new(Mutex::new((0, 0)));
    let (sketch, log) = RecordingSketch::new();
    let controller = SketchController::new(
        sketch,
        ResizableHost(size.clone()),
        fast_config(),
    )
    .unwrap();

    assert!(controller.setup().is_err());

    *size.lock() = (20, 10);
    controller.setup().unwrap();

    assert_eq!(controller.state(), SketchState::Ready);
    assert_eq!(controller.size(), Some(SurfaceSize { w: 20, h: 10 }));
    assert_eq!(*log.lock(), vec![Hook::Setup]);
}

#[test]
fn surface_ready_after_setup_redraws_once() {
    let (sketch, _log) = RecordingSketch::new();
    let controller = controller(sketch, fast_config());

    controller.setup().unwrap();
    assert_eq!(passes(&controller), 1);

    controller.on_surface_ready();

    assert_eq!(passes(&controller), 2);
    assert_eq!(controller.state(), SketchState::Ready);
}

#[test]
fn reset_resizes_the_canvas() {
    let size = Arc::new(Mutex::new((40, 30)));
    let (sketch, _log) = RecordingSketch::new();
    let controller = SketchController::new(
        sketch,
        ResizableHost(size.clone()),
        fast_config(),
    )
    .unwrap();

    controller.reset().unwrap();
    assert!(controller.size().is_none());

    controller.setup().unwrap();
    *size.lock() = (80, 60);
    controller.reset().unwrap();

    assert_eq!(controller.size(), Some(SurfaceSize { w: 80, h: 60 }));
    assert_eq!(
        controller
            .surface()
            .with_canvas(|c| c.raster().size)
            .flatten(),
        Some(SurfaceSize { w: 80, h: 60 })
    );

    *size.lock() = (0, 60);
    assert!(controller.reset().is_err());
    assert_eq!(controller.size(), Some(SurfaceSize { w: 80, h: 60 }));
}

#[test]
#[serial]
fn vsync_leaves_redraws_to_the_step_clock() {
    let (sketch, _log) = RecordingSketch::new();
    let controller = controller(
        sketch,
        EngineConfig {
            step_rate: 1,
            frame_rate: 200,
            ..fast_config()
        },
    );

    controller.setup().unwrap();
    controller.start();
    thread::sleep(Duration::from_millis(150));
    controller.pause();

    assert_eq!(controller.step_count(), 0);
    assert_eq!(passes(&controller), 1);
}

#[test]
#[serial]
fn without_vsync_the_frame_clock_redraws_directly() {
    let (sketch, _log) = RecordingSketch::new();
    let controller = controller(
        sketch,
        EngineConfig {
            step_rate: 1,
            frame_rate: 200,
            vsync: false,
            ..fast_config()
        },
    );
    assert!(!controller.is_vsync());

    controller.setup().unwrap();
    controller.start();
    assert!(wait_until(WAIT, || passes(&controller) >= 5));
    controller.stop();

    let raster = controller
        .surface()
        .with_canvas(|c| (c.raster().begun, c.raster().ended, c.raster().nested_passes))
        .unwrap();
    assert_eq!(raster.0, raster.1);
    assert_eq!(raster.2, 0);
}

#[test]
#[serial]
fn panicking_step_is_reported_and_the_clock_keeps_running() {
    let (mut sketch, _log) = RecordingSketch::new();
    sketch.panic_on_step = true;
    let (tx, rx) = event_channel();
    let controller = controller(sketch, fast_config()).with_events(tx);

    controller.setup().unwrap();
    controller.start();

    let failures = Arc::new(Mutex::new(0));
    let counted = failures.clone();
    assert!(wait_until(WAIT, || {
        for event in rx.try_iter() {
            if event == (EngineEvent::TickFailed { clock: ClockKind::Step }) {
                *counted.lock() += 1;
            }
        }
        *counted.lock() >= 2
    }));

    assert_eq!(controller.state(), SketchState::Running);
    controller.stop();
    assert_eq!(controller.state(), SketchState::Ready);
}

#[test]
#[serial]
fn rate_change_while_running_takes_effect() {
    let (sketch, _log) = RecordingSketch::new();
    let controller = controller(
        sketch,
        EngineConfig {
            step_rate: 1,
            ..fast_config()
        },
    );

    controller.setup().unwrap();
    controller.start();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.step_count(), 0);

    controller.set_rate(Rate::Step, 200).unwrap();

    assert_eq!(controller.state(), SketchState::Running);
    assert!(wait_until(WAIT, || controller.step_count() >= 5));
}
