use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use prism::prelude::*;

mod ink;
mod raster;

use raster::LogRasterizer;

/// Runs the ink sketch headlessly against a scripted pointer stream.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML engine config; defaults apply to anything left out
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    step_rate: Option<u32>,

    #[arg(long)]
    frame_rate: Option<u32>,

    /// How long to run before destroying the sketch
    #[arg(long, default_value_t = 3.0)]
    seconds: f32,
}

fn main() {
    init_logger();

    let args = Args::parse();

    if let Err(err) = run(&args) {
        error!("sketches failed: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> EngineResult<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig {
            step_rate: ink::SKETCH_CONFIG.step_rate,
            frame_rate: ink::SKETCH_CONFIG.frame_rate,
            ..EngineConfig::default()
        },
    };
    if let Some(rate) = args.step_rate {
        config.step_rate = rate;
    }
    if let Some(rate) = args.frame_rate {
        config.frame_rate = rate;
    }
    config.validate()?;

    info!(
        "Running {} ({}) at {} steps/s, {} frames/s",
        ink::SKETCH_CONFIG.display_name,
        ink::SKETCH_CONFIG.name,
        config.step_rate,
        config.frame_rate
    );

    let (sketch, brush) = ink::init();
    let host = FixedHost(ink::SKETCH_CONFIG.w, ink::SKETCH_CONFIG.h);
    let (event_tx, event_rx) = event_channel();

    let controller: SketchController<LogRasterizer> =
        SketchController::new(sketch, host, config)?.with_events(event_tx);
    controller.input().attach(brush)?;
    controller.on_surface_ready();

    let duration = Duration::from_secs_f32(args.seconds.max(0.0));
    let started = Instant::now();
    let mut paused_once = false;

    controller.input().post_event(pointer_at(0.0, PointerAction::Down));

    while started.elapsed() < duration {
        let t = started.elapsed().as_secs_f32();
        controller.input().post_event(pointer_at(t, PointerAction::Move));

        if !paused_once && t > args.seconds / 2.0 {
            paused_once = true;
            controller.pause();
            thread::sleep(Duration::from_millis(100));
            controller.resume();
        }

        for event in event_rx.try_iter() {
            log_event(&event);
        }

        thread::sleep(Duration::from_millis(8));
    }

    let t = started.elapsed().as_secs_f32();
    controller.input().post_event(pointer_at(t, PointerAction::Up));

    controller.destroy();
    for event in event_rx.try_iter() {
        log_event(&event);
    }

    info!("Ran {} steps", controller.step_count());
    Ok(())
}

/// A point on a slow Lissajous figure across the sketch surface.
fn pointer_at(t: f32, action: PointerAction) -> PointerEvent {
    let w = ink::SKETCH_CONFIG.w as f32;
    let h = ink::SKETCH_CONFIG.h as f32;
    let x = w / 2.0 + (t * 1.3).sin() * w * 0.4;
    let y = h / 2.0 + (t * 2.1).cos() * h * 0.4;

    match action {
        PointerAction::Down => PointerEvent::down(x, y),
        PointerAction::Move => PointerEvent::moved(x, y),
        PointerAction::Up => PointerEvent::up(x, y),
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::SetupFailed(reason) => warn!("Setup failed: {}", reason),
        EngineEvent::TickFailed { clock } => warn!("{:?} tick failed", clock),
        EngineEvent::ShutdownTimedOut { clock } => {
            warn!("{:?} clock did not stop in time", clock)
        }
        EngineEvent::HookSkipped { hook } => {
            warn!("{} hook skipped; sketch was busy", hook)
        }
        other => debug!("{:?}", other),
    }
}
