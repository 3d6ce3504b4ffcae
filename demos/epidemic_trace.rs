//! # Epidemic Trace
//!
//! Runs the SIR sample until the epidemic dies out and prints the
//! compartments once per simulated week, then the particle split of the
//! crowd scene.
//!
//! Pass a transmission rate on the command line to override β.
//!
//! Run with: `cargo run --example epidemic_trace -- 0.9`

use rtviz::prelude::*;
use rtviz::samples::sir;
use tracing_subscriber::EnvFilter;

const FRAME: f64 = 1.0 / 30.0;

fn main() -> Result<(), rtviz::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let beta: Option<f64> = std::env::args().nth(1).and_then(|s| s.parse().ok());

    let mut host = HeadlessHost::new()
        .with_canvas(sir::SCENE, CanvasSize::new(600.0, 400.0, 1.0))
        .with_canvas(sir::PLOT, CanvasSize::new(480.0, 280.0, 1.0))
        .with_readout(sir::READOUT);
    let mut shell = SampleShell::mount(sir::sample())?;
    if let Some(beta) = beta {
        shell.set_param("beta", beta)?;
    }

    println!("=== {} ===", shell.title());
    println!("{:>6} {:>8} {:>8} {:>8}", "day", "S", "I", "R");

    let mut next_week = 0.0;
    let mut frame = 0u64;
    while shell.frame(frame as f64 * FRAME, &mut host) == DriverState::Running {
        let snap = shell.driver().snapshot();
        let day = snap.scalar("day").unwrap_or(f64::NAN);
        if day >= next_week {
            println!(
                "{:>6.0} {:>8.0} {:>8.0} {:>8.0}",
                day,
                snap.scalar("s").unwrap_or(f64::NAN),
                snap.scalar("i").unwrap_or(f64::NAN),
                snap.scalar("r").unwrap_or(f64::NAN),
            );
            next_week += 7.0;
        }
        host.clear_commands();
        frame += 1;
    }

    if let Some(diagnostic) = shell.diagnostic() {
        eprintln!("stopped: {diagnostic}");
    }

    println!();
    if let Some(readout) = host.text(sir::READOUT) {
        print!("{}", readout.to_text());
    }
    let targets = &shell.driver().snapshot().scene.particle_targets;
    for (class, count) in targets {
        println!("{class}: {count} of {} particles", sir::CROWD);
    }

    shell.teardown(&mut host);
    Ok(())
}
