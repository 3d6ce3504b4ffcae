//! # Headless RC Step Response
//!
//! Mounts the RC low-pass sample without a window, plays it at 20 frames per
//! second and prints the readout once per time constant. Halfway through,
//! the input voltage is raised to show the hot-swap keeping `Vc` continuous.
//!
//! Run with: `RUST_LOG=rtviz=debug cargo run --example headless_rc`

use rtviz::prelude::*;
use rtviz::samples::rc;
use tracing_subscriber::EnvFilter;

const FRAME: f64 = 0.05;

fn main() -> Result<(), rtviz::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut host = HeadlessHost::new()
        .with_canvas(rc::SCENE, CanvasSize::new(600.0, 400.0, 2.0))
        .with_canvas(rc::PLOT, CanvasSize::new(480.0, 280.0, 2.0))
        .with_readout(rc::READOUT);
    let mut shell = SampleShell::mount(rc::sample())?;

    println!("=== {} ===", shell.title());
    for name in ["Vin", "R", "C"] {
        println!("{name} = {}", shell.display(name)?);
    }
    println!();

    // one time constant is 40 frames at the default time scale
    for i in 0..=400 {
        if i == 200 {
            shell.set_param("Vin", 10.0)?;
            println!("--- Vin raised to {} ---", shell.display("Vin")?);
        }
        shell.frame(i as f64 * FRAME, &mut host);
        if i % 40 == 0 {
            if let Some(readout) = host.text(rc::READOUT) {
                println!("t = {:.3} s", shell.driver().sim_time());
                print!("{}", readout.to_text());
                println!();
            }
        }
        host.clear_commands();
    }

    shell.teardown(&mut host);
    Ok(())
}
