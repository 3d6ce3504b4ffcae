//! End-to-end scenarios: literal slider inputs in, readout text out.
//!
//! Every scenario mounts a library sample into a headless host and drives
//! it through the shell exactly like a browser page would.

use rtviz::samples::{binomial, blackbody, geometric, orbit, rc, sir};
use rtviz::surface::{DrawCommand, Paint};
use rtviz::{CanvasSize, Color, DriverState, HeadlessHost, Sample, SampleShell, Surface};

const FRAME: f64 = 0.05;

fn host_for(sample: &Sample) -> HeadlessHost {
    let mut host = HeadlessHost::new();
    for scene in &sample.schema.layout.scenes {
        host.add_canvas(&scene.canvas_id, CanvasSize::new(600.0, 400.0, 2.0));
    }
    for plot in &sample.schema.layout.plots {
        host.add_canvas(&plot.canvas_id, CanvasSize::new(480.0, 280.0, 2.0));
    }
    match &sample.schema.layout.readout {
        Some(readout) => host.with_readout(&readout.container),
        None => host,
    }
}

fn mount(sample: Sample) -> (SampleShell, HeadlessHost) {
    let host = host_for(&sample);
    let shell = SampleShell::mount(sample).unwrap();
    (shell, host)
}

/// Leading number of a formatted readout value.
fn number(text: &str) -> f64 {
    text.split_whitespace().next().unwrap().parse().unwrap()
}

/// Fill rects drawn while `color` was the active fill.
fn rects_filled_with(commands: &[DrawCommand], color: Color) -> Vec<(f64, f64, f64, f64)> {
    let mut fill = None;
    let mut out = Vec::new();
    for cmd in commands {
        match cmd {
            DrawCommand::Fill(Paint::Solid(c)) => fill = Some(*c),
            DrawCommand::Fill(_) => fill = None,
            DrawCommand::FillRect { x, y, w, h } if fill == Some(color) => out.push((*x, *y, *w, *h)),
            _ => {}
        }
    }
    out
}

// ============================================================================
// RC low-pass step
// ============================================================================

#[test]
fn test_rc_step_response() {
    let (mut shell, mut host) = mount(rc::sample());

    shell.frame(0.0, &mut host);
    assert_eq!(shell.driver().snapshot().scalar("ic"), Some(0.005));
    let readout = host.text(rc::READOUT).unwrap();
    assert_eq!(readout.value("Ic"), Some("5.0 mA"));

    // time scale is 5τ per 10 s, so 2 s of frames reach t = τ
    for i in 1..=40 {
        shell.frame(i as f64 * FRAME, &mut host);
    }
    assert!((shell.driver().sim_time() - 0.1).abs() < 1e-9);
    let vc = number(host.text(rc::READOUT).unwrap().value("Vc").unwrap());
    assert!((vc - 3.16).abs() / 3.16 < 0.01, "Vc = {vc}");

    for i in 41..=200 {
        shell.frame(i as f64 * FRAME, &mut host);
    }
    assert!((shell.driver().sim_time() - 0.5).abs() < 1e-9);
    let vc = number(host.text(rc::READOUT).unwrap().value("Vc").unwrap());
    assert!((vc - 4.97).abs() < 0.05, "Vc = {vc}");
}

#[test]
fn test_rc_hot_swap_is_continuous() {
    let (mut shell, mut host) = mount(rc::sample());
    for i in 0..=40 {
        shell.frame(i as f64 * FRAME, &mut host);
    }
    let before = shell.driver().snapshot().scalar("vc").unwrap();

    // edits while paused redraw at the new origin without advancing
    shell.pause();
    shell.set_param("Vin", 10.0).unwrap();
    shell.frame(41.0 * FRAME, &mut host);
    assert_eq!(shell.driver().sim_time(), 0.0);
    let after = shell.driver().snapshot().scalar("vc").unwrap();
    assert!((after - before).abs() < 1e-12, "jump from {before} to {after}");
    assert!(shell.driver().history().get("vc").unwrap().len() <= 1);

    // the first frame after resuming only re-arms the clock
    shell.play();
    shell.frame(42.0 * FRAME, &mut host);
    shell.frame(43.0 * FRAME, &mut host);
    let next = shell.driver().snapshot().scalar("vc").unwrap();
    let expected = rc::RcLowPass::voltage(10.0, before, 0.1, shell.driver().sim_time());
    assert!((next - expected).abs() < 1e-9);
    assert!(next > before);
}

// ============================================================================
// SIR epidemic
// ============================================================================

#[test]
fn test_sir_epidemic_runs_to_completion() {
    let (mut shell, mut host) = mount(sir::sample());
    shell.frame(0.0, &mut host);
    assert_eq!(host.text(sir::READOUT).unwrap().value("R₀"), Some("5.00"));

    let mut i = 1;
    while shell.state() == DriverState::Running && i < 20_000 {
        shell.frame(i as f64 * FRAME, &mut host);
        i += 1;
    }
    assert_eq!(shell.state(), DriverState::Finished);
    assert!(shell.diagnostic().is_none());

    let snap = shell.driver().snapshot();
    let (s, inf, r) = (
        snap.scalar("s").unwrap(),
        snap.scalar("i").unwrap(),
        snap.scalar("r").unwrap(),
    );
    assert!(inf < 0.5);
    assert!((s + inf + r - 2000.0).abs() <= 1.0);
    assert!(r > 1800.0, "final R = {r}");
    assert_eq!(snap.scene.particle_targets.values().sum::<usize>(), sir::CROWD);
}

#[test]
fn test_sir_edit_restarts_epidemic() {
    let (mut shell, mut host) = mount(sir::sample());
    for i in 0..100 {
        shell.frame(i as f64 * FRAME, &mut host);
    }
    let epoch = shell.driver().epoch();
    shell.set_param("beta", 0.6).unwrap();
    shell.frame(100.0 * FRAME, &mut host);

    assert_eq!(shell.driver().epoch(), epoch + 1);
    assert_eq!(host.text(sir::READOUT).unwrap().value("R₀"), Some("2.00"));
    let snap = shell.driver().snapshot();
    assert!((snap.scalar("i").unwrap() - 10.0).abs() < 1.0);
}

// ============================================================================
// Binomial PMF
// ============================================================================

#[test]
fn test_binomial_pmf_readout_and_highlight() {
    let (mut shell, mut host) = mount(binomial::sample());
    shell.frame(0.0, &mut host);

    assert_eq!(
        host.text(binomial::READOUT).unwrap().value("P(X = k)"),
        Some("0.24609375")
    );

    let commands = host.canvas(binomial::PLOT).unwrap().commands();
    let highlighted = rects_filled_with(commands, Color::AMBER);
    let others = rects_filled_with(commands, Color::CYAN);
    assert_eq!(highlighted.len(), 1);
    assert_eq!(others.len(), 10);
    let tallest = highlighted[0].3;
    assert!(others.iter().all(|r| r.3 < tallest));
}

#[test]
fn test_binomial_invalid_k_reported_inline() {
    let (mut shell, mut host) = mount(binomial::sample());
    shell.frame(0.0, &mut host);
    shell.set_param("k", 15.0).unwrap();
    shell.frame(FRAME, &mut host);

    let readout = host.text(binomial::READOUT).unwrap();
    assert_eq!(readout.messages().len(), 1);
    assert!(readout.lines().iter().all(|l| l.dimmed));
    // last valid value stays on screen
    assert!(shell.driver().last_valid().is_some());

    shell.set_param("k", 5.0).unwrap();
    shell.frame(2.0 * FRAME, &mut host);
    assert!(host.text(binomial::READOUT).unwrap().messages().is_empty());
}

// ============================================================================
// Circular orbit
// ============================================================================

#[test]
fn test_orbit_speed_and_period() {
    let (mut shell, mut host) = mount(orbit::sample());
    shell.frame(0.0, &mut host);

    let readout = host.text(orbit::READOUT).unwrap();
    let v = number(readout.value("Orbital speed").unwrap());
    let period = number(readout.value("Period").unwrap());
    assert!((v - 7668.0).abs() <= 2.0, "v = {v}");
    assert!((period - 5556.0).abs() <= 3.0, "T = {period}");
    assert_eq!(readout.value("Orbital speed"), Some("7668 m/s"));
}

// ============================================================================
// Black-body peak
// ============================================================================

#[test]
fn test_blackbody_peak_in_visible_band() {
    let (mut shell, mut host) = mount(blackbody::sample());
    shell.frame(0.0, &mut host);

    let readout = host.text(blackbody::READOUT).unwrap();
    assert_eq!(readout.value("λ peak"), Some("500 nm"));
    let region = readout.line("Region").unwrap();
    assert_eq!(region.value, "Visible Light");
    assert_eq!(region.color, Some(Color::GREEN));

    shell.set_param("T", 2000.0).unwrap();
    shell.frame(FRAME, &mut host);
    assert_eq!(
        host.text(blackbody::READOUT).unwrap().value("Region"),
        Some("Infrared")
    );
}

// ============================================================================
// Geometric series
// ============================================================================

#[test]
fn test_geometric_series_sum() {
    let (mut shell, mut host) = mount(geometric::sample());
    shell.frame(0.0, &mut host);

    let readout = host.text(geometric::READOUT).unwrap();
    assert_eq!(readout.value("Partial sum"), Some("1.998046875"));
    assert_eq!(readout.value("Infinite sum"), Some("2.0"));

    shell.set_param("r", 1.2).unwrap();
    shell.frame(FRAME, &mut host);
    assert_eq!(
        host.text(geometric::READOUT).unwrap().value("Infinite sum"),
        Some("diverges")
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_every_sample_survives_resize_and_teardown() {
    for sample in rtviz::samples::all() {
        let (mut shell, mut host) = mount(sample);
        for i in 0..5 {
            shell.frame(i as f64 * FRAME, &mut host);
        }
        let targets: Vec<String> = shell
            .schema()
            .layout
            .scenes
            .iter()
            .map(|s| s.canvas_id.clone())
            .chain(shell.schema().layout.plots.iter().map(|p| p.canvas_id.clone()))
            .collect();
        for id in &targets {
            shell.resize(id, CanvasSize::new(320.0, 200.0, 1.0), &mut host).unwrap();
            assert_eq!(host.canvas(id).unwrap().size().css_width, 320.0);
        }
        assert!(shell.diagnostic().is_none(), "{}: {:?}", shell.id(), shell.diagnostic());

        shell.teardown(&mut host);
        assert!(shell.driver().is_torn_down());
        for id in &targets {
            assert_eq!(host.canvas(id).unwrap().depth(), 0);
        }
    }
}
