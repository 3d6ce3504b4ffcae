//! Integration tests for the animation driver.
//!
//! These drive small hand-written models through `AnimationDriver` with a
//! headless host and check timing, hot swap, pause and failure handling.

use std::cell::RefCell;
use std::rc::Rc;

use rtviz::driver::ManualScheduler;
use rtviz::model::{ClosedFormModel, IntegratedModel, ModelInfo};
use rtviz::plot::PlotRenderer;
use rtviz::readout::{ReadoutRenderer, Severity};
use rtviz::render::{Frame, Renderer};
use rtviz::surface::DrawCommand;
use rtviz::{
    AnimationDriver, CanvasSize, Color, DriverConfig, DriverState, Error, HeadlessHost, HotSwap, Model,
    ModelDeclaration, ModelState, ParamSpec, ParamValues, ParameterStore, PlotSeries, PlotSpec,
    ReadoutEntry, ReadoutSpec, RenderError, RenderHost, ScalarDecl, SeriesDecl, Snapshot, Timing,
};

// ============================================================================
// Test Models
// ============================================================================

/// `y = k·t`, flagged invalid once `k` exceeds 5.
struct Ramp {
    swap: HotSwap,
}

impl ModelInfo for Ramp {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["k"])
            .scalar(ScalarDecl::new("y"))
            .series(SeriesDecl::new("y"))
    }

    fn hot_swap(&self) -> HotSwap {
        self.swap
    }

    fn timing(&self, _params: &ParamValues) -> Timing {
        Timing::new(1.0, 1.0)
    }

    fn initial_state(&self, _params: &ParamValues) -> ModelState {
        ModelState::new(vec![0.0])
    }
}

impl ClosedFormModel for Ramp {
    fn evaluate(&self, params: &ParamValues, origin: &ModelState, t: f64) -> Snapshot {
        let k = params.get("k");
        if k > 5.0 {
            return Snapshot::empty().invalid("k must not exceed 5");
        }
        let y = origin.get(0) + k * t;
        Snapshot::empty()
            .with_scalar("y", y)
            .with_sample("y", t, y)
            .with_state(ModelState::new(vec![y]))
    }
}

/// Exponential decay integrated with forward Euler; counts its steps.
struct Decay {
    steps: Rc<RefCell<Vec<f64>>>,
}

impl ModelInfo for Decay {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["k"])
            .scalar(ScalarDecl::new("n"))
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }

    fn initial_state(&self, _params: &ParamValues) -> ModelState {
        ModelState::new(vec![1.0])
    }
}

impl IntegratedModel for Decay {
    fn integrate(&self, state: &ModelState, params: &ParamValues, dt: f64) -> ModelState {
        self.steps.borrow_mut().push(dt);
        let n = state.get(0);
        ModelState::new(vec![n - params.get("k") * n * dt])
    }

    fn observe(&self, state: &ModelState, _params: &ParamValues, _t: f64) -> Snapshot {
        Snapshot::empty().with_scalar("n", state.get(0))
    }

    fn max_step(&self) -> Option<f64> {
        Some(0.001)
    }
}

/// Emits a scalar it never declared.
struct Rogue;

impl ModelInfo for Rogue {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new().scalar(ScalarDecl::new("y"))
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for Rogue {
    fn evaluate(&self, _params: &ParamValues, _origin: &ModelState, t: f64) -> Snapshot {
        let snap = Snapshot::empty().with_scalar("y", t);
        if t > 0.1 {
            snap.with_scalar("z", t)
        } else {
            snap
        }
    }
}

/// Probability that drifts past 1 after the first half second.
struct Overshoot;

impl ModelInfo for Overshoot {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new().scalar(ScalarDecl::new("p").range(0.0, 1.0))
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for Overshoot {
    fn evaluate(&self, _params: &ParamValues, _origin: &ModelState, t: f64) -> Snapshot {
        Snapshot::empty().with_scalar("p", 2.0 * t)
    }
}

/// Records what every frame carried.
struct Recorder {
    seen: Rc<RefCell<Vec<(u64, u64, Option<f64>, f64)>>>,
}

impl Renderer for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn target(&self) -> &str {
        "recorder"
    }

    fn render(&mut self, frame: &Frame<'_>, _host: &mut dyn RenderHost) -> Result<(), RenderError> {
        self.seen.borrow_mut().push((
            frame.revision,
            frame.params.revision(),
            frame.snapshot.scalar("y"),
            frame.params.get("k"),
        ));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn store() -> ParameterStore {
    ParameterStore::declare(vec![ParamSpec::linear("k", 0.0, 10.0, 0.5, 1.0)]).unwrap()
}

fn ramp(swap: HotSwap) -> Model {
    Model::closed_form(Ramp { swap })
}

fn driver(model: Model, store: &ParameterStore) -> AnimationDriver {
    AnimationDriver::new(model, store, DriverConfig::default()).unwrap()
}

fn run(driver: &mut AnimationDriver, store: &ParameterStore, host: &mut HeadlessHost, from: usize, to: usize) {
    for i in from..to {
        driver.tick(store, i as f64 * 0.05, host);
    }
}

fn line_points(host: &HeadlessHost, id: &str) -> Vec<(f64, f64)> {
    host.canvas(id)
        .unwrap()
        .commands()
        .iter()
        .filter_map(|c| match *c {
            DrawCommand::LineTo(x, y) => Some((x, y)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_long_gap_is_clamped() {
    let store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);

    driver.tick(&store, 0.0, &mut host);
    driver.tick(&store, 0.05, &mut host);
    // tab was in the background for five seconds
    driver.tick(&store, 5.05, &mut host);

    assert!((driver.sim_time() - 0.15).abs() < 1e-12);
    assert!(driver.clock().was_clamped());
}

#[test]
fn test_integration_substeps_bounded_by_max_step() {
    let store = store();
    let steps = Rc::new(RefCell::new(Vec::new()));
    let model = Model::integrated(Decay { steps: steps.clone() });
    let mut host = HeadlessHost::new();
    let mut driver = driver(model, &store);

    driver.tick(&store, 0.0, &mut host);
    assert!(steps.borrow().is_empty());
    driver.tick(&store, 0.05, &mut host);

    let steps = steps.borrow();
    assert_eq!(steps.len(), 50);
    assert!(steps.iter().all(|h| *h <= 0.001 + 1e-15));
    let n = driver.snapshot().scalar("n").unwrap();
    assert!((n - (-0.05f64).exp()).abs() < 1e-4);
}

#[test]
fn test_pause_resume_matches_continuous_run() {
    let store = store();
    let mut host = HeadlessHost::new();

    let mut continuous = driver(ramp(HotSwap::Continue), &store);
    run(&mut continuous, &store, &mut host, 0, 21);

    let mut interrupted = driver(ramp(HotSwap::Continue), &store);
    run(&mut interrupted, &store, &mut host, 0, 11);
    interrupted.pause();
    run(&mut interrupted, &store, &mut host, 11, 30);
    interrupted.resume();
    // resuming re-arms the clock on the first frame
    run(&mut interrupted, &store, &mut host, 30, 41);

    let a: Vec<_> = continuous.history().get("y").unwrap().iter().map(|p| (p.t, p.value)).collect();
    let b: Vec<_> = interrupted.history().get("y").unwrap().iter().map(|p| (p.t, p.value)).collect();
    assert_eq!(a.len(), b.len());
    for ((ta, va), (tb, vb)) in a.iter().zip(&b) {
        assert!((ta - tb).abs() < 1e-9);
        assert!((va - vb).abs() < 1e-9);
    }
}

// ============================================================================
// Parameters and hot swap
// ============================================================================

#[test]
fn test_frame_revision_matches_values() {
    let mut store = store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    driver.attach(Box::new(Recorder { seen: seen.clone() }));

    driver.tick(&store, 0.0, &mut host);
    store.set("k", 2.0).unwrap();
    store.set("k", 3.0).unwrap();
    driver.tick(&store, 0.05, &mut host);
    store.set("k", 4.0).unwrap();
    driver.tick(&store, 0.1, &mut host);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    for (frame_rev, params_rev, _, _) in seen.iter() {
        assert_eq!(frame_rev, params_rev);
    }
    // back-to-back edits collapse into the latest value
    assert_eq!(seen[1].0, 2);
    assert_eq!(seen[1].3, 3.0);
    assert_eq!(seen[2].3, 4.0);

    for p in driver.history().get("y").unwrap().iter() {
        assert!(p.revision <= store.revision());
    }
    assert_eq!(driver.history().get("y").unwrap().latest().unwrap().revision, 3);
}

#[test]
fn test_setting_same_value_is_not_an_edit() {
    let mut store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Reseed), &store);
    run(&mut driver, &store, &mut host, 0, 5);

    let current = store.get("k").unwrap();
    assert!(!store.set("k", current).unwrap());
    driver.tick(&store, 0.25, &mut host);
    assert!(driver.sim_time() > 0.2);
}

#[test]
fn test_reseed_keeps_value_continuous() {
    let mut store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Reseed), &store);
    run(&mut driver, &store, &mut host, 0, 11);
    let before = driver.snapshot().scalar("y").unwrap();

    store.set("k", 3.0).unwrap();
    driver.tick(&store, 0.55, &mut host);

    assert!((driver.sim_time() - 0.05).abs() < 1e-12);
    let after = driver.snapshot().scalar("y").unwrap();
    assert!((after - (before + 3.0 * 0.05)).abs() < 1e-12);
    assert_eq!(driver.history().get("y").unwrap().len(), 1);
    assert_eq!(driver.epoch(), 0);
}

#[test]
fn test_restart_returns_to_initial_conditions() {
    let mut store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Restart), &store);
    run(&mut driver, &store, &mut host, 0, 11);

    store.set("k", 3.0).unwrap();
    driver.tick(&store, 0.55, &mut host);

    assert_eq!(driver.epoch(), 1);
    let y = driver.snapshot().scalar("y").unwrap();
    assert!((y - 3.0 * 0.05).abs() < 1e-12);
}

#[test]
fn test_continue_keeps_sim_time() {
    let mut store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    run(&mut driver, &store, &mut host, 0, 11);

    store.set("k", 3.0).unwrap();
    driver.tick(&store, 0.55, &mut host);
    assert!((driver.sim_time() - 0.55).abs() < 1e-9);
    assert_eq!(driver.history().get("y").unwrap().len(), 12);
}

#[test]
fn test_hold_parameter_pauses() {
    let mut store = ParameterStore::declare(vec![ParamSpec::linear("k", 0.0, 10.0, 0.5, 1.0).hold()]).unwrap();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    run(&mut driver, &store, &mut host, 0, 3);

    store.set("k", 2.0).unwrap();
    driver.tick(&store, 0.15, &mut host);
    assert_eq!(driver.state(), DriverState::Paused);
    // paused frames still show the new value
    assert_eq!(driver.snapshot().scalar("y"), Some(2.0 * driver.sim_time()));
}

// ============================================================================
// Invalid samples and contract failures
// ============================================================================

#[test]
fn test_no_line_past_invalid_sample() {
    let mut store = store();
    let decl = Ramp { swap: HotSwap::Continue }.declare();
    let mut host = HeadlessHost::new().with_canvas("plot", CanvasSize::new(400.0, 240.0, 1.0));
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    let spec = PlotSpec::new("plot").series(PlotSeries::line("y", Color::CYAN));
    driver.attach(Box::new(PlotRenderer::new(spec, &store, &decl).unwrap()));

    run(&mut driver, &store, &mut host, 0, 10);
    host.clear_commands();
    driver.redraw(&mut host);
    let valid = line_points(&host, "plot");
    let last_t = driver.history().get("y").unwrap().latest().unwrap().t;

    store.set("k", 8.0).unwrap();
    host.clear_commands();
    run(&mut driver, &store, &mut host, 10, 20);
    assert!(driver.snapshot().invalid.is_some());

    host.clear_commands();
    driver.redraw(&mut host);
    let stale = line_points(&host, "plot");
    assert_eq!(driver.history().get("y").unwrap().latest().unwrap().t, last_t);
    assert_eq!(stale, valid);
    let alpha = host
        .canvas("plot")
        .unwrap()
        .count(|c| matches!(c, DrawCommand::GlobalAlpha(a) if *a < 1.0));
    assert!(alpha >= 1);
}

#[test]
fn test_invalid_snapshot_keeps_last_valid() {
    let mut store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    run(&mut driver, &store, &mut host, 0, 5);
    let last = driver.snapshot().scalar("y");

    store.set("k", 6.0).unwrap();
    driver.tick(&store, 0.25, &mut host);
    assert!(!driver.snapshot().is_valid());
    assert_eq!(driver.last_valid().unwrap().scalar("y"), last);
    assert_eq!(driver.state(), DriverState::Running);
    assert!(driver.diagnostic().is_none());

    store.set("k", 2.0).unwrap();
    driver.tick(&store, 0.3, &mut host);
    assert!(driver.snapshot().is_valid());
}

#[test]
fn test_contract_violation_stops_and_reset_clears() {
    let store = ParameterStore::declare(vec![]).unwrap();
    let decl = Rogue.declare();
    let mut host = HeadlessHost::new().with_readout("out");
    let mut driver = driver(Model::closed_form(Rogue), &store);
    let spec = ReadoutSpec {
        container: "out".into(),
        entries: vec![ReadoutEntry::scalar("y", "y")],
    };
    driver.attach(Box::new(ReadoutRenderer::new(&spec, &store, &decl).unwrap()));
    driver.set_scheduler(Box::new(ManualScheduler::default()));

    run(&mut driver, &store, &mut host, 0, 5);
    assert_eq!(driver.state(), DriverState::Finished);
    assert_eq!(driver.diagnostic(), Some("evaluator emitted undeclared scalar 'z'"));
    assert!(driver.pending_frame().is_none());
    let messages = host.text("out").unwrap().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Severity::Error);

    driver.reset();
    assert!(driver.diagnostic().is_none());
    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(driver.sim_time(), 0.0);
    assert!(driver.pending_frame().is_some());
}

#[test]
fn test_scalar_past_declared_range_is_a_contract_error() {
    let store = ParameterStore::declare(vec![]).unwrap();
    let mut host = HeadlessHost::new();
    let mut driver = driver(Model::closed_form(Overshoot), &store);
    driver.set_scheduler(Box::new(ManualScheduler::default()));

    run(&mut driver, &store, &mut host, 0, 8);
    assert_eq!(driver.state(), DriverState::Running);
    assert!(driver.diagnostic().is_none());

    run(&mut driver, &store, &mut host, 8, 20);
    assert_eq!(driver.state(), DriverState::Finished);
    let diagnostic = driver.diagnostic().unwrap();
    assert!(diagnostic.starts_with("scalar 'p' = "), "{diagnostic}");
    assert!(diagnostic.ends_with("outside its declared range [0, 1]"), "{diagnostic}");
}

#[test]
fn test_failing_surface_does_not_block_siblings() {
    let store = store();
    let decl = Ramp { swap: HotSwap::Continue }.declare();
    let mut host = HeadlessHost::new()
        .with_canvas("plot", CanvasSize::default())
        .with_readout("out");
    host.canvas_mut("plot").unwrap().fail_with("context lost");

    let mut driver = driver(ramp(HotSwap::Continue), &store);
    let spec = PlotSpec::new("plot").series(PlotSeries::line("y", Color::CYAN));
    driver.attach(Box::new(PlotRenderer::new(spec, &store, &decl).unwrap()));
    let readout = ReadoutSpec {
        container: "out".into(),
        entries: vec![ReadoutEntry::scalar("y", "y")],
    };
    driver.attach(Box::new(ReadoutRenderer::new(&readout, &store, &decl).unwrap()));

    run(&mut driver, &store, &mut host, 0, 3);
    assert_eq!(host.text("out").unwrap().frames(), 3);
    assert_eq!(driver.state(), DriverState::Running);
}

#[test]
fn test_unknown_parameter_is_rejected() {
    let store = ParameterStore::declare(vec![ParamSpec::linear("q", 0.0, 1.0, 0.1, 0.5)]).unwrap();
    let err = AnimationDriver::new(ramp(HotSwap::Continue), &store, DriverConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Parameter(_)));
}

// ============================================================================
// Scheduling and visibility
// ============================================================================

#[test]
fn test_visibility_pauses_and_resumes() {
    let store = store();
    let mut host = HeadlessHost::new();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    driver.set_scheduler(Box::new(ManualScheduler::default()));
    run(&mut driver, &store, &mut host, 0, 3);

    driver.set_visible(false);
    assert_eq!(driver.state(), DriverState::Paused);
    assert!(driver.pending_frame().is_none());

    driver.set_visible(true);
    assert_eq!(driver.state(), DriverState::Running);
    assert!(driver.pending_frame().is_some());
}

#[test]
fn test_user_pause_survives_visibility_change() {
    let store = store();
    let mut driver = driver(ramp(HotSwap::Continue), &store);
    driver.pause();
    driver.set_visible(false);
    driver.set_visible(true);
    assert_eq!(driver.state(), DriverState::Paused);
}

#[test]
fn test_closed_form_is_deterministic() {
    let model = Ramp { swap: HotSwap::Continue };
    let params = ParamValues::from_pairs(&[("k", 2.5)]);
    let origin = ModelState::new(vec![0.25]);
    let a = model.evaluate(&params, &origin, 0.3);
    let b = model.evaluate(&params, &origin, 0.3);
    assert_eq!(a.scalar("y").map(f64::to_bits), b.scalar("y").map(f64::to_bits));
}
