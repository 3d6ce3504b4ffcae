//! Property tests for the quantified invariants: store round trips, pool
//! counts, series ordering, boundary containment and formatting.

use glam::Vec2;
use proptest::prelude::*;

use rtviz::format::NOT_A_NUMBER;
use rtviz::samples::rc::RcLowPass;
use rtviz::scene::{Boundary, ParticlePool, Shape, SpawnContext};
use rtviz::{
    CanvasSize, Eviction, Formatter, HeadlessHost, ParamSpec, ParameterStore, SampleShell, SeriesBuffer,
};

fn linear_store() -> ParameterStore {
    ParameterStore::declare(vec![ParamSpec::linear("x", -5.0, 20.0, 0.25, 1.0)]).unwrap()
}

fn log_store(step: f64) -> ParameterStore {
    ParameterStore::declare(vec![ParamSpec::log("c", 1e-6, 1e-3, 1e-4).step(step)]).unwrap()
}

proptest! {
    // ========================================================================
    // Parameter store
    // ========================================================================

    #[test]
    fn prop_set_get_is_idempotent(raw in -100.0f64..100.0) {
        let mut store = linear_store();
        store.set("x", raw).unwrap();
        let revision = store.revision();
        let value = store.get("x").unwrap();
        prop_assert!(!store.set("x", value).unwrap());
        prop_assert_eq!(store.revision(), revision);
    }

    #[test]
    fn prop_values_clamped_and_snapped(raw in -100.0f64..100.0) {
        let mut store = linear_store();
        store.set("x", raw).unwrap();
        let value = store.get("x").unwrap();
        prop_assert!((-5.0..=20.0).contains(&value));
        let steps = (value + 5.0) / 0.25;
        prop_assert!((steps - steps.round()).abs() < 1e-9);
    }

    #[test]
    fn prop_non_finite_rejected(raw in prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]) {
        let mut store = linear_store();
        prop_assert!(store.set("x", raw).is_err());
        prop_assert_eq!(store.get("x"), Some(1.0));
        prop_assert_eq!(store.revision(), 0);
    }

    #[test]
    fn prop_log_position_round_trips(s in 0.0f64..=1.0) {
        let store = log_store(0.0);
        let p = store.parameter("c").unwrap();
        let back = p.position_for(p.value_at(s));
        prop_assert!((back - s).abs() < 1e-9, "{} -> {}", s, back);
    }

    #[test]
    fn prop_stepped_log_position_within_one_step(s in 0.0f64..=1.0) {
        let store = log_store(0.01);
        let p = store.parameter("c").unwrap();
        let back = p.position_for(p.value_at(s));
        prop_assert!((back - s).abs() <= 0.01 + 1e-9);
    }

    #[test]
    fn prop_stepped_log_set_lands_on_slider_grid(raw in 1e-7f64..1e-2) {
        let mut store = log_store(0.05);
        store.set("c", raw).unwrap();
        let value = store.get("c").unwrap();
        let s = store.position("c").unwrap();
        prop_assert!(((s / 0.05) - (s / 0.05).round()).abs() < 1e-6, "{} at {}", value, s);

        let revision = store.revision();
        prop_assert!(!store.set("c", value).unwrap());
        prop_assert_eq!(store.revision(), revision);
    }

    // ========================================================================
    // Particle pool
    // ========================================================================

    #[test]
    fn prop_sync_matches_targets(
        first in prop::collection::vec(0usize..60, 1..5),
        second in prop::collection::vec(0usize..60, 1..5),
        seed in any::<u64>(),
    ) {
        let mut rng = SpawnContext::new(seed);
        let mut pool = ParticlePool::new();
        let mut make = |_class: usize| (Vec2::ZERO, Vec2::ZERO, 2.0);

        pool.sync(&first, &mut make);
        prop_assert_eq!(pool.counts(first.len()), first.clone());
        prop_assert_eq!(pool.len(), first.iter().sum::<usize>());

        pool.relabel(&second, &mut rng);
        pool.sync(&second, &mut make);
        prop_assert_eq!(pool.counts(second.len()), second.clone());
        prop_assert_eq!(pool.len(), second.iter().sum::<usize>());
    }

    // ========================================================================
    // Series buffers
    // ========================================================================

    #[test]
    fn prop_ring_is_bounded_and_monotonic(
        times in prop::collection::vec(-10.0f64..10.0, 0..200),
        max_len in 1usize..50,
    ) {
        let mut buf = SeriesBuffer::new("y", Eviction::Ring { max_len });
        for (i, t) in times.iter().enumerate() {
            let _ = buf.push(*t, i as f64, 0);
        }
        prop_assert!(buf.len() <= max_len);
        let ts: Vec<f64> = buf.iter().map(|p| p.t).collect();
        prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_window_is_bounded(
        steps in prop::collection::vec(0.001f64..0.5, 1..300),
        span in 0.5f64..5.0,
    ) {
        let eviction = Eviction::Window { span, max_len: 64 };
        let mut buf = SeriesBuffer::new("y", eviction);
        let mut t = 0.0f64;
        for dt in &steps {
            t += dt;
            buf.push(t, t.sin(), 0).unwrap();
        }
        prop_assert!(buf.len() <= eviction.bound());
        prop_assert!(!buf.is_empty());
        prop_assert_eq!(buf.latest().unwrap().t, t);
    }

    // ========================================================================
    // Boundaries
    // ========================================================================

    #[test]
    fn prop_reflect_keeps_particle_inside_rect(
        x in -1000.0f32..1000.0,
        y in -1000.0f32..1000.0,
        radius in 0.0f32..8.0,
    ) {
        let shape = Shape::Rect { min: Vec2::new(10.0, 10.0), max: Vec2::new(590.0, 390.0) };
        let mut position = Vec2::new(x, y);
        let mut velocity = Vec2::new(3.0, -4.0);
        shape.resolve(Boundary::Reflect, &mut position, &mut velocity, radius);
        prop_assert!(shape.contains(position, radius), "{:?}", position);
    }

    #[test]
    fn prop_reflect_keeps_particle_inside_circle(
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        radius in 0.0f32..8.0,
    ) {
        let shape = Shape::Circle { center: Vec2::new(100.0, 100.0), radius: 150.0 };
        let mut position = Vec2::new(x, y);
        let mut velocity = Vec2::new(1.0, 1.0);
        shape.resolve(Boundary::Reflect, &mut position, &mut velocity, radius);
        prop_assert!(shape.contains(position, radius), "{:?}", position);
    }

    #[test]
    fn prop_wrap_keeps_particle_inside_pipe(x in -2000.0f32..2000.0, y in 80.0f32..120.0) {
        let shape = Shape::Pipe { start_x: 20.0, end_x: 580.0, center_y: 100.0, radius: 60.0 };
        let mut position = Vec2::new(x, y);
        let mut velocity = Vec2::new(40.0, 0.0);
        shape.resolve(Boundary::Wrap, &mut position, &mut velocity, 2.0);
        prop_assert!(position.x > 20.0 && position.x < 580.0, "{:?}", position);
    }

    // ========================================================================
    // Formatting and physics
    // ========================================================================

    #[test]
    fn prop_engineering_format_is_total(value in any::<f64>()) {
        let text = Formatter::engineering("V").format(value);
        if value.is_finite() {
            prop_assert!(text.ends_with('V'));
        } else {
            prop_assert_eq!(text, NOT_A_NUMBER);
        }
    }

    #[test]
    fn prop_rc_matches_textbook_fractions(
        r in 100.0f64..100e3,
        c in 1e-6f64..1e-3,
        vin in 0.5f64..12.0,
    ) {
        let tau = r * c;
        let one = RcLowPass::voltage(vin, 0.0, tau, tau) / vin;
        let five = RcLowPass::voltage(vin, 0.0, tau, 5.0 * tau) / vin;
        prop_assert!((one - 0.632).abs() < 0.01);
        prop_assert!((five - 1.0).abs() < 0.01);
        let discharge = RcLowPass::voltage(0.0, vin, tau, tau) / vin;
        prop_assert!((discharge - 0.368).abs() < 0.01);
    }
}

/// At every parameter's minimum and maximum no valid frame shows a
/// non-finite readout value.
#[test]
fn test_parameter_extremes_display_finite_values() {
    for pick_max in [false, true] {
        for sample in rtviz::samples::all() {
            let container = sample.schema.layout.readout.as_ref().map(|r| r.container.clone());
            let mut host = HeadlessHost::new();
            for scene in &sample.schema.layout.scenes {
                host.add_canvas(&scene.canvas_id, CanvasSize::default());
            }
            for plot in &sample.schema.layout.plots {
                host.add_canvas(&plot.canvas_id, CanvasSize::default());
            }
            if let Some(id) = &container {
                host = host.with_readout(id);
            }

            let mut shell = SampleShell::mount(sample).unwrap();
            let specs: Vec<ParamSpec> = shell.store().iter().map(|p| p.spec().clone()).collect();
            for spec in specs {
                let value = if pick_max { spec.max } else { spec.min };
                shell.set_param(&spec.name, value).unwrap();
            }
            for i in 0..3 {
                shell.frame(i as f64 * 0.05, &mut host);
            }

            assert!(shell.diagnostic().is_none(), "{}: {:?}", shell.id(), shell.diagnostic());
            if shell.driver().snapshot().invalid.is_some() {
                continue;
            }
            let Some(readout) = container.as_ref().and_then(|id| host.text(id)) else {
                continue;
            };
            for line in readout.lines() {
                assert_ne!(line.value, NOT_A_NUMBER, "{}: {} at extremes", shell.id(), line.label);
            }
        }
    }
}
