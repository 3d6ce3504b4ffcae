//! SIR epidemic with a particle crowd.
//!
//! Forward Euler over `(S, I, R)`:
//!
//! ```text
//! dS/dt = −β·S·I/N
//! dI/dt =  β·S·I/N − γ·I
//! dR/dt =  γ·I
//! ```
//!
//! The crowd shows 200 people split across the compartments. Labels are
//! rebalanced by relabelling, so an infection recolours someone in place
//! instead of teleporting a new dot onto the canvas.

use glam::Vec2;

use crate::format::Formatter;
use crate::model::{
    DomainPolicy, HotSwap, IntegratedModel, Model, ModelDeclaration, ModelInfo, ModelState,
    ScalarDecl, SeriesDecl, Snapshot, Timing,
};
use crate::params::{ParamSpec, ParamValues};
use crate::plot::{AxisSpec, PlotSeries, PlotSpec};
use crate::readout::{ReadoutEntry, ReadoutSpec};
use crate::scene::{Boundary, MotionRule, ParticleClassSpec, Region, SceneSpec};
use crate::series::Eviction;
use crate::shell::{Sample, SampleSchema};
use crate::visuals::Color;
use crate::ParticleClass;

pub const SCENE: &str = "sir-scene";
pub const PLOT: &str = "sir-plot";
pub const READOUT: &str = "sir-readout";

/// People drawn in the crowd.
pub const CROWD: usize = 200;

#[derive(ParticleClass, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Compartment {
    #[class(rename = "S")]
    Susceptible,
    #[class(rename = "I")]
    Infected,
    #[class(rename = "R")]
    Recovered,
}

/// Split `total` across `fractions` by largest remainder, so the parts
/// always sum to `total`.
pub fn apportion(fractions: &[f64], total: usize) -> Vec<usize> {
    let sum: f64 = fractions.iter().filter(|f| f.is_finite()).map(|f| f.max(0.0)).sum();
    if sum <= 0.0 {
        return vec![0; fractions.len()];
    }
    let quotas: Vec<f64> = fractions
        .iter()
        .map(|f| if f.is_finite() { f.max(0.0) / sum * total as f64 } else { 0.0 })
        .collect();
    let mut parts: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = parts.iter().sum();

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().take(total.saturating_sub(assigned)) {
        parts[i] += 1;
    }
    parts
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sir;

impl ModelInfo for Sir {
    fn declare(&self) -> ModelDeclaration {
        let series = |name: &str| {
            SeriesDecl::new(name)
                .domain(DomainPolicy::GrowToMax)
                .eviction(Eviction::Ring { max_len: 8192 })
        };
        ModelDeclaration::new()
            .parameters(&["N", "beta", "gamma", "I0"])
            .scalar(ScalarDecl::new("r0").formatter(Formatter::fixed(2, "")))
            .scalar(ScalarDecl::new("s").formatter(Formatter::integer("")))
            .scalar(ScalarDecl::new("i").formatter(Formatter::integer("")))
            .scalar(ScalarDecl::new("r").formatter(Formatter::integer("")))
            .scalar(ScalarDecl::new("day").formatter(Formatter::fixed(1, "d")))
            .series(series("s"))
            .series(series("i"))
            .series(series("r"))
            .classes_of::<Compartment>()
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Restart
    }

    fn timing(&self, _params: &ParamValues) -> Timing {
        Timing::new(60.0, 20.0)
    }

    fn initial_state(&self, params: &ParamValues) -> ModelState {
        let n = params.get("N");
        let i0 = params.get("I0").min(n);
        ModelState::new(vec![n - i0, i0, 0.0])
    }
}

impl IntegratedModel for Sir {
    fn integrate(&self, state: &ModelState, params: &ParamValues, dt: f64) -> ModelState {
        let (s, i, r) = (state.get(0), state.get(1), state.get(2));
        let n = params.get("N");
        let beta = params.get("beta");
        let gamma = params.get("gamma");

        let infections = if n > 0.0 { beta * s * i / n * dt } else { 0.0 };
        let recoveries = gamma * i * dt;
        ModelState::new(vec![s - infections, i + infections - recoveries, r + recoveries])
    }

    fn observe(&self, state: &ModelState, params: &ParamValues, t: f64) -> Snapshot {
        let (s, i, r) = (state.get(0), state.get(1), state.get(2));
        let gamma = params.get("gamma");
        if !(gamma > 0.0) {
            return Snapshot::empty().invalid("recovery rate must be positive");
        }
        let r0 = params.get("beta") / gamma;
        let crowd = apportion(&[s, i, r], CROWD);

        let mut snap = Snapshot::empty()
            .with_scalar("r0", r0)
            .with_scalar("s", s)
            .with_scalar("i", i)
            .with_scalar("r", r)
            .with_scalar("day", t)
            .with_sample("s", t, s)
            .with_sample("i", t, i)
            .with_sample("r", t, r)
            .with_state(state.clone());
        for (class, count) in Compartment::NAMES.iter().zip(crowd) {
            snap = snap.with_target(class, count);
        }
        if i < 0.5 && t > 2.0 {
            snap = snap.finished();
        }
        snap
    }

    fn max_step(&self) -> Option<f64> {
        Some(0.01)
    }
}

fn schema() -> SampleSchema {
    let person = |class: Compartment, color: Color| {
        ParticleClassSpec::new(class.name())
            .color(color)
            .radius(4.0)
            .speed(30.0)
            .with_rule(MotionRule::Jitter { strength: 40.0 })
            .with_rule(MotionRule::SpeedLimit { min: 10.0, max: 50.0 })
    };

    SampleSchema::new("sir", "SIR Epidemic")
        .describe("Susceptible, infected and recovered compartments of a closed population.")
        .param(ParamSpec::linear("N", 100.0, 10_000.0, 100.0, 2000.0).label("Population").formatter(Formatter::integer("")))
        .param(ParamSpec::linear("beta", 0.1, 3.0, 0.05, 1.5).label("Transmission rate β"))
        .param(ParamSpec::linear("gamma", 0.05, 1.0, 0.01, 0.3).label("Recovery rate γ"))
        .param(ParamSpec::linear("I0", 1.0, 100.0, 1.0, 10.0).label("Initially infected").formatter(Formatter::integer("")))
        .scene(
            SceneSpec::new(SCENE, Vec2::new(600.0, 400.0))
                .region(
                    Region::Rect {
                        min: Vec2::new(10.0, 10.0),
                        max: Vec2::new(590.0, 390.0),
                    },
                    Boundary::Reflect,
                )
                .class(person(Compartment::Susceptible, Color::BLUE))
                .class(person(Compartment::Infected, Color::RED))
                .class(person(Compartment::Recovered, Color::GREEN))
                .relabel()
                .show_region(),
        )
        .plot(
            PlotSpec::new(PLOT)
                .title("Compartments")
                .x_axis(AxisSpec::linear().label("day").formatter(Formatter::fixed(0, "")))
                .y_axis(AxisSpec::linear().label("people").grow())
                .series(PlotSeries::line("s", Color::BLUE).label("S"))
                .series(PlotSeries::line("i", Color::RED).label("I").with_marker())
                .series(PlotSeries::line("r", Color::GREEN).label("R"))
                .legend(),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("r0", "R₀"),
                ReadoutEntry::scalar("day", "Day"),
                ReadoutEntry::scalar("s", "S"),
                ReadoutEntry::scalar("i", "I"),
                ReadoutEntry::scalar("r", "R"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::integrated(Sir))
}
