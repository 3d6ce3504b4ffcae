//! Pipe flow: Darcy–Weisbach head loss with a tracer profile.
//!
//! Tracers follow a parabolic velocity profile. Cross-flow jitter fades in
//! through the transitional band so the switch to turbulence reads as a
//! gradual change rather than a jump.

use glam::Vec2;

use crate::format::Formatter;
use crate::model::{
    ClosedFormModel, HotSwap, Model, ModelDeclaration, ModelInfo, ModelState, ScalarDecl,
    SeriesDecl, Snapshot,
};
use crate::params::{ParamSpec, ParamValues};
use crate::plot::{AxisSpec, PlotSeries, PlotSpec, RefValue, ReferenceLine};
use crate::readout::{ColorRule, ReadoutEntry, ReadoutSpec};
use crate::scene::{Boundary, MotionRule, ParticleClassSpec, Region, SceneSpec};
use crate::series::Eviction;
use crate::shell::{Sample, SampleSchema};
use crate::visuals::Color;

pub const SCENE: &str = "pipe-scene";
pub const PLOT: &str = "pipe-plot";
pub const READOUT: &str = "pipe-readout";

pub const GRAVITY: f64 = 9.81;
pub const WATER_DENSITY: f64 = 1000.0;
pub const LAMINAR_LIMIT: f64 = 2300.0;
pub const TURBULENT_LIMIT: f64 = 4000.0;

const V_MIN: f64 = 0.01;
const V_MAX: f64 = 5.0;
const CURVE_POINTS: usize = 120;
/// View units per second of axial speed per m/s.
const SPEED_PX: f64 = 40.0;

/// Flow regime for a Reynolds number.
pub fn regime(reynolds: f64) -> &'static str {
    if reynolds < LAMINAR_LIMIT {
        "Laminar"
    } else if reynolds < TURBULENT_LIMIT {
        "Transitional"
    } else {
        "Turbulent"
    }
}

/// Darcy friction factor for a smooth pipe.
///
/// `64/Re` when laminar, Haaland's smooth-pipe form when turbulent, and a
/// linear blend across the transitional band.
pub fn friction_factor(reynolds: f64) -> f64 {
    let laminar = |re: f64| 64.0 / re;
    let turbulent = |re: f64| {
        let inv_sqrt = -1.8 * (6.9 / re).log10();
        1.0 / (inv_sqrt * inv_sqrt)
    };
    if reynolds < LAMINAR_LIMIT {
        laminar(reynolds)
    } else if reynolds < TURBULENT_LIMIT {
        let s = (reynolds - LAMINAR_LIMIT) / (TURBULENT_LIMIT - LAMINAR_LIMIT);
        laminar(LAMINAR_LIMIT) * (1.0 - s) + turbulent(TURBULENT_LIMIT) * s
    } else {
        turbulent(reynolds)
    }
}

/// Head loss in metres of fluid.
pub fn head_loss(velocity: f64, diameter: f64, length: f64, viscosity: f64) -> f64 {
    if velocity == 0.0 {
        return 0.0;
    }
    let re = velocity.abs() * diameter / viscosity;
    friction_factor(re) * (length / diameter) * velocity * velocity / (2.0 * GRAVITY)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipeFlow;

impl ModelInfo for PipeFlow {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["V", "D", "L", "nu"])
            .scalar(ScalarDecl::new("reynolds").formatter(Formatter::engineering_digits("", 3)))
            .scalar(ScalarDecl::new("friction").formatter(Formatter::fixed(4, "")))
            .scalar(ScalarDecl::new("head_loss").unit("m"))
            .scalar(ScalarDecl::new("pressure_drop").unit("Pa"))
            .label("regime")
            .series(SeriesDecl::new("loss_curve").eviction(Eviction::Ring { max_len: CURVE_POINTS }))
            .class("tracer")
            .field("speed")
            .field("turbulence")
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for PipeFlow {
    fn evaluate(&self, params: &ParamValues, _origin: &ModelState, _t: f64) -> Snapshot {
        let v = params.get("V");
        let d = params.get("D");
        let l = params.get("L");
        let nu = params.get("nu");
        if !(d > 0.0 && nu > 0.0 && v > 0.0) {
            return Snapshot::empty().invalid("velocity, diameter and viscosity must be positive");
        }

        let re = v * d / nu;
        let f = friction_factor(re);
        let h = head_loss(v, d, l, nu);
        let turbulence = ((re - LAMINAR_LIMIT) / (TURBULENT_LIMIT - LAMINAR_LIMIT)).clamp(0.0, 1.0);

        let curve = (0..CURVE_POINTS)
            .map(|i| {
                let s = i as f64 / (CURVE_POINTS - 1) as f64;
                let vi = V_MIN + (V_MAX - V_MIN) * s;
                (vi, head_loss(vi, d, l, nu))
            })
            .collect();

        Snapshot::empty()
            .with_scalar("reynolds", re)
            .with_scalar("friction", f)
            .with_scalar("head_loss", h)
            .with_scalar("pressure_drop", WATER_DENSITY * GRAVITY * h)
            .with_label("regime", regime(re))
            .with_series("loss_curve", curve)
            .with_target("tracer", 90)
            .with_field("speed", v * SPEED_PX)
            .with_field("turbulence", turbulence)
    }
}

fn schema() -> SampleSchema {
    let regime_colors = [
        ("Laminar".to_string(), Color::CYAN),
        ("Transitional".to_string(), Color::AMBER),
        ("Turbulent".to_string(), Color::RED),
    ]
    .into_iter()
    .collect();

    SampleSchema::new("pipe_flow", "Pipe Flow and Head Loss")
        .describe("Darcy–Weisbach head loss and the laminar-turbulent transition.")
        .param(ParamSpec::linear("V", V_MIN, V_MAX, 0.01, 0.05).label("Mean velocity").formatter(Formatter::engineering("m/s")))
        .param(ParamSpec::log("D", 0.005, 0.5, 0.05).label("Diameter").formatter(Formatter::engineering("m")))
        .param(ParamSpec::linear("L", 1.0, 100.0, 1.0, 10.0).label("Length").formatter(Formatter::engineering("m")))
        .param(ParamSpec::log("nu", 1e-7, 1e-4, 1e-6).label("Kinematic viscosity").formatter(Formatter::engineering("m²/s")))
        .scene(
            SceneSpec::new(SCENE, Vec2::new(600.0, 200.0))
                .region(
                    Region::Pipe {
                        start_x: 20.0,
                        end_x: 580.0,
                        center_y: 100.0,
                        radius: 60.0,
                    },
                    Boundary::Wrap,
                )
                .show_region()
                .class(
                    ParticleClassSpec::new("tracer")
                        .color(Color::CYAN)
                        .radius(2.5)
                        .with_rule(MotionRule::PipeFlow {
                            speed_field: "speed".into(),
                            scale: 1.0,
                            min_fraction: 0.08,
                            turbulence_field: Some("turbulence".into()),
                            turbulence_scale: 30.0,
                        }),
                ),
        )
        .plot(
            PlotSpec::new(PLOT)
                .title("Head loss vs velocity")
                .x_axis(AxisSpec::linear().label("V").formatter(Formatter::engineering("m/s")))
                .y_axis(AxisSpec::linear().label("h").formatter(Formatter::engineering("m")).grow())
                .series(PlotSeries::line("loss_curve", Color::AMBER))
                .reference(ReferenceLine::vertical(RefValue::Param("V".into()), Color::WHITE).label("V")),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("reynolds", "Re"),
                ReadoutEntry::text("regime", "Regime").color_from(ColorRule::Label {
                    label: "regime".into(),
                    map: regime_colors,
                }),
                ReadoutEntry::scalar("friction", "f"),
                ReadoutEntry::scalar("head_loss", "Head loss"),
                ReadoutEntry::scalar("pressure_drop", "Δp"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(PipeFlow))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regimes() {
        assert_eq!(regime(1000.0), "Laminar");
        assert_eq!(regime(3000.0), "Transitional");
        assert_eq!(regime(1e5), "Turbulent");
    }

    #[test]
    fn test_laminar_friction() {
        assert_eq!(friction_factor(1000.0), 0.064);
        // Haaland at Re = 1e5 is close to Blasius
        let blasius = 0.316 * 1e5f64.powf(-0.25);
        assert!((friction_factor(1e5) - blasius).abs() / blasius < 0.05);
    }

    #[test]
    fn test_friction_continuous_at_band_edges() {
        let below = friction_factor(LAMINAR_LIMIT - 1e-6);
        let above = friction_factor(LAMINAR_LIMIT);
        assert!((below - above).abs() < 1e-6);
        let below = friction_factor(TURBULENT_LIMIT - 1e-6);
        let above = friction_factor(TURBULENT_LIMIT);
        assert!((below - above).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_is_declared() {
        let p = ParamValues::from_pairs(&[("V", 0.05), ("D", 0.05), ("L", 10.0), ("nu", 1e-6)]);
        let snap = PipeFlow.evaluate(&p, &ModelState::default(), 0.0);
        assert_eq!(snap.label("regime"), Some("Transitional"));
        assert_eq!(PipeFlow.declare().validate(&snap), Ok(()));
    }
}
