//! RC low-pass step response.
//!
//! `Vc(t) = Vin + (Vc0 − Vin) · e^(−t/τ)` with `τ = R·C`. Edits reseed from
//! the capacitor voltage at the moment of the edit, so the curve bends
//! smoothly toward the new asymptote instead of jumping back to zero.

use glam::Vec2;

use crate::format::Formatter;
use crate::model::{
    ClosedFormModel, DomainPolicy, GlyphState, HotSwap, Model, ModelDeclaration, ModelInfo,
    ModelState, ScalarDecl, SeriesDecl, Snapshot, Timing,
};
use crate::params::{ParamSpec, ParamValues};
use crate::plot::{AxisSpec, PlotSeries, PlotSpec, RefValue, ReferenceLine};
use crate::readout::{ReadoutEntry, ReadoutSpec};
use crate::scene::{FlowPathSpec, GlyphKind, GlyphSpec, SceneSpec};
use crate::series::Eviction;
use crate::shell::{Sample, SampleSchema};
use crate::visuals::Color;

pub const SCENE: &str = "rc-scene";
pub const PLOT: &str = "rc-plot";
pub const READOUT: &str = "rc-readout";

/// Real seconds to sweep five time constants.
const REAL_SECONDS_PER_RUN: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RcLowPass;

impl RcLowPass {
    /// Capacitor voltage `t` seconds after a step from `vc0` toward `vin`.
    pub fn voltage(vin: f64, vc0: f64, tau: f64, t: f64) -> f64 {
        vin + (vc0 - vin) * (-t / tau).exp()
    }
}

impl ModelInfo for RcLowPass {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["Vin", "R", "C"])
            .scalar(ScalarDecl::new("tau").unit("s"))
            .scalar(ScalarDecl::new("vc").unit("V").formatter(Formatter::fixed(2, "V")))
            .scalar(ScalarDecl::new("ic").unit("A"))
            .series(
                SeriesDecl::new("vc")
                    .domain(DomainPolicy::GrowToMax)
                    .eviction(Eviction::Ring { max_len: 4096 }),
            )
            .glyph("source")
            .glyph("resistor")
            .glyph("capacitor")
            .flow("loop")
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Reseed
    }

    fn timing(&self, params: &ParamValues) -> Timing {
        let tau = params.get("R") * params.get("C");
        Timing::new(5.0 * tau, REAL_SECONDS_PER_RUN)
    }

    fn initial_state(&self, _params: &ParamValues) -> ModelState {
        ModelState::new(vec![0.0])
    }
}

impl ClosedFormModel for RcLowPass {
    fn evaluate(&self, params: &ParamValues, origin: &ModelState, t: f64) -> Snapshot {
        let vin = params.get("Vin");
        let r = params.get("R");
        let tau = r * params.get("C");
        if !(tau.is_finite() && tau > 0.0 && r > 0.0) {
            return Snapshot::empty().invalid("R·C must be positive");
        }

        let vc = Self::voltage(vin, origin.get(0), tau, t);
        let ic = (vin - vc) / r;
        let charge = if vin.abs() > f64::EPSILON {
            (vc / vin).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let drop = if vin.abs() > f64::EPSILON {
            ((vin - vc).abs() / vin.abs()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Snapshot::empty()
            .with_scalar("tau", tau)
            .with_scalar("vc", vc)
            .with_scalar("ic", ic)
            .with_sample("vc", t, vc)
            .with_glyph("source", GlyphState::active(vin.abs() > f64::EPSILON))
            .with_glyph("resistor", GlyphState::active(true).with_glow(drop))
            .with_glyph("capacitor", GlyphState::active(true).with_intensity(charge))
            .with_flow("loop", ic)
            .with_state(ModelState::new(vec![vc]))
    }
}

fn schema() -> SampleSchema {
    let loop_path = vec![
        Vec2::new(100.0, 200.0),
        Vec2::new(100.0, 80.0),
        Vec2::new(500.0, 80.0),
        Vec2::new(500.0, 320.0),
        Vec2::new(100.0, 320.0),
    ];

    SampleSchema::new("rc_lowpass", "RC Low-Pass Step Response")
        .describe("Capacitor charging through a resistor after a voltage step.")
        .param(
            ParamSpec::linear("Vin", 0.0, 12.0, 0.1, 5.0)
                .label("Input voltage")
                .formatter(Formatter::engineering("V")),
        )
        .param(
            ParamSpec::log("R", 100.0, 100e3, 1e3)
                .label("Resistance")
                .formatter(Formatter::engineering("Ω")),
        )
        .param(
            ParamSpec::log("C", 1e-6, 1e-3, 100e-6)
                .label("Capacitance")
                .formatter(Formatter::engineering("F")),
        )
        .scene(
            SceneSpec::new(SCENE, Vec2::new(600.0, 400.0))
                .glyph(GlyphSpec::new("source", GlyphKind::Source, Vec2::new(100.0, 200.0), 40.0).label("Vin"))
                .glyph(GlyphSpec::new("resistor", GlyphKind::Resistor, Vec2::new(300.0, 80.0), 60.0).label("R"))
                .glyph(
                    GlyphSpec::new("capacitor", GlyphKind::Capacitor, Vec2::new(500.0, 200.0), 40.0)
                        .oriented(std::f32::consts::FRAC_PI_2)
                        .label("C"),
                )
                .flow(FlowPathSpec::new("loop", loop_path, 4000.0).closed().threshold(1e-6)),
        )
        .plot(
            PlotSpec::new(PLOT)
                .title("Capacitor voltage")
                .x_axis(AxisSpec::linear().label("t").formatter(Formatter::engineering("s")))
                .y_axis(AxisSpec::linear().label("Vc").formatter(Formatter::engineering("V")).grow())
                .series(PlotSeries::line("vc", Color::CYAN).label("Vc").with_marker())
                .reference(
                    ReferenceLine::horizontal(RefValue::Param("Vin".into()), Color::AMBER).label("Vin"),
                ),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("tau", "τ"),
                ReadoutEntry::scalar("vc", "Vc"),
                ReadoutEntry::scalar("ic", "Ic"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(RcLowPass))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParamValues {
        ParamValues::from_pairs(&[("Vin", 5.0), ("R", 1e3), ("C", 100e-6)])
    }

    #[test]
    fn test_textbook_fractions() {
        let p = params();
        let origin = ModelState::new(vec![0.0]);
        let at = |t| RcLowPass.evaluate(&p, &origin, t).scalar("vc").unwrap();
        assert!((at(0.1) - 5.0 * 0.632).abs() < 0.05);
        assert!((at(0.5) - 5.0).abs() < 0.05);
        assert_eq!(RcLowPass.evaluate(&p, &origin, 0.0).scalar("ic"), Some(0.005));
    }

    #[test]
    fn test_reseed_continues_from_state() {
        let p = params();
        let snap = RcLowPass.evaluate(&p, &ModelState::new(vec![0.0]), 0.1);
        let vc = snap.scalar("vc").unwrap();
        let next = RcLowPass.evaluate(&p, &snap.state, 0.0);
        assert!((next.scalar("vc").unwrap() - vc).abs() < 1e-12);
    }

    #[test]
    fn test_declaration_covers_output() {
        let snap = RcLowPass.evaluate(&params(), &ModelState::new(vec![0.0]), 0.2);
        assert_eq!(RcLowPass.declare().validate(&snap), Ok(()));
    }

    #[test]
    fn test_timing_spans_five_tau() {
        let timing = RcLowPass.timing(&params());
        assert!((timing.time_scale() - 0.5 / 10.0).abs() < 1e-12);
    }
}
