//! Circular orbit: `v = √(μ/r)`, `T = 2πr/v`.

use std::f64::consts::TAU;

use glam::Vec2;

use crate::format::Formatter;
use crate::model::{
    ClosedFormModel, GlyphState, HotSwap, Model, ModelDeclaration, ModelInfo, ModelState,
    ScalarDecl, Snapshot, Timing,
};
use crate::params::{ParamSpec, ParamValues};
use crate::readout::{ReadoutEntry, ReadoutSpec};
use crate::scene::{Boundary, GlyphKind, GlyphSpec, Region, SceneSpec};
use crate::shell::{Sample, SampleSchema};
use crate::visuals::Color;

pub const SCENE: &str = "orbit-scene";
pub const READOUT: &str = "orbit-readout";

/// Mean Earth radius, for the altitude readout.
pub const EARTH_RADIUS: f64 = 6.371e6;

const CENTER: Vec2 = Vec2::new(300.0, 200.0);
const ORBIT_PX: f32 = 150.0;

/// Real seconds per drawn revolution.
const REAL_SECONDS_PER_ORBIT: f64 = 12.0;

/// Orbital speed and period of a circular orbit.
pub fn circular(mu: f64, r: f64) -> Option<(f64, f64)> {
    if !(mu > 0.0 && r > 0.0) {
        return None;
    }
    let v = (mu / r).sqrt();
    Some((v, TAU * r / v))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Orbit;

impl ModelInfo for Orbit {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["mu", "r"])
            .scalar(ScalarDecl::new("v").formatter(Formatter::integer("m/s")))
            .scalar(ScalarDecl::new("period").formatter(Formatter::integer("s")))
            .scalar(ScalarDecl::new("altitude").unit("m"))
            .glyph("satellite")
    }

    /// Edits keep the satellite where it is and change its pace.
    fn hot_swap(&self) -> HotSwap {
        HotSwap::Reseed
    }

    fn timing(&self, params: &ParamValues) -> Timing {
        let period = circular(params.get("mu"), params.get("r"))
            .map(|(_, t)| t)
            .unwrap_or(1.0);
        Timing::new(period, REAL_SECONDS_PER_ORBIT)
    }

    fn initial_state(&self, _params: &ParamValues) -> ModelState {
        ModelState::new(vec![0.0])
    }
}

impl ClosedFormModel for Orbit {
    fn evaluate(&self, params: &ParamValues, origin: &ModelState, t: f64) -> Snapshot {
        let r = params.get("r");
        let Some((v, period)) = circular(params.get("mu"), r) else {
            return Snapshot::empty().invalid("μ and r must be positive");
        };
        let angle = (origin.get(0) + TAU * t / period).rem_euclid(TAU);

        Snapshot::empty()
            .with_scalar("v", v)
            .with_scalar("period", period)
            .with_scalar("altitude", r - EARTH_RADIUS)
            .with_glyph("satellite", GlyphState::active(true).with_rotation(-angle).with_intensity(0.8))
            .with_state(ModelState::new(vec![angle]))
    }
}

fn schema() -> SampleSchema {
    SampleSchema::new("orbit", "Circular Orbit")
        .describe("Speed and period of a satellite on a circular orbit.")
        .param(
            ParamSpec::log("mu", 1e13, 1e16, 3.986e14)
                .label("Gravitational parameter μ")
                .formatter(Formatter::engineering_digits("m³/s²", 4)),
        )
        .param(
            ParamSpec::log("r", 6.6e6, 4.3e7, 6.78e6)
                .label("Orbit radius r")
                .formatter(Formatter::engineering_digits("m", 3)),
        )
        .scene(
            SceneSpec::new(SCENE, Vec2::new(600.0, 400.0))
                .region(
                    Region::Circle {
                        center: CENTER,
                        radius: 60.0,
                    },
                    Boundary::Reflect,
                )
                .show_region()
                .glyph(
                    GlyphSpec::new("satellite", GlyphKind::Panel, CENTER + Vec2::new(ORBIT_PX, 0.0), 30.0)
                        .pivot(CENTER)
                        .color(Color::CYAN),
                ),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("v", "Orbital speed"),
                ReadoutEntry::scalar("period", "Period"),
                ReadoutEntry::scalar("altitude", "Altitude"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(Orbit))
}
