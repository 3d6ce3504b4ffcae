//! Black-body spectrum and Wien's displacement law.

use glam::Vec2;

use crate::format::Formatter;
use crate::model::{
    ClosedFormModel, DomainPolicy, HotSwap, Model, ModelDeclaration, ModelInfo, ModelState,
    ScalarDecl, SeriesDecl, Snapshot,
};
use crate::params::{ParamSpec, ParamValues};
use crate::plot::{AxisSpec, PlotSeries, PlotSpec, RefValue, ReferenceLine};
use crate::readout::{ColorRule, ReadoutEntry, ReadoutSpec};
use crate::scene::{Boundary, MotionRule, ParticleClassSpec, Region, SceneSpec, Tint};
use crate::series::Eviction;
use crate::shell::{Sample, SampleSchema};
use crate::visuals::{Color, Palette};

pub const SCENE: &str = "blackbody-scene";
pub const PLOT: &str = "blackbody-plot";
pub const READOUT: &str = "blackbody-readout";

/// Wien displacement constant, m·K.
pub const WIEN_B: f64 = 2.897771955e-3;
const PLANCK_H: f64 = 6.626_070_15e-34;
const LIGHT_C: f64 = 2.997_924_58e8;
const BOLTZMANN_K: f64 = 1.380_649e-23;

pub const VISIBLE_MIN: f64 = 380e-9;
pub const VISIBLE_MAX: f64 = 750e-9;

const SPECTRUM_MIN: f64 = 100e-9;
const SPECTRUM_MAX: f64 = 10e-6;
const SPECTRUM_POINTS: usize = 240;

/// Spectral band a wavelength falls in.
pub fn spectral_region(wavelength: f64) -> &'static str {
    if wavelength < VISIBLE_MIN {
        "Ultraviolet"
    } else if wavelength <= VISIBLE_MAX {
        "Visible Light"
    } else {
        "Infrared"
    }
}

/// Planck spectral radiance `B(λ, T)` in W·sr⁻¹·m⁻³.
pub fn planck(wavelength: f64, temperature: f64) -> f64 {
    let a = 2.0 * PLANCK_H * LIGHT_C * LIGHT_C / wavelength.powi(5);
    let x = PLANCK_H * LIGHT_C / (wavelength * BOLTZMANN_K * temperature);
    a / x.exp_m1()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlackBody;

impl ModelInfo for BlackBody {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["T"])
            .scalar(ScalarDecl::new("peak").unit("m"))
            .scalar(ScalarDecl::new("temperature").formatter(Formatter::integer("K")))
            .label("region")
            .series(
                SeriesDecl::new("radiance")
                    .domain(DomainPolicy::LogX)
                    .eviction(Eviction::Ring { max_len: SPECTRUM_POINTS }),
            )
            .class("photon")
            .field("temperature")
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for BlackBody {
    fn evaluate(&self, params: &ParamValues, _origin: &ModelState, _t: f64) -> Snapshot {
        let temperature = params.get("T");
        if !(temperature > 0.0) {
            return Snapshot::empty().invalid("temperature must be positive");
        }
        let peak = WIEN_B / temperature;

        let ratio = (SPECTRUM_MAX / SPECTRUM_MIN).ln();
        let spectrum = (0..SPECTRUM_POINTS)
            .map(|i| {
                let s = i as f64 / (SPECTRUM_POINTS - 1) as f64;
                let lambda = SPECTRUM_MIN * (ratio * s).exp();
                (lambda, planck(lambda, temperature))
            })
            .collect();
        // brighter bodies emit more photons
        let photons = (temperature / 100.0).round().clamp(5.0, 120.0) as usize;

        Snapshot::empty()
            .with_scalar("peak", peak)
            .with_scalar("temperature", temperature)
            .with_label("region", spectral_region(peak))
            .with_series("radiance", spectrum)
            .with_target("photon", photons)
            .with_field("temperature", temperature)
    }
}

fn schema() -> SampleSchema {
    let region_colors = [
        ("Ultraviolet".to_string(), Color::rgb(0.6, 0.4, 1.0)),
        ("Visible Light".to_string(), Color::GREEN),
        ("Infrared".to_string(), Color::RED),
    ]
    .into_iter()
    .collect();

    SampleSchema::new("blackbody", "Black-Body Radiation")
        .describe("Planck spectrum and Wien peak of a body at temperature T.")
        .param(
            ParamSpec::linear("T", 1000.0, 12_000.0, 100.0, 5800.0)
                .label("Temperature")
                .formatter(Formatter::integer("K")),
        )
        .scene(
            SceneSpec::new(SCENE, Vec2::new(400.0, 300.0))
                .region(
                    Region::Circle {
                        center: Vec2::new(200.0, 150.0),
                        radius: 120.0,
                    },
                    Boundary::Reflect,
                )
                .class(
                    ParticleClassSpec::new("photon")
                        .radius(3.0)
                        .speed(60.0)
                        .with_rule(MotionRule::Jitter { strength: 20.0 })
                        .with_rule(MotionRule::SpeedLimit { min: 40.0, max: 90.0 })
                        .tint(Tint {
                            field: "temperature".into(),
                            palette: Palette::Thermal,
                            min: 12_000.0,
                            max: 1000.0,
                        }),
                ),
        )
        .plot(
            PlotSpec::new(PLOT)
                .title("Spectral radiance")
                .x_axis(AxisSpec::log().label("λ").formatter(Formatter::engineering("m")).minor_grid())
                .y_axis(AxisSpec::linear().label("B(λ, T)").grow())
                .series(PlotSeries::area("radiance", Color::AMBER))
                .reference(ReferenceLine::vertical(RefValue::Scalar("peak".into()), Color::WHITE).label("λ peak"))
                .band(VISIBLE_MIN, VISIBLE_MAX, Color::GREEN.with_alpha(0.12), "visible"),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("peak", "λ peak"),
                ReadoutEntry::text("region", "Region").color_from(ColorRule::Label {
                    label: "region".into(),
                    map: region_colors,
                }),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(BlackBody))
}
