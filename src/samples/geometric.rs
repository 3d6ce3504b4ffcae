//! Geometric series: terms, partial sum and limit.

use crate::format::Formatter;
use crate::model::{
    ClosedFormModel, HotSwap, Model, ModelDeclaration, ModelInfo, ModelState, ScalarDecl,
    SeriesDecl, Snapshot,
};
use crate::params::{ParamSpec, ParamValues};
use crate::plot::{AxisSpec, PlotSeries, PlotSpec, RefValue, ReferenceLine};
use crate::readout::{ReadoutEntry, ReadoutSpec};
use crate::series::Eviction;
use crate::shell::{Sample, SampleSchema};
use crate::visuals::Color;

pub const PLOT: &str = "geometric-plot";
pub const READOUT: &str = "geometric-readout";

const MAX_TERMS: f64 = 60.0;

/// `a + a·r + … + a·r^(n−1)`, summed term by term.
pub fn partial_sum(a: f64, r: f64, n: u32) -> f64 {
    terms(a, r, n).sum()
}

/// `a / (1 − r)`, defined only for `|r| < 1`.
pub fn infinite_sum(a: f64, r: f64) -> Option<f64> {
    (r.abs() < 1.0).then(|| a / (1.0 - r))
}

fn terms(a: f64, r: f64, n: u32) -> impl Iterator<Item = f64> {
    (0..n).scan(a, move |term, _| {
        let current = *term;
        *term *= r;
        Some(current)
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Geometric;

impl ModelInfo for Geometric {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["a", "r", "n"])
            .scalar(ScalarDecl::new("sum").formatter(Formatter::fixed(9, "")))
            .scalar(ScalarDecl::new("limit"))
            .series(SeriesDecl::new("terms").eviction(Eviction::Ring { max_len: 64 }))
            .series(SeriesDecl::new("partial").eviction(Eviction::Ring { max_len: 64 }))
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for Geometric {
    fn evaluate(&self, params: &ParamValues, _origin: &ModelState, _t: f64) -> Snapshot {
        let a = params.get("a");
        let r = params.get("r");
        let n = params.get("n");
        if !(n >= 1.0) {
            return Snapshot::empty().invalid("at least one term is required");
        }
        let n = n.round() as u32;

        let mut running = 0.0;
        let mut bars = Vec::with_capacity(n as usize);
        let mut partials = Vec::with_capacity(n as usize);
        for (k, term) in terms(a, r, n).enumerate() {
            running += term;
            bars.push((k as f64, term));
            partials.push((k as f64, running));
        }

        Snapshot::empty()
            .with_scalar("sum", running)
            .with_scalar("limit", infinite_sum(a, r).unwrap_or(f64::NAN))
            .with_series("terms", bars)
            .with_series("partial", partials)
    }
}

fn schema() -> SampleSchema {
    SampleSchema::new("geometric", "Geometric Series")
        .describe("Partial sums of a·rᵏ and their limit when |r| < 1.")
        .param(ParamSpec::linear("a", -5.0, 5.0, 0.1, 1.0).label("First term a"))
        .param(ParamSpec::linear("r", -1.5, 1.5, 0.05, 0.5).label("Ratio r"))
        .param(ParamSpec::linear("n", 1.0, MAX_TERMS, 1.0, 10.0).label("Terms n").formatter(Formatter::integer("")))
        .plot(
            PlotSpec::new(PLOT)
                .title("Terms and partial sums")
                .x_axis(AxisSpec::linear().label("k").formatter(Formatter::integer("")))
                .y_axis(AxisSpec::linear().grow())
                .series(PlotSeries::bars("terms", Color::CYAN).label("a·rᵏ"))
                .series(PlotSeries::line("partial", Color::AMBER).label("Sₖ").with_marker())
                .reference(ReferenceLine::horizontal(RefValue::Scalar("limit".into()), Color::GREEN).label("limit"))
                .legend(),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("sum", "Partial sum"),
                ReadoutEntry::scalar("limit", "Infinite sum").fallback("diverges"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(Geometric))
}
