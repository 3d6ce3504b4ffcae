//! Binomial distribution with a highlighted outcome.

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

pub const PLOT: &str = "binomial-plot";
pub const READOUT: &str = "binomial-readout";

const MAX_TRIALS: f64 = 50.0;

/// `n choose k` as a float, exact for the sizes a slider allows.
pub fn choose(n: u32, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}

/// `P(X = k)` for `X ~ B(n, p)`.
pub fn pmf(n: u32, p: f64, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }
    choose(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Binomial;

impl ModelInfo for Binomial {
    fn declare(&self) -> ModelDeclaration {
        ModelDeclaration::new()
            .parameters(&["n", "p", "k"])
            .scalar(ScalarDecl::new("pmf").range(0.0, 1.0).formatter(Formatter::fixed(8, "")))
            .scalar(ScalarDecl::new("mean").formatter(Formatter::fixed(2, "")))
            .scalar(ScalarDecl::new("variance").formatter(Formatter::fixed(2, "")))
            .series(SeriesDecl::new("pmf").eviction(Eviction::Ring { max_len: 64 }))
    }

    fn hot_swap(&self) -> HotSwap {
        HotSwap::Continue
    }
}

impl ClosedFormModel for Binomial {
    fn evaluate(&self, params: &ParamValues, _origin: &ModelState, _t: f64) -> Snapshot {
        let n = params.get("n");
        let p = params.get("p");
        let k = params.get("k");
        if !(0.0..=1.0).contains(&p) || !(n >= 0.0) || !(k >= 0.0) {
            return Snapshot::empty().invalid("parameters out of range");
        }
        let (n, k) = (n.round() as u32, k.round() as u32);
        if k > n {
            return Snapshot::empty().invalid("k cannot exceed the number of trials");
        }

        let bars = (0..=n).map(|i| (f64::from(i), pmf(n, p, i))).collect();
        Snapshot::empty()
            .with_scalar("pmf", pmf(n, p, k))
            .with_scalar("mean", f64::from(n) * p)
            .with_scalar("variance", f64::from(n) * p * (1.0 - p))
            .with_series("pmf", bars)
    }
}

fn schema() -> SampleSchema {
    SampleSchema::new("binomial", "Binomial Distribution")
        .describe("Probability of k successes in n independent trials.")
        .param(ParamSpec::linear("n", 1.0, MAX_TRIALS, 1.0, 10.0).label("Trials n").formatter(Formatter::integer("")))
        .param(ParamSpec::linear("p", 0.0, 1.0, 0.01, 0.5).label("Success probability p"))
        .param(ParamSpec::linear("k", 0.0, MAX_TRIALS, 1.0, 5.0).label("Successes k").formatter(Formatter::integer("")))
        .plot(
            PlotSpec::new(PLOT)
                .title("P(X = k)")
                .x_axis(AxisSpec::linear().label("k").formatter(Formatter::integer("")))
                .y_axis(AxisSpec::linear().label("probability").grow())
                .series(PlotSeries::bars("pmf", Color::CYAN).highlight("k", Color::AMBER))
                .reference(ReferenceLine::vertical(RefValue::Scalar("mean".into()), Color::GRID).label("mean")),
        )
        .readout(ReadoutSpec {
            container: READOUT.into(),
            entries: vec![
                ReadoutEntry::scalar("pmf", "P(X = k)"),
                ReadoutEntry::scalar("mean", "Mean"),
                ReadoutEntry::scalar("variance", "Variance"),
            ],
        })
}

pub fn sample() -> Sample {
    Sample::new(schema(), Model::closed_form(Binomial))
}
