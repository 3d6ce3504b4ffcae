//! Axis scales, tick generation and autoscale policies.

use serde::{Deserialize, Serialize};

use crate::format::Formatter;
use crate::model::DomainPolicy;

/// Headroom added above the observed maximum by [`Autoscale::GrowToMax`].
pub const HEADROOM: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    #[default]
    Linear,
    Log,
}

/// How an axis picks its visible range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Autoscale {
    Fixed { min: f64, max: f64 },
    /// Max follows the largest value seen, plus headroom. Min is 0 unless
    /// data go negative.
    GrowToMax,
    /// Show `[latest − width, latest]`. Meant for the time axis.
    SlidingWindow { width: f64 },
    /// Follow the plotted series' declared domain policy.
    #[default]
    Auto,
}

/// Declared axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisSpec {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub scale: AxisScale,
    #[serde(default)]
    pub autoscale: Autoscale,
    #[serde(default)]
    pub formatter: Formatter,
    #[serde(default = "default_true")]
    pub grid: bool,
    /// Minor gridlines between powers of ten on log axes.
    #[serde(default)]
    pub minor_grid: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AxisSpec {
    fn default() -> Self {
        Self {
            label: None,
            scale: AxisScale::Linear,
            autoscale: Autoscale::Auto,
            formatter: Formatter::default(),
            grid: true,
            minor_grid: false,
        }
    }
}

impl AxisSpec {
    pub fn linear() -> Self {
        Self::default()
    }

    pub fn log() -> Self {
        Self {
            scale: AxisScale::Log,
            ..Self::default()
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn fixed(mut self, min: f64, max: f64) -> Self {
        self.autoscale = Autoscale::Fixed { min, max };
        self
    }

    pub fn grow(mut self) -> Self {
        self.autoscale = Autoscale::GrowToMax;
        self
    }

    pub fn sliding(mut self, width: f64) -> Self {
        self.autoscale = Autoscale::SlidingWindow { width };
        self
    }

    pub fn minor_grid(mut self) -> Self {
        self.minor_grid = true;
        self
    }

    /// Resolve `Auto` against a series domain policy.
    pub fn resolved(&self, domain: Option<DomainPolicy>) -> (Autoscale, AxisScale) {
        match (self.autoscale, domain) {
            (Autoscale::Auto, Some(DomainPolicy::FixedWindow { span })) => {
                (Autoscale::SlidingWindow { width: span }, self.scale)
            }
            (Autoscale::Auto, Some(DomainPolicy::LogX)) => (Autoscale::GrowToMax, AxisScale::Log),
            (Autoscale::Auto, _) => (Autoscale::GrowToMax, self.scale),
            (policy, _) => (policy, self.scale),
        }
    }
}

/// One labelled tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub label: String,
}

/// Number of step multiples inside `[min, max]`.
fn tick_count(min: f64, max: f64, step: f64) -> i64 {
    (max / step).floor() as i64 - (min / step).ceil() as i64 + 1
}

/// Tick spacing from `{1, 2, 5}·10ᵏ` giving 4 to 6 ticks inside `[min, max]`.
///
/// The smallest qualifying step wins. Some ranges (`0..12`) have no such
/// step; those take the step whose count lies nearest the window, and the
/// sparser one on a tie.
pub fn nice_step(min: f64, max: f64) -> f64 {
    let span = max - min;
    if !(min.is_finite() && max.is_finite()) || span <= 0.0 {
        return 1.0;
    }
    let mut best = (i64::MAX, 1.0);
    let mut k = (span / 6.0).log10().floor() as i32 - 1;
    loop {
        let base = 10f64.powi(k);
        for m in [1.0, 2.0, 5.0] {
            let step = m * base;
            let n = tick_count(min, max, step);
            if (4..=6).contains(&n) {
                return step;
            }
            let miss = if n > 6 { n - 6 } else { 4 - n };
            if miss <= best.0 {
                best = (miss, step);
            }
            if n < 4 {
                return best.1;
            }
        }
        k += 1;
    }
}

/// Linear ticks inside `[min, max]`.
pub fn linear_ticks(min: f64, max: f64, formatter: &Formatter) -> Vec<Tick> {
    if !(min.is_finite() && max.is_finite()) || max <= min {
        return Vec::new();
    }
    let step = nice_step(min, max);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last)
        .map(|i| {
            let value = i as f64 * step;
            // Snap float noise around zero.
            let value = if value.abs() < step * 1e-9 { 0.0 } else { value };
            Tick {
                value,
                label: formatter.format(value),
            }
        })
        .collect()
}

/// Ticks at integer powers of ten inside `[min, max]`.
pub fn log_ticks(min: f64, max: f64, formatter: &Formatter) -> Vec<Tick> {
    if !(min > 0.0 && max > min && max.is_finite()) {
        return Vec::new();
    }
    let lo = (min.log10() - 1e-9).ceil() as i32;
    let hi = (max.log10() + 1e-9).floor() as i32;
    (lo..=hi)
        .map(|k| {
            let value = 10f64.powi(k);
            Tick {
                value,
                label: formatter.format(value),
            }
        })
        .collect()
}

/// Minor gridline positions `2..9 × 10ᵏ` inside `[min, max]`.
pub fn log_minor(min: f64, max: f64) -> Vec<f64> {
    if !(min > 0.0 && max > min && max.is_finite()) {
        return Vec::new();
    }
    let lo = min.log10().floor() as i32;
    let hi = max.log10().ceil() as i32;
    (lo..hi)
        .flat_map(|k| (2..10).map(move |m| m as f64 * 10f64.powi(k)))
        .filter(|v| *v > min && *v < max)
        .collect()
}

/// Visible range of one axis, remembered across frames for grow-to-max.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisRange {
    observed: Option<(f64, f64)>,
}

impl AxisRange {
    pub fn reset(&mut self) {
        self.observed = None;
    }

    /// Range for this frame.
    ///
    /// `data` is the extent of the visible data, `latest` the newest
    /// coordinate (used by sliding windows).
    pub fn resolve(
        &mut self,
        policy: Autoscale,
        scale: AxisScale,
        data: Option<(f64, f64)>,
        latest: f64,
    ) -> (f64, f64) {
        let range = match policy {
            Autoscale::Fixed { min, max } => (min, max),
            Autoscale::SlidingWindow { width } => {
                let width = if width > 0.0 { width } else { 1.0 };
                let end = latest.max(width);
                (end - width, end)
            }
            Autoscale::GrowToMax | Autoscale::Auto => {
                if let Some((lo, hi)) = data {
                    self.observed = Some(match self.observed {
                        Some((a, b)) => (a.min(lo), b.max(hi)),
                        None => (lo, hi),
                    });
                }
                match (self.observed, scale) {
                    (Some((lo, hi)), AxisScale::Log) => log_bounds(lo, hi),
                    (Some((lo, hi)), AxisScale::Linear) => {
                        let hi = if hi > 0.0 { hi * (1.0 + HEADROOM) } else { 0.0 };
                        let lo = if lo < 0.0 { lo * (1.0 + HEADROOM) } else { 0.0 };
                        (lo, hi)
                    }
                    (None, AxisScale::Log) => (1.0, 10.0),
                    (None, AxisScale::Linear) => (0.0, 1.0),
                }
            }
        };
        sanitize(range, scale)
    }
}

fn log_bounds(lo: f64, hi: f64) -> (f64, f64) {
    let lo = if lo > 0.0 { lo } else { hi / 1e3 };
    if !(hi > 0.0) {
        return (1.0, 10.0);
    }
    (
        10f64.powf((lo.log10() + 1e-9).floor()),
        10f64.powf((hi.log10() - 1e-9).ceil()),
    )
}

fn sanitize((lo, hi): (f64, f64), scale: AxisScale) -> (f64, f64) {
    match scale {
        AxisScale::Log => {
            let lo = if lo > 0.0 && lo.is_finite() { lo } else { 1.0 };
            let hi = if hi > lo && hi.is_finite() { hi } else { lo * 10.0 };
            (lo, hi)
        }
        AxisScale::Linear => {
            if !(lo.is_finite() && hi.is_finite()) {
                (0.0, 1.0)
            } else if hi > lo {
                (lo, hi)
            } else if lo == 0.0 {
                (0.0, 1.0)
            } else {
                let pad = lo.abs() * 0.1;
                (lo - pad, hi + pad)
            }
        }
    }
}

/// Maps data values to pixel coordinates along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMap {
    pub min: f64,
    pub max: f64,
    pub scale: AxisScale,
    /// Pixel at `min`.
    pub from: f64,
    /// Pixel at `max`.
    pub to: f64,
}

impl AxisMap {
    /// Pixel for `v`. Non-positive values on a log axis map to `None`.
    pub fn map(&self, v: f64) -> Option<f64> {
        let t = match self.scale {
            AxisScale::Linear => (v - self.min) / (self.max - self.min),
            AxisScale::Log => {
                if v <= 0.0 {
                    return None;
                }
                (v.log10() - self.min.log10()) / (self.max.log10() - self.min.log10())
            }
        };
        t.is_finite().then(|| self.from + t * (self.to - self.from))
    }

    /// Pixel for `v`, with out-of-domain values pinned to the axis start.
    pub fn map_or_start(&self, v: f64) -> f64 {
        self.map(v).unwrap_or(self.from)
    }

    pub fn ticks(&self, formatter: &Formatter) -> Vec<Tick> {
        match self.scale {
            AxisScale::Linear => linear_ticks(self.min, self.max, formatter),
            AxisScale::Log => log_ticks(self.min, self.max, formatter),
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}
