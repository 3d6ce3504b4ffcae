//! Plot renderer: axes, gridlines, series, references and a current-point
//! marker drawn from the driver's history buffers.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, SchemaError};
use crate::model::ModelDeclaration;
use crate::params::{ParamValues, ParameterStore};
use crate::plot::axis::{log_minor, AxisMap, AxisRange, AxisScale, AxisSpec};
use crate::render::{Frame, RenderHost, Renderer};
use crate::series::{History, SeriesBuffer, SeriesPoint};
use crate::surface::{CanvasSize, Font, Paint, Surface, TextAlign, TextBaseline};
use crate::visuals::Color;

const STALE_ALPHA: f64 = 0.4;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 12.0;
const MARGIN_BOTTOM: f64 = 36.0;
const TITLE_HEIGHT: f64 = 18.0;
const MARKER_RADIUS: f64 = 4.0;
const DASH: [f64; 2] = [5.0, 4.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStyle {
    #[default]
    Line,
    /// Vertical bars from the zero line.
    Bar,
    /// Filled region under the line.
    Area,
}

/// Highlight the bar whose `t` matches a parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub param: String,
    pub color: Color,
}

fn default_series_color() -> Color {
    Color::CYAN
}

fn default_line_width() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotSeries {
    /// Declared series name in history.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub style: SeriesStyle,
    #[serde(default = "default_series_color")]
    pub color: Color,
    /// Index into the plot's y axes.
    #[serde(default)]
    pub y_axis: usize,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    #[serde(default)]
    pub highlight: Option<Highlight>,
    /// Draw the current-point marker for this series.
    #[serde(default)]
    pub marker: bool,
}

impl PlotSeries {
    pub fn line(name: &str, color: Color) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            style: SeriesStyle::Line,
            color,
            y_axis: 0,
            line_width: default_line_width(),
            highlight: None,
            marker: false,
        }
    }

    pub fn bars(name: &str, color: Color) -> Self {
        Self {
            style: SeriesStyle::Bar,
            ..Self::line(name, color)
        }
    }

    pub fn area(name: &str, color: Color) -> Self {
        Self {
            style: SeriesStyle::Area,
            ..Self::line(name, color)
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn on_axis(mut self, y_axis: usize) -> Self {
        self.y_axis = y_axis;
        self
    }

    pub fn highlight(mut self, param: &str, color: Color) -> Self {
        self.highlight = Some(Highlight {
            param: param.to_string(),
            color,
        });
        self
    }

    pub fn with_marker(mut self) -> Self {
        self.marker = true;
        self
    }
}

/// Where a reference line takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefValue {
    Const(f64),
    Scalar(String),
    Param(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Constant `y` on the anchoring y axis.
    #[default]
    Horizontal,
    /// Constant `x`.
    Vertical,
}

/// Dashed reference line (steady state, setpoint, cutoff, threshold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLine {
    pub value: RefValue,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub y_axis: usize,
    pub color: Color,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_true")]
    pub dashed: bool,
}

impl ReferenceLine {
    pub fn horizontal(value: RefValue, color: Color) -> Self {
        Self {
            value,
            orientation: Orientation::Horizontal,
            y_axis: 0,
            color,
            label: None,
            dashed: true,
        }
    }

    pub fn vertical(value: RefValue, color: Color) -> Self {
        Self {
            orientation: Orientation::Vertical,
            ..Self::horizontal(value, color)
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn on_axis(mut self, y_axis: usize) -> Self {
        self.y_axis = y_axis;
        self
    }

    fn resolve(&self, snapshot: &crate::model::Snapshot, params: &ParamValues) -> Option<f64> {
        let v = match &self.value {
            RefValue::Const(v) => Some(*v),
            RefValue::Scalar(name) => snapshot.scalar(name),
            RefValue::Param(name) => params.try_get(name),
        }?;
        v.is_finite().then_some(v)
    }
}

/// Shaded span along the x axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub from: f64,
    pub to: f64,
    pub color: Color,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotSpec {
    pub canvas_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_axis: AxisSpec,
    #[serde(default)]
    pub y_axes: Vec<AxisSpec>,
    pub series: Vec<PlotSeries>,
    #[serde(default)]
    pub references: Vec<ReferenceLine>,
    #[serde(default)]
    pub bands: Vec<Band>,
    #[serde(default)]
    pub legend: bool,
    #[serde(default)]
    pub background: Option<Color>,
}

impl PlotSpec {
    pub fn new(canvas_id: &str) -> Self {
        Self {
            canvas_id: canvas_id.to_string(),
            title: None,
            x_axis: AxisSpec::default(),
            y_axes: Vec::new(),
            series: Vec::new(),
            references: Vec::new(),
            bands: Vec::new(),
            legend: false,
            background: Some(Color::BACKGROUND),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn x_axis(mut self, axis: AxisSpec) -> Self {
        self.x_axis = axis;
        self
    }

    pub fn y_axis(mut self, axis: AxisSpec) -> Self {
        self.y_axes.push(axis);
        self
    }

    pub fn series(mut self, series: PlotSeries) -> Self {
        self.series.push(series);
        self
    }

    pub fn reference(mut self, line: ReferenceLine) -> Self {
        self.references.push(line);
        self
    }

    pub fn band(mut self, from: f64, to: f64, color: Color, label: &str) -> Self {
        self.bands.push(Band {
            from,
            to,
            color,
            label: Some(label.to_string()),
        });
        self
    }

    pub fn legend(mut self) -> Self {
        self.legend = true;
        self
    }
}

/// Resolved geometry of the last drawn frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotLayout {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub x: AxisMap,
    pub y: Vec<AxisMap>,
}

impl PlotLayout {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Indices to draw when `points` must fit in `width` pixels: every
/// `⌈len / width⌉`-th point. Each parameter revision is sampled on its own
/// so no stride bucket spans an edit, and the last point of every revision
/// is kept.
pub fn downsample_indices(points: &[&SeriesPoint], width: usize) -> Vec<usize> {
    let len = points.len();
    if len == 0 {
        return Vec::new();
    }
    let stride = len.div_ceil(width.max(1)).max(1);
    let mut idx = Vec::new();
    let mut start = 0;
    while start < len {
        let revision = points[start].revision;
        let end = points[start..]
            .iter()
            .position(|p| p.revision != revision)
            .map_or(len, |n| start + n);
        idx.extend((start..end).step_by(stride));
        if idx.last() != Some(&(end - 1)) {
            idx.push(end - 1);
        }
        start = end;
    }
    idx
}

/// Smallest positive gap between consecutive sample times.
fn min_spacing(points: &[&SeriesPoint]) -> Option<f64> {
    points
        .windows(2)
        .map(|w| w[1].t - w[0].t)
        .filter(|d| *d > 0.0 && d.is_finite())
        .min_by(|a, b| a.total_cmp(b))
}

fn extend(range: Option<(f64, f64)>, lo: f64, hi: f64) -> Option<(f64, f64)> {
    Some(match range {
        Some((a, b)) => (a.min(lo), b.max(hi)),
        None => (lo, hi),
    })
}

/// Draws a [`PlotSpec`] from history.
#[derive(Debug, Clone)]
pub struct PlotRenderer {
    spec: PlotSpec,
    x_range: AxisRange,
    y_ranges: Vec<AxisRange>,
    signature: Option<(u64, u64)>,
    layout: Option<PlotLayout>,
}

impl PlotRenderer {
    pub fn new(
        mut spec: PlotSpec,
        store: &ParameterStore,
        decl: &ModelDeclaration,
    ) -> Result<Self, SchemaError> {
        if spec.y_axes.is_empty() {
            spec.y_axes.push(AxisSpec::default());
        }
        let axes = spec.y_axes.len();
        let undeclared = |kind: &'static str, name: &str| SchemaError::UndeclaredReference {
            kind,
            name: name.to_string(),
        };

        for series in &spec.series {
            if decl.series_decl(&series.name).is_none() {
                return Err(undeclared("series", &series.name));
            }
            if series.y_axis >= axes {
                return Err(undeclared("y axis", &series.y_axis.to_string()));
            }
            if let Some(h) = &series.highlight {
                if !store.contains(&h.param) {
                    return Err(undeclared("parameter", &h.param));
                }
            }
        }
        for line in &spec.references {
            match &line.value {
                RefValue::Scalar(name) if decl.scalar_decl(name).is_none() => {
                    return Err(undeclared("scalar", name));
                }
                RefValue::Param(name) if !store.contains(name) => {
                    return Err(undeclared("parameter", name));
                }
                _ => {}
            }
            if line.y_axis >= axes {
                return Err(undeclared("y axis", &line.y_axis.to_string()));
            }
        }

        Ok(Self {
            y_ranges: vec![AxisRange::default(); axes],
            spec,
            x_range: AxisRange::default(),
            signature: None,
            layout: None,
        })
    }

    pub fn spec(&self) -> &PlotSpec {
        &self.spec
    }

    /// Geometry of the most recently drawn frame.
    pub fn layout(&self) -> Option<&PlotLayout> {
        self.layout.as_ref()
    }

    fn margins(&self, size: CanvasSize) -> (f64, f64, f64, f64) {
        let right_extra = if self.spec.y_axes.len() > 1 {
            MARGIN_LEFT - MARGIN_RIGHT
        } else {
            0.0
        };
        let top_extra = if self.spec.title.is_some() {
            TITLE_HEIGHT
        } else {
            0.0
        };
        (
            MARGIN_LEFT,
            MARGIN_TOP + top_extra,
            size.css_width - MARGIN_RIGHT - right_extra,
            size.css_height - MARGIN_BOTTOM,
        )
    }

    fn buffers<'h>(&self, history: &'h History) -> Vec<Option<&'h SeriesBuffer>> {
        self.spec
            .series
            .iter()
            .map(|s| history.get(&s.name))
            .collect()
    }

    /// Drop remembered ranges when the data were replaced or reset.
    fn check_signature(&mut self, frame: &Frame<'_>) {
        let generations = self
            .buffers(frame.history)
            .iter()
            .flatten()
            .fold(0u64, |acc, b| acc.wrapping_add(b.generation()));
        let signature = (frame.epoch, generations);
        if self.signature != Some(signature) {
            self.signature = Some(signature);
            self.x_range.reset();
            self.y_ranges.iter_mut().for_each(AxisRange::reset);
        }
    }

    fn compute_layout(&mut self, frame: &Frame<'_>, size: CanvasSize) -> PlotLayout {
        let (left, top, right, bottom) = self.margins(size);
        let buffers = self.buffers(frame.history);
        let domain = self
            .spec
            .series
            .first()
            .and_then(|s| frame.history.domain(&s.name));
        let (x_policy, x_scale) = self.spec.x_axis.resolved(domain);

        let mut x_data = None;
        let mut latest = f64::NEG_INFINITY;
        for (series, buf) in self.spec.series.iter().zip(&buffers) {
            let Some(buf) = buf else { continue };
            let Some((lo, hi)) = buf.time_range() else { continue };
            latest = latest.max(hi);
            let pad = if series.style == SeriesStyle::Bar {
                let points: Vec<&SeriesPoint> = buf.iter().collect();
                min_spacing(&points).unwrap_or(1.0) / 2.0
            } else {
                0.0
            };
            x_data = extend(x_data, lo - pad, hi + pad);
        }
        if !latest.is_finite() {
            latest = frame.sim_time;
        }
        let (x_min, x_max) = self.x_range.resolve(x_policy, x_scale, x_data, latest);
        let x = AxisMap {
            min: x_min,
            max: x_max,
            scale: x_scale,
            from: left,
            to: right,
        };

        let mut y = Vec::with_capacity(self.spec.y_axes.len());
        for (axis_index, axis) in self.spec.y_axes.iter().enumerate() {
            let mut data = None;
            for (series, buf) in self.spec.series.iter().zip(&buffers) {
                let Some(buf) = buf else { continue };
                if series.y_axis != axis_index {
                    continue;
                }
                for p in buf.iter() {
                    if p.value.is_finite() && x.contains(p.t) {
                        data = extend(data, p.value, p.value);
                    }
                }
            }
            let (policy, scale) = axis.resolved(None);
            let (min, max) = self.y_ranges[axis_index].resolve(policy, scale, data, 0.0);
            y.push(AxisMap {
                min,
                max,
                scale,
                from: bottom,
                to: top,
            });
        }

        PlotLayout {
            left,
            top,
            right,
            bottom,
            x,
            y,
        }
    }

    fn draw_grid(&self, s: &mut dyn Surface, layout: &PlotLayout) {
        let font = Font::new(10.0);
        s.set_font(font);
        s.set_line_dash(&[]);
        s.set_line_width(1.0);

        let x_ticks = layout.x.ticks(&self.spec.x_axis.formatter);
        s.set_text_align(TextAlign::Center, TextBaseline::Top);
        for tick in &x_ticks {
            let Some(px) = layout.x.map(tick.value) else { continue };
            if self.spec.x_axis.grid {
                s.set_stroke(Paint::Solid(Color::GRID));
                s.stroke_line(px, layout.top, px, layout.bottom);
            }
            s.set_fill(Paint::Solid(Color::AXIS));
            s.fill_text(&tick.label, px, layout.bottom + 4.0);
        }
        if self.spec.x_axis.minor_grid && layout.x.scale == AxisScale::Log {
            s.set_stroke(Paint::Solid(Color::GRID.with_alpha(0.05)));
            for v in log_minor(layout.x.min, layout.x.max) {
                let px = layout.x.map_or_start(v);
                s.stroke_line(px, layout.top, px, layout.bottom);
            }
        }

        for (i, (axis, map)) in self.spec.y_axes.iter().zip(&layout.y).enumerate() {
            let (x_label, align) = if i == 0 {
                (layout.left - 6.0, TextAlign::Right)
            } else {
                (layout.right + 6.0, TextAlign::Left)
            };
            s.set_text_align(align, TextBaseline::Middle);
            for tick in map.ticks(&axis.formatter) {
                let Some(py) = map.map(tick.value) else { continue };
                if axis.grid && i == 0 {
                    s.set_stroke(Paint::Solid(Color::GRID));
                    s.stroke_line(layout.left, py, layout.right, py);
                }
                s.set_fill(Paint::Solid(Color::AXIS));
                s.fill_text(&tick.label, x_label, py);
            }
            if axis.minor_grid && map.scale == AxisScale::Log && i == 0 {
                s.set_stroke(Paint::Solid(Color::GRID.with_alpha(0.05)));
                for v in log_minor(map.min, map.max) {
                    let py = map.map_or_start(v);
                    s.stroke_line(layout.left, py, layout.right, py);
                }
            }
            if let Some(label) = &axis.label {
                s.set_text_align(align, TextBaseline::Bottom);
                s.fill_text(label, x_label, layout.top - 2.0);
            }
        }

        s.set_stroke(Paint::Solid(Color::AXIS));
        s.stroke_line(layout.left, layout.bottom, layout.right, layout.bottom);
        s.stroke_line(layout.left, layout.top, layout.left, layout.bottom);
        if layout.y.len() > 1 {
            s.stroke_line(layout.right, layout.top, layout.right, layout.bottom);
        }
        if let Some(label) = &self.spec.x_axis.label {
            s.set_fill(Paint::Solid(Color::AXIS));
            s.set_text_align(TextAlign::Center, TextBaseline::Bottom);
            s.fill_text(label, (layout.left + layout.right) / 2.0, layout.bottom + MARGIN_BOTTOM - 2.0);
        }
    }

    fn draw_bands(&self, s: &mut dyn Surface, layout: &PlotLayout) {
        for band in &self.spec.bands {
            let (Some(a), Some(b)) = (layout.x.map(band.from), layout.x.map(band.to)) else {
                continue;
            };
            let (x0, x1) = (a.min(b).max(layout.left), a.max(b).min(layout.right));
            if x1 <= x0 {
                continue;
            }
            s.set_fill(Paint::Solid(band.color));
            s.fill_rect(x0, layout.top, x1 - x0, layout.height());
            if let Some(label) = &band.label {
                s.set_fill(Paint::Solid(Color::TEXT.with_alpha(0.7)));
                s.set_font(Font::new(10.0));
                s.set_text_align(TextAlign::Center, TextBaseline::Top);
                s.fill_text(label, (x0 + x1) / 2.0, layout.top + 2.0);
            }
        }
    }

    fn draw_series(
        &self,
        s: &mut dyn Surface,
        layout: &PlotLayout,
        series: &PlotSeries,
        buf: &SeriesBuffer,
        params: &ParamValues,
    ) {
        let Some(ymap) = layout.y.get(series.y_axis) else {
            return;
        };
        let points: Vec<&SeriesPoint> = buf.iter().collect();
        match series.style {
            SeriesStyle::Bar => draw_bars(s, layout, ymap, series, &points, params),
            SeriesStyle::Line | SeriesStyle::Area => {
                let width = layout.width().max(1.0) as usize;
                let picked: Vec<&SeriesPoint> = downsample_indices(&points, width)
                    .into_iter()
                    .map(|i| points[i])
                    .collect();
                for run in runs(&picked, &layout.x, ymap) {
                    if series.style == SeriesStyle::Area && run.len() > 1 {
                        fill_area(s, &run, ymap, series.color);
                    }
                    stroke_run(s, &run, series);
                }
            }
        }
    }

    fn draw_references(&self, s: &mut dyn Surface, layout: &PlotLayout, frame: &Frame<'_>) {
        let snap = frame.display_snapshot();
        s.set_font(Font::new(10.0));
        for line in &self.spec.references {
            let Some(v) = line.resolve(snap, frame.params) else {
                continue;
            };
            s.set_stroke(Paint::Solid(line.color));
            s.set_line_width(1.25);
            let dash: &[f64] = if line.dashed { &DASH } else { &[] };
            s.set_line_dash(dash);
            s.set_fill(Paint::Solid(line.color));
            match line.orientation {
                Orientation::Horizontal => {
                    let Some(py) = layout.y.get(line.y_axis).and_then(|m| m.map(v)) else {
                        continue;
                    };
                    s.stroke_line(layout.left, py, layout.right, py);
                    if let Some(label) = &line.label {
                        s.set_text_align(TextAlign::Right, TextBaseline::Bottom);
                        s.fill_text(label, layout.right - 4.0, py - 3.0);
                    }
                }
                Orientation::Vertical => {
                    let Some(px) = layout.x.map(v) else { continue };
                    s.stroke_line(px, layout.top, px, layout.bottom);
                    if let Some(label) = &line.label {
                        s.set_text_align(TextAlign::Left, TextBaseline::Top);
                        s.fill_text(label, px + 4.0, layout.top + 14.0);
                    }
                }
            }
        }
        s.set_line_dash(&[]);
    }

    fn draw_marker(&self, s: &mut dyn Surface, layout: &PlotLayout, series: &PlotSeries, buf: &SeriesBuffer) {
        let Some(ymap) = layout.y.get(series.y_axis) else {
            return;
        };
        let Some(p) = buf.iter().rev().find(|p| p.value.is_finite()) else {
            return;
        };
        let (Some(x), Some(y)) = (layout.x.map(p.t), ymap.map(p.value)) else {
            return;
        };
        s.set_stroke(Paint::Solid(series.color.with_alpha(0.7)));
        s.set_line_width(1.0);
        s.set_line_dash(&DASH);
        s.stroke_line(x, y, x, layout.bottom);
        s.set_line_dash(&[]);
        s.set_fill(Paint::Solid(series.color));
        s.fill_circle(x, y, MARKER_RADIUS);
    }

    fn draw_legend(&self, s: &mut dyn Surface, layout: &PlotLayout) {
        s.set_font(Font::new(10.0));
        s.set_text_align(TextAlign::Left, TextBaseline::Middle);
        let mut y = layout.top + 10.0;
        for series in &self.spec.series {
            let label = series.label.as_deref().unwrap_or(&series.name);
            s.set_fill(Paint::Solid(series.color));
            s.fill_rect(layout.left + 8.0, y - 4.0, 10.0, 8.0);
            s.set_fill(Paint::Solid(Color::TEXT));
            s.fill_text(label, layout.left + 22.0, y);
            y += 14.0;
        }
    }
}

/// Split points into contiguous runs of drawable pixels. Non-finite values,
/// out-of-domain log coordinates and parameter edits break the line.
fn runs(points: &[&SeriesPoint], x: &AxisMap, y: &AxisMap) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut revision = None;
    for p in points {
        if revision != Some(p.revision) && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        revision = Some(p.revision);
        let mapped = if p.value.is_finite() && p.t.is_finite() {
            x.map(p.t).zip(y.map(p.value))
        } else {
            None
        };
        match mapped {
            Some(px) => current.push(px),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn baseline(y: &AxisMap) -> f64 {
    if y.contains(0.0) {
        y.map_or_start(0.0)
    } else if y.scale == AxisScale::Linear && y.max < 0.0 {
        y.to
    } else {
        y.from
    }
}

fn stroke_run(s: &mut dyn Surface, run: &[(f64, f64)], series: &PlotSeries) {
    s.set_stroke(Paint::Solid(series.color));
    s.set_line_width(series.line_width);
    s.set_line_dash(&[]);
    s.begin_path();
    for (i, &(x, y)) in run.iter().enumerate() {
        if i == 0 {
            s.move_to(x, y);
        } else {
            s.line_to(x, y);
        }
    }
    s.stroke();
}

fn fill_area(s: &mut dyn Surface, run: &[(f64, f64)], y: &AxisMap, color: Color) {
    let base = baseline(y);
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    s.set_fill(Paint::Linear {
        from: (0.0, y.to),
        to: (0.0, y.from),
        stops: vec![(0.0, color.with_alpha(0.45)), (1.0, color.with_alpha(0.08))],
    });
    s.begin_path();
    s.move_to(first.0, base);
    for &(px, py) in run {
        s.line_to(px, py);
    }
    s.line_to(last.0, base);
    s.close_path();
    s.fill();
}

fn draw_bars(
    s: &mut dyn Surface,
    layout: &PlotLayout,
    ymap: &AxisMap,
    series: &PlotSeries,
    points: &[&SeriesPoint],
    params: &ParamValues,
) {
    let spacing = min_spacing(points).unwrap_or(1.0);
    let width = match (
        layout.x.map(0.0),
        layout.x.map(spacing),
    ) {
        (Some(a), Some(b)) if layout.x.scale == AxisScale::Linear => ((b - a).abs() * 0.8).max(1.0),
        _ => 4.0,
    };
    let highlighted = series.highlight.as_ref().and_then(|h| {
        params
            .try_get(&h.param)
            .filter(|v| v.is_finite())
            .map(|v| (v, h.color))
    });
    let base = baseline(ymap);

    for p in points {
        if !p.value.is_finite() {
            continue;
        }
        let (Some(x), Some(y)) = (layout.x.map(p.t), ymap.map(p.value)) else {
            continue;
        };
        let color = match highlighted {
            Some((v, c)) if (v - p.t).abs() < spacing / 2.0 => c,
            _ => series.color,
        };
        s.set_fill(Paint::Solid(color));
        s.fill_rect(x - width / 2.0, y.min(base), width, (base - y).abs());
    }
}

impl Renderer for PlotRenderer {
    fn name(&self) -> &str {
        "plot"
    }

    fn target(&self) -> &str {
        &self.spec.canvas_id
    }

    fn render(&mut self, frame: &Frame<'_>, host: &mut dyn RenderHost) -> Result<(), RenderError> {
        let surface = host
            .surface(&self.spec.canvas_id)
            .ok_or_else(|| RenderError::MissingTarget(self.spec.canvas_id.clone()))?;
        surface.check()?;

        let size = surface.size();
        surface.clear_rect(0.0, 0.0, size.css_width, size.css_height);
        if frame.teardown {
            self.layout = None;
            return Ok(());
        }
        if let Some(bg) = self.spec.background {
            surface.set_fill(Paint::Solid(bg));
            surface.fill_rect(0.0, 0.0, size.css_width, size.css_height);
        }

        self.check_signature(frame);
        let layout = self.compute_layout(frame, size);
        if layout.width() <= 0.0 || layout.height() <= 0.0 {
            self.layout = Some(layout);
            return Ok(());
        }

        let s = surface;
        s.save();
        s.clip_rect(layout.left, layout.top, layout.width(), layout.height());
        self.draw_bands(s, &layout);
        s.restore();

        self.draw_grid(s, &layout);

        s.save();
        s.clip_rect(layout.left, layout.top, layout.width(), layout.height());
        if frame.is_stale() {
            s.set_global_alpha(STALE_ALPHA);
        }
        let buffers = self.buffers(frame.history);
        for (series, buf) in self.spec.series.iter().zip(&buffers) {
            if let Some(buf) = buf {
                self.draw_series(s, &layout, series, buf, frame.params);
            }
        }
        self.draw_references(s, &layout, frame);
        for (series, buf) in self.spec.series.iter().zip(&buffers) {
            if let (true, Some(buf)) = (series.marker, buf) {
                self.draw_marker(s, &layout, series, buf);
            }
        }
        s.restore();

        if self.spec.legend {
            self.draw_legend(s, &layout);
        }
        if let Some(title) = &self.spec.title {
            s.set_fill(Paint::Solid(Color::TEXT));
            s.set_font(Font::new(12.0).bold());
            s.set_text_align(TextAlign::Center, TextBaseline::Top);
            s.fill_text(title, size.css_width / 2.0, 4.0);
        }

        self.layout = Some(layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverState;
    use crate::model::{SeriesDecl, Snapshot};
    use crate::params::ParamSpec;
    use crate::render::HeadlessHost;
    use crate::surface::DrawCommand;

    fn decl() -> ModelDeclaration {
        ModelDeclaration::new()
            .scalar(crate::model::ScalarDecl::new("target"))
            .series(SeriesDecl::new("y"))
            .series(SeriesDecl::new("pmf"))
    }

    fn store() -> ParameterStore {
        ParameterStore::declare(vec![ParamSpec::linear("k", 0.0, 10.0, 1.0, 5.0)]).unwrap()
    }

    fn frame<'a>(
        snapshot: &'a Snapshot,
        history: &'a History,
        params: &'a ParamValues,
        decl: &'a ModelDeclaration,
    ) -> Frame<'a> {
        Frame {
            index: 1,
            revision: 0,
            epoch: 0,
            sim_time: 0.0,
            dt: 0.016,
            sim_dt: 0.016,
            snapshot,
            last_valid: Some(snapshot),
            history,
            params,
            declaration: decl,
            state: DriverState::Running,
            diagnostic: None,
            teardown: false,
        }
    }

    fn host() -> HeadlessHost {
        HeadlessHost::new().with_canvas("plot", CanvasSize::new(400.0, 240.0, 1.0))
    }

    fn points(len: usize, edit_at: usize) -> Vec<SeriesPoint> {
        (0..len)
            .map(|i| SeriesPoint {
                t: i as f64,
                value: (i as f64).sin(),
                revision: u64::from(i >= edit_at),
            })
            .collect()
    }

    #[test]
    fn test_downsample_stride() {
        let pts = points(1000, usize::MAX);
        let refs: Vec<&SeriesPoint> = pts.iter().collect();
        let idx = downsample_indices(&refs, 300);
        assert_eq!(idx[1] - idx[0], 4);
        assert_eq!(*idx.last().unwrap(), 999);
        assert_eq!(downsample_indices(&refs[..3], 300), vec![0, 1, 2]);
        assert!(downsample_indices(&[], 10).is_empty());
    }

    #[test]
    fn test_downsample_never_spans_an_edit() {
        let pts = points(2000, 1003);
        let refs: Vec<&SeriesPoint> = pts.iter().collect();
        let idx = downsample_indices(&refs, 328);
        assert!(idx.contains(&1002));
        assert!(idx.contains(&1003));
        for w in idx.windows(2) {
            assert!(w[0] < w[1]);
            if pts[w[0]].revision != pts[w[1]].revision {
                assert_eq!((w[0], w[1]), (1002, 1003));
            }
        }
    }

    #[test]
    fn test_edit_breaks_line() {
        let x = AxisMap {
            min: 0.0,
            max: 10.0,
            scale: AxisScale::Linear,
            from: 0.0,
            to: 100.0,
        };
        let pts = points(10, 5);
        let refs: Vec<&SeriesPoint> = pts.iter().collect();
        let r = runs(&refs, &x, &x);
        assert_eq!(r.len(), 2);
        assert_eq!((r[0].len(), r[1].len()), (5, 5));
    }

    #[test]
    fn test_line_downsampled_and_clipped() {
        let decl = decl();
        let store = store();
        let mut history = History::from_declaration(&decl);
        for i in 0..2000 {
            let t = i as f64 * 0.01;
            let snap = Snapshot::empty().with_sample("y", t, t.sin());
            history.apply(&snap, 0, true).unwrap();
        }
        let spec = PlotSpec::new("plot").series(PlotSeries::line("y", Color::CYAN).with_marker());
        let mut plot = PlotRenderer::new(spec, &store, &decl).unwrap();
        let mut host = host();
        let params = store.get_all();
        let snap = Snapshot::empty();
        plot.render(&frame(&snap, &history, &params, &decl), &mut host).unwrap();

        let canvas = host.canvas("plot").unwrap();
        assert_eq!(canvas.depth(), 0);
        assert!(canvas.count(|c| matches!(c, DrawCommand::ClipRect { .. })) >= 1);
        let layout = plot.layout().unwrap();
        let line_points = canvas.count(|c| matches!(c, DrawCommand::LineTo(..)));
        assert!(line_points < 2000);
        // Marker drawn as a full circle
        assert_eq!(canvas.circles().len(), 1);
        assert!(layout.y[0].min < 0.0);
    }

    #[test]
    fn test_highlighted_bar_is_tallest() {
        let decl = decl();
        let store = store();
        let mut history = History::from_declaration(&decl);
        let pmf: Vec<(f64, f64)> = (0..=10)
            .map(|k| {
                let c = (0..k).fold(1.0, |acc, i| acc * (10 - i) as f64 / (i + 1) as f64);
                (k as f64, c / 1024.0)
            })
            .collect();
        let snap = Snapshot::empty().with_series("pmf", pmf);
        history.apply(&snap, 0, false).unwrap();

        let spec = PlotSpec::new("plot").series(PlotSeries::bars("pmf", Color::BLUE).highlight("k", Color::AMBER));
        let mut plot = PlotRenderer::new(spec, &store, &decl).unwrap();
        let mut host = host();
        let params = store.get_all();
        plot.render(&frame(&snap, &history, &params, &decl), &mut host).unwrap();

        let mut fill = None;
        let mut bars = Vec::new();
        for cmd in host.canvas("plot").unwrap().commands() {
            match cmd {
                DrawCommand::Fill(Paint::Solid(c)) => fill = Some(*c),
                DrawCommand::FillRect { h, .. } if fill == Some(Color::BLUE) || fill == Some(Color::AMBER) => {
                    bars.push((fill, *h))
                }
                _ => {}
            }
        }
        assert_eq!(bars.len(), 11);
        let tallest = bars
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_eq!(tallest.0, Some(Color::AMBER));
        assert_eq!(bars.iter().filter(|b| b.0 == Some(Color::AMBER)).count(), 1);
    }

    #[test]
    fn test_reference_line_dashed_with_label() {
        let decl = decl();
        let store = store();
        let mut history = History::from_declaration(&decl);
        history
            .apply(&Snapshot::empty().with_sample("y", 0.0, 1.0), 0, true)
            .unwrap();
        let spec = PlotSpec::new("plot")
            .series(PlotSeries::line("y", Color::CYAN))
            .reference(ReferenceLine::horizontal(RefValue::Scalar("target".into()), Color::GREEN).label("K"));
        let mut plot = PlotRenderer::new(spec, &store, &decl).unwrap();
        let mut host = host();
        let params = store.get_all();
        let snap = Snapshot::empty().with_scalar("target", 0.5);
        plot.render(&frame(&snap, &history, &params, &decl), &mut host).unwrap();

        let canvas = host.canvas("plot").unwrap();
        assert!(canvas.texts().contains(&"K"));
        assert!(canvas
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::LineDash(d) if !d.is_empty())));
    }

    #[test]
    fn test_non_finite_breaks_line() {
        let x = AxisMap {
            min: 0.0,
            max: 10.0,
            scale: AxisScale::Linear,
            from: 0.0,
            to: 100.0,
        };
        let pts = [
            SeriesPoint { t: 1.0, value: 1.0, revision: 0 },
            SeriesPoint { t: 2.0, value: f64::NAN, revision: 0 },
            SeriesPoint { t: 3.0, value: 2.0, revision: 0 },
            SeriesPoint { t: 4.0, value: 3.0, revision: 0 },
        ];
        let refs: Vec<&SeriesPoint> = pts.iter().collect();
        let r = runs(&refs, &x, &x);
        assert_eq!(r.len(), 2);
        assert_eq!(r[1].len(), 2);
    }

    #[test]
    fn test_undeclared_series_rejected() {
        let spec = PlotSpec::new("plot").series(PlotSeries::line("nope", Color::RED));
        let err = PlotRenderer::new(spec, &store(), &decl()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UndeclaredReference {
                kind: "series",
                name: "nope".into()
            }
        );
    }
}
