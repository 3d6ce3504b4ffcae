//! egui host: a [`Surface`] over `egui::Painter` plus parameter widgets.
//!
//! Paths are flattened into polylines. Fills assume convex outlines, which
//! covers every shape the built-in renderers emit. Gradients use their
//! first stop and composite modes other than source-over draw as
//! source-over.
//!
//! # Example
//!
//! ```ignore
//! egui::CentralPanel::default().show(ctx, |ui| {
//!     parameter_controls(ui, shell.store_mut())?;
//!     let (rect, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
//!     host.begin_canvas("rc-scene", ui.painter_at(rect), ctx.pixels_per_point());
//!     shell.frame(ctx.input(|i| i.time), &mut host);
//!     readout_panel(ui, host.text("rc-readout"));
//! });
//! ```

use std::collections::BTreeMap;

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke};

use crate::driver::{FrameHandle, FrameScheduler};
use crate::error::ParameterError;
use crate::params::{ParameterStore, Scale};
use crate::readout::{ReadoutSink, Severity, TextReadout};
use crate::render::RenderHost;
use crate::surface::{CanvasSize, CompositeMode, Font, Paint, Surface, TextAlign, TextBaseline};
use crate::visuals::Color;

const CURVE_SEGMENTS: usize = 16;

/// Row-major 2D affine transform `[a c e; b d f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Average linear scale, for line widths and font sizes.
    fn scale_factor(&self) -> f64 {
        let sx = (self.a * self.a + self.b * self.b).sqrt();
        let sy = (self.c * self.c + self.d * self.d).sqrt();
        (sx + sy) / 2.0
    }
}

#[derive(Debug, Clone)]
struct State {
    transform: Affine,
    fill: Color,
    stroke: Color,
    line_width: f64,
    dash: Vec<f64>,
    alpha: f64,
    font: Font,
    align: TextAlign,
    baseline: TextBaseline,
    clip: Rect,
}

/// One subpath in device space.
#[derive(Debug, Clone, Default)]
struct SubPath {
    points: Vec<Pos2>,
    closed: bool,
}

/// Canvas-2D style drawing onto an egui painter.
pub struct EguiSurface {
    painter: Painter,
    origin: Pos2,
    size: CanvasSize,
    state: State,
    stack: Vec<State>,
    path: Vec<SubPath>,
    /// Current point in user space, for curve flattening.
    cursor: (f64, f64),
}

impl std::fmt::Debug for EguiSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EguiSurface")
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl EguiSurface {
    /// Surface covering the painter's clip rect.
    pub fn new(painter: Painter, pixel_ratio: f32) -> Self {
        let rect = painter.clip_rect();
        let size = CanvasSize::new(rect.width() as f64, rect.height() as f64, pixel_ratio as f64);
        Self {
            origin: rect.min,
            size,
            state: State {
                transform: Affine::IDENTITY,
                fill: Color::BLACK,
                stroke: Color::BLACK,
                line_width: 1.0,
                dash: Vec::new(),
                alpha: 1.0,
                font: Font::default(),
                align: TextAlign::Left,
                baseline: TextBaseline::Alphabetic,
                clip: rect,
            },
            stack: Vec::new(),
            path: Vec::new(),
            cursor: (0.0, 0.0),
            painter,
        }
    }

    fn device(&self, x: f64, y: f64) -> Pos2 {
        let (x, y) = self.state.transform.apply(x, y);
        Pos2::new(self.origin.x + x as f32, self.origin.y + y as f32)
    }

    fn color32(&self, color: Color) -> Color32 {
        let [r, g, b, a] = color.faded(self.state.alpha as f32).to_rgba8();
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    fn stroke_style(&self) -> Stroke {
        let width = (self.state.line_width * self.state.transform.scale_factor()) as f32;
        Stroke::new(width.max(0.5), self.color32(self.state.stroke))
    }

    fn paint(&self, shape: Shape) {
        self.painter.with_clip_rect(self.state.clip).add(shape);
    }

    fn current_subpath(&mut self) -> &mut SubPath {
        if self.path.is_empty() {
            self.path.push(SubPath::default());
        }
        let last = self.path.len() - 1;
        &mut self.path[last]
    }

    fn push_point(&mut self, x: f64, y: f64) {
        let p = self.device(x, y);
        self.current_subpath().points.push(p);
        self.cursor = (x, y);
    }

    fn stroke_points(&self, points: &[Pos2], closed: bool) {
        if points.len() < 2 {
            return;
        }
        let stroke = self.stroke_style();
        if self.state.dash.len() >= 2 {
            let scale = self.state.transform.scale_factor() as f32;
            let mut line = points.to_vec();
            if closed {
                line.push(points[0]);
            }
            let dash = self.state.dash[0] as f32 * scale;
            let gap = self.state.dash[1] as f32 * scale;
            for shape in Shape::dashed_line(&line, stroke, dash, gap) {
                self.paint(shape);
            }
        } else if closed {
            self.paint(Shape::closed_line(points.to_vec(), stroke));
        } else {
            self.paint(Shape::line(points.to_vec(), stroke));
        }
    }
}

impl Surface for EguiSurface {
    fn size(&self) -> CanvasSize {
        self.size
    }

    fn resize(&mut self, size: CanvasSize) {
        self.size = size;
    }

    /// egui repaints every frame, so clearing only has to cover what the
    /// panel background would not.
    fn clear_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64) {}

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = vec![
            self.device(x, y),
            self.device(x + w, y),
            self.device(x + w, y + h),
            self.device(x, y + h),
        ];
        let fill = self.color32(self.state.fill);
        self.paint(Shape::convex_polygon(corners, fill, Stroke::NONE));
    }

    fn set_fill(&mut self, paint: Paint) {
        self.state.fill = paint.primary();
    }

    fn set_stroke(&mut self, paint: Paint) {
        self.state.stroke = paint.primary();
    }

    fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width;
    }

    fn set_line_dash(&mut self, pattern: &[f64]) {
        self.state.dash = pattern.to_vec();
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_composite(&mut self, _mode: CompositeMode) {}

    fn set_font(&mut self, font: Font) {
        self.state.font = font;
    }

    fn set_text_align(&mut self, align: TextAlign, baseline: TextBaseline) {
        self.state.align = align;
        self.state.baseline = baseline;
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.push(SubPath::default());
        self.push_point(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.push_point(x, y);
    }

    fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64) {
        let sweep = end - start;
        let device_radius = radius * self.state.transform.scale_factor();
        let segments = ((sweep.abs() * device_radius / 4.0).ceil() as usize).clamp(8, 128);
        for i in 0..=segments {
            let theta = start + sweep * i as f64 / segments as f64;
            self.push_point(cx + radius * theta.cos(), cy + radius * theta.sin());
        }
    }

    fn quadratic_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        let (x0, y0) = self.cursor;
        for i in 1..=CURVE_SEGMENTS {
            let t = i as f64 / CURVE_SEGMENTS as f64;
            let u = 1.0 - t;
            self.push_point(
                u * u * x0 + 2.0 * u * t * cx + t * t * x,
                u * u * y0 + 2.0 * u * t * cy + t * t * y,
            );
        }
    }

    fn bezier_to(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) {
        let (x0, y0) = self.cursor;
        for i in 1..=CURVE_SEGMENTS {
            let t = i as f64 / CURVE_SEGMENTS as f64;
            let u = 1.0 - t;
            let (b0, b1, b2, b3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.push_point(
                b0 * x0 + b1 * c1x + b2 * c2x + b3 * x,
                b0 * y0 + b1 * c1y + b2 * c2y + b3 * y,
            );
        }
    }

    fn close_path(&mut self) {
        if let Some(sub) = self.path.last_mut() {
            sub.closed = true;
        }
    }

    fn fill(&mut self) {
        let fill = self.color32(self.state.fill);
        for sub in &self.path {
            if sub.points.len() >= 3 {
                self.paint(Shape::convex_polygon(sub.points.clone(), fill, Stroke::NONE));
            }
        }
    }

    fn stroke(&mut self) {
        for sub in &self.path {
            self.stroke_points(&sub.points, sub.closed);
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let size = (self.state.font.size * self.state.transform.scale_factor()) as f32;
        let font = if self.state.font.monospace {
            FontId::monospace(size)
        } else {
            FontId::proportional(size)
        };
        let h = match self.state.align {
            TextAlign::Left => egui::Align::Min,
            TextAlign::Center => egui::Align::Center,
            TextAlign::Right => egui::Align::Max,
        };
        let v = match self.state.baseline {
            TextBaseline::Top => egui::Align::Min,
            TextBaseline::Middle => egui::Align::Center,
            TextBaseline::Alphabetic | TextBaseline::Bottom => egui::Align::Max,
        };
        let pos = self.device(x, y);
        let color = self.color32(self.state.fill);
        self.painter
            .with_clip_rect(self.state.clip)
            .text(pos, Align2([h, v]), text, font, color);
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, x: f64, y: f64) {
        let t = &mut self.state.transform;
        t.e += t.a * x + t.c * y;
        t.f += t.b * x + t.d * y;
    }

    fn rotate(&mut self, radians: f64) {
        let (sin, cos) = radians.sin_cos();
        let t = self.state.transform;
        self.state.transform = Affine {
            a: t.a * cos + t.c * sin,
            b: t.b * cos + t.d * sin,
            c: t.c * cos - t.a * sin,
            d: t.d * cos - t.b * sin,
            ..t
        };
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        let t = &mut self.state.transform;
        t.a *= sx;
        t.b *= sx;
        t.c *= sy;
        t.d *= sy;
    }

    fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = [
            self.device(x, y),
            self.device(x + w, y),
            self.device(x + w, y + h),
            self.device(x, y + h),
        ];
        let bounds = Rect::from_points(&corners);
        self.state.clip = self.state.clip.intersect(bounds);
    }
}

// ========== Host ==========

/// Render host backed by egui painters and in-memory readouts.
#[derive(Debug, Default)]
pub struct EguiHost {
    canvases: BTreeMap<String, EguiSurface>,
    readouts: BTreeMap<String, TextReadout>,
}

impl EguiHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a canvas id to this frame's painter. Call once per egui frame
    /// before ticking the shell.
    pub fn begin_canvas(&mut self, id: &str, painter: Painter, pixel_ratio: f32) {
        self.canvases
            .insert(id.to_string(), EguiSurface::new(painter, pixel_ratio));
    }

    pub fn add_readout(&mut self, id: &str) {
        self.readouts.entry(id.to_string()).or_default();
    }

    pub fn text(&self, id: &str) -> Option<&TextReadout> {
        self.readouts.get(id)
    }
}

impl RenderHost for EguiHost {
    fn surface(&mut self, id: &str) -> Option<&mut dyn Surface> {
        self.canvases.get_mut(id).map(|s| s as &mut dyn Surface)
    }

    fn readout(&mut self, id: &str) -> Option<&mut dyn ReadoutSink> {
        self.readouts.get_mut(id).map(|r| r as &mut dyn ReadoutSink)
    }
}

/// Frame scheduler that asks egui for another repaint.
#[derive(Debug, Clone)]
pub struct RepaintScheduler {
    ctx: egui::Context,
    next: u64,
}

impl RepaintScheduler {
    pub fn new(ctx: egui::Context) -> Self {
        Self { ctx, next: 0 }
    }
}

impl FrameScheduler for RepaintScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.ctx.request_repaint();
        FrameHandle(self.next)
    }

    /// egui has no way to withdraw a repaint request; the driver ignores
    /// ticks while paused anyway.
    fn cancel_frame(&mut self, _handle: FrameHandle) {}
}

// ========== Widgets ==========

/// One slider per parameter. Returns whether any value changed.
///
/// Logarithmic parameters drive the slider through their position in
/// `[0, 1]`, so equal drags cover equal ratios.
pub fn parameter_controls(ui: &mut egui::Ui, store: &mut ParameterStore) -> Result<bool, ParameterError> {
    let params: Vec<_> = store.iter().cloned().collect();
    let mut changed = false;

    for param in params {
        let spec = param.spec().clone();
        let label = if spec.label.is_empty() {
            spec.name.clone()
        } else {
            spec.label.clone()
        };

        match spec.scale {
            Scale::Log => {
                let mut position = param.position_for(param.value());
                let shown = param.clone();
                let response = ui.add(
                    egui::Slider::new(&mut position, 0.0..=1.0)
                        .text(label)
                        .custom_formatter(move |s, _| shown.spec().formatter.format(shown.value_at(s))),
                );
                if response.changed() {
                    changed |= store.set_position(&spec.name, position)?;
                }
            }
            Scale::Linear => {
                let mut value = param.value();
                let formatter = spec.formatter.clone();
                let mut slider = egui::Slider::new(&mut value, spec.min..=spec.max)
                    .text(label)
                    .custom_formatter(move |v, _| formatter.format(v));
                if spec.step > 0.0 {
                    slider = slider.step_by(spec.step);
                }
                if ui.add(slider).changed() {
                    changed |= store.set(&spec.name, value)?;
                }
            }
        }
    }
    Ok(changed)
}

/// Readout lines as a two-column grid, followed by inline messages.
pub fn readout_panel(ui: &mut egui::Ui, readout: Option<&TextReadout>) {
    let Some(readout) = readout else {
        return;
    };
    egui::Grid::new(ui.next_auto_id()).num_columns(2).show(ui, |ui| {
        for line in readout.lines() {
            ui.label(&line.label);
            let mut text = egui::RichText::new(&line.value).monospace();
            if let Some(color) = line.color {
                let [r, g, b, a] = color.to_rgba8();
                text = text.color(Color32::from_rgba_unmultiplied(r, g, b, a));
            }
            if line.dimmed {
                text = text.weak();
            }
            ui.label(text);
            ui.end_row();
        }
    });
    for (severity, message) in readout.messages() {
        let color = match severity {
            Severity::Info => ui.visuals().text_color(),
            Severity::Warning => ui.visuals().warn_fg_color,
            Severity::Error => ui.visuals().error_fg_color,
        };
        ui.label(egui::RichText::new(message).color(color).small());
    }
}
