//! Host drawing contract.
//!
//! [`Surface`] is the 2D raster API the renderers draw through. It mirrors a
//! canvas-2D context: paths, rects, text, gradients, dash, alpha, composite
//! mode and a save/restore transform stack. Logical coordinates are CSS
//! units; the backing store is `css × pixel_ratio` device pixels.
//!
//! [`RecordingSurface`] records every call as a [`DrawCommand`], which is
//! what headless hosts and the test-suite use.

use crate::error::RenderError;
use crate::visuals::Color;

/// Logical canvas size plus device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub css_width: f64,
    pub css_height: f64,
    pub pixel_ratio: f64,
}

impl CanvasSize {
    /// Non-finite or non-positive ratios fall back to 1.
    pub fn new(css_width: f64, css_height: f64, pixel_ratio: f64) -> Self {
        let sane = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            css_width: sane(css_width),
            css_height: sane(css_height),
            pixel_ratio: if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
                pixel_ratio
            } else {
                1.0
            },
        }
    }

    /// Backing-store width in device pixels.
    pub fn backing_width(&self) -> u32 {
        (self.css_width * self.pixel_ratio).round() as u32
    }

    /// Backing-store height in device pixels.
    pub fn backing_height(&self) -> u32 {
        (self.css_height * self.pixel_ratio).round() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.css_width <= 0.0 || self.css_height <= 0.0
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(640.0, 360.0, 1.0)
    }
}

/// Fill or stroke style.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear {
        from: (f64, f64),
        to: (f64, f64),
        stops: Vec<(f64, Color)>,
    },
    Radial {
        center: (f64, f64),
        inner: f64,
        outer: f64,
        stops: Vec<(f64, Color)>,
    },
}

impl Paint {
    /// First colour stop, used by hosts without gradient support.
    pub fn primary(&self) -> Color {
        match self {
            Paint::Solid(c) => *c,
            Paint::Linear { stops, .. } | Paint::Radial { stops, .. } => {
                stops.first().map(|(_, c)| *c).unwrap_or(Color::TRANSPARENT)
            }
        }
    }
}

impl From<Color> for Paint {
    fn from(c: Color) -> Self {
        Paint::Solid(c)
    }
}

/// Pixel compositing operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    #[default]
    SourceOver,
    /// Additive, used for glows.
    Lighter,
    Multiply,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    #[default]
    Middle,
    Alphabetic,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Font {
    pub size: f64,
    pub bold: bool,
    pub monospace: bool,
}

impl Font {
    pub fn new(size: f64) -> Self {
        Self {
            size,
            bold: false,
            monospace: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::new(12.0)
    }
}

/// 2D drawing surface owned by exactly one renderer.
pub trait Surface {
    /// Logical size and device pixel ratio.
    fn size(&self) -> CanvasSize;

    /// Recompute the backing store after a host resize.
    fn resize(&mut self, size: CanvasSize);

    /// Report a surface that can no longer be drawn to.
    fn check(&self) -> Result<(), RenderError> {
        Ok(())
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    fn set_fill(&mut self, paint: Paint);
    fn set_stroke(&mut self, paint: Paint);
    fn set_line_width(&mut self, width: f64);
    /// Empty slice for solid lines.
    fn set_line_dash(&mut self, pattern: &[f64]);
    fn set_global_alpha(&mut self, alpha: f64);
    fn set_composite(&mut self, mode: CompositeMode);
    fn set_font(&mut self, font: Font);
    fn set_text_align(&mut self, align: TextAlign, baseline: TextBaseline);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    /// Angles in radians, clockwise in screen space.
    fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64);
    fn quadratic_to(&mut self, cx: f64, cy: f64, x: f64, y: f64);
    fn bezier_to(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn fill_text(&mut self, text: &str, x: f64, y: f64);

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, radians: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    /// Intersect the clip region with a rectangle (until `restore`).
    fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    // ========== Conveniences ==========

    fn stroke_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.begin_path();
        self.move_to(x0, y0);
        self.line_to(x1, y1);
        self.stroke();
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.begin_path();
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close_path();
        self.stroke();
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64) {
        self.begin_path();
        self.arc(cx, cy, radius, 0.0, std::f64::consts::TAU);
        self.fill();
    }

    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64) {
        self.begin_path();
        self.arc(cx, cy, radius, 0.0, std::f64::consts::TAU);
        self.stroke();
    }
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize(CanvasSize),
    ClearRect { x: f64, y: f64, w: f64, h: f64 },
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    Fill(Paint),
    Stroke(Paint),
    LineWidth(f64),
    LineDash(Vec<f64>),
    GlobalAlpha(f64),
    Composite(CompositeMode),
    Font(Font),
    TextAlign(TextAlign, TextBaseline),
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Arc { cx: f64, cy: f64, r: f64, start: f64, end: f64 },
    QuadraticTo(f64, f64, f64, f64),
    BezierTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
    FillPath,
    StrokePath,
    Text { text: String, x: f64, y: f64 },
    Save,
    Restore,
    Translate(f64, f64),
    Rotate(f64),
    Scale(f64, f64),
    ClipRect { x: f64, y: f64, w: f64, h: f64 },
}

/// Surface that records calls instead of rasterizing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: CanvasSize,
    commands: Vec<DrawCommand>,
    depth: usize,
    failure: Option<String>,
}

impl RecordingSurface {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drop recorded commands, keeping size.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Current save/restore nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Make `check` fail, simulating a lost context.
    pub fn fail_with(&mut self, message: &str) {
        self.failure = Some(message.to_string());
    }

    /// Every string drawn with `fill_text`.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every full-circle arc as `(cx, cy, r)`.
    pub fn circles(&self) -> Vec<(f64, f64, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                DrawCommand::Arc { cx, cy, r, start, end }
                    if (end - start).abs() >= std::f64::consts::TAU - 1e-9 =>
                {
                    Some((cx, cy, r))
                }
                _ => None,
            })
            .collect()
    }

    /// Every `fill_rect` as `(x, y, w, h)`.
    pub fn filled_rects(&self) -> Vec<(f64, f64, f64, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                DrawCommand::FillRect { x, y, w, h } => Some((x, y, w, h)),
                _ => None,
            })
            .collect()
    }

    /// Number of commands matching a predicate.
    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    fn push(&mut self, cmd: DrawCommand) {
        self.commands.push(cmd);
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> CanvasSize {
        self.size
    }

    fn resize(&mut self, size: CanvasSize) {
        self.size = size;
        self.push(DrawCommand::Resize(size));
    }

    fn check(&self) -> Result<(), RenderError> {
        match &self.failure {
            Some(msg) => Err(RenderError::Surface(msg.clone())),
            None => Ok(()),
        }
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawCommand::ClearRect { x, y, w, h });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawCommand::FillRect { x, y, w, h });
    }

    fn set_fill(&mut self, paint: Paint) {
        self.push(DrawCommand::Fill(paint));
    }

    fn set_stroke(&mut self, paint: Paint) {
        self.push(DrawCommand::Stroke(paint));
    }

    fn set_line_width(&mut self, width: f64) {
        self.push(DrawCommand::LineWidth(width));
    }

    fn set_line_dash(&mut self, pattern: &[f64]) {
        self.push(DrawCommand::LineDash(pattern.to_vec()));
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.push(DrawCommand::GlobalAlpha(alpha));
    }

    fn set_composite(&mut self, mode: CompositeMode) {
        self.push(DrawCommand::Composite(mode));
    }

    fn set_font(&mut self, font: Font) {
        self.push(DrawCommand::Font(font));
    }

    fn set_text_align(&mut self, align: TextAlign, baseline: TextBaseline) {
        self.push(DrawCommand::TextAlign(align, baseline));
    }

    fn begin_path(&mut self) {
        self.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.push(DrawCommand::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.push(DrawCommand::LineTo(x, y));
    }

    fn arc(&mut self, cx: f64, cy: f64, r: f64, start: f64, end: f64) {
        self.push(DrawCommand::Arc {
            cx,
            cy,
            r,
            start,
            end,
        });
    }

    fn quadratic_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        self.push(DrawCommand::QuadraticTo(cx, cy, x, y));
    }

    fn bezier_to(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) {
        self.push(DrawCommand::BezierTo(c1x, c1y, c2x, c2y, x, y));
    }

    fn close_path(&mut self) {
        self.push(DrawCommand::ClosePath);
    }

    fn fill(&mut self) {
        self.push(DrawCommand::FillPath);
    }

    fn stroke(&mut self) {
        self.push(DrawCommand::StrokePath);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn save(&mut self) {
        self.depth += 1;
        self.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.push(DrawCommand::Restore);
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.push(DrawCommand::Translate(x, y));
    }

    fn rotate(&mut self, radians: f64) {
        self.push(DrawCommand::Rotate(radians));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.push(DrawCommand::Scale(sx, sy));
    }

    fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawCommand::ClipRect { x, y, w, h });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backing_store_scaled_by_dpr() {
        let size = CanvasSize::new(400.0, 300.0, 2.0);
        assert_eq!(size.backing_width(), 800);
        assert_eq!(size.backing_height(), 600);

        let size = CanvasSize::new(400.0, 300.0, f64::NAN);
        assert_eq!(size.pixel_ratio, 1.0);
    }

    #[test]
    fn test_recording_conveniences() {
        let mut s = RecordingSurface::new(CanvasSize::default());
        s.save();
        s.fill_circle(10.0, 20.0, 3.0);
        s.fill_text("τ = 100 ms", 0.0, 0.0);
        s.restore();
        assert_eq!(s.circles(), vec![(10.0, 20.0, 3.0)]);
        assert_eq!(s.texts(), vec!["τ = 100 ms"]);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_check_reports_failure() {
        let mut s = RecordingSurface::default();
        assert!(s.check().is_ok());
        s.fail_with("context lost");
        assert_eq!(s.check(), Err(RenderError::Surface("context lost".into())));
    }

    #[test]
    fn test_paint_primary() {
        let p = Paint::Linear {
            from: (0.0, 0.0),
            to: (1.0, 0.0),
            stops: vec![(0.0, Color::RED), (1.0, Color::BLUE)],
        };
        assert_eq!(p.primary(), Color::RED);
    }
}
