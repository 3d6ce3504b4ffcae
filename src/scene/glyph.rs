//! Schematic glyph catalogue.
//!
//! Glyphs have static geometry (anchor, size, orientation) and draw their
//! appearance purely from the snapshot's [`GlyphState`]: nothing is kept
//! between ticks. Each glyph is drawn in a local frame where the symbol
//! spans `-size/2..size/2` along `x`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::model::GlyphState;
use crate::surface::{CompositeMode, Font, Paint, Surface, TextAlign, TextBaseline};
use crate::visuals::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlyphKind {
    Source,
    Resistor,
    Inductor,
    Capacitor,
    Diode,
    Switch,
    Mass,
    Spring,
    Damper,
    Tank,
    Pipe,
    Pulley,
    Blade,
    Polarizer,
    Panel,
}

fn default_color() -> Color {
    Color::TEXT
}

/// Static placement of one glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphSpec {
    pub id: String,
    pub kind: GlyphKind,
    pub anchor: Vec2,
    pub size: f32,
    /// Radians.
    #[serde(default)]
    pub orientation: f32,
    #[serde(default = "default_color")]
    pub color: Color,
    /// When set, state rotation orbits the anchor around this point instead
    /// of spinning the glyph in place.
    #[serde(default)]
    pub pivot: Option<Vec2>,
    #[serde(default)]
    pub label: Option<String>,
}

impl GlyphSpec {
    pub fn new(id: &str, kind: GlyphKind, anchor: Vec2, size: f32) -> Self {
        Self {
            id: id.to_string(),
            kind,
            anchor,
            size,
            orientation: 0.0,
            color: default_color(),
            pivot: None,
            label: None,
        }
    }

    pub fn oriented(mut self, radians: f32) -> Self {
        self.orientation = radians;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn pivot(mut self, pivot: Vec2) -> Self {
        self.pivot = Some(pivot);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Anchor after applying an orbiting rotation.
    pub fn placed_anchor(&self, state: &GlyphState) -> Vec2 {
        match self.pivot {
            Some(pivot) => {
                let rot = Vec2::from_angle(state.rotation as f32);
                pivot + rot.rotate(self.anchor - pivot)
            }
            None => self.anchor,
        }
    }
}

/// Draw one glyph. Missing state draws the idle appearance.
pub fn draw_glyph(s: &mut dyn Surface, spec: &GlyphSpec, state: Option<&GlyphState>) {
    let idle = GlyphState::default();
    let state = state.unwrap_or(&idle);
    let anchor = spec.placed_anchor(state);
    let l = spec.size.max(1.0) as f64;
    let spin = if spec.pivot.is_some() { 0.0 } else { state.rotation };

    s.save();
    s.translate(anchor.x as f64, anchor.y as f64);
    s.rotate(spec.orientation as f64 + spin);

    if state.glow > 0.0 {
        draw_glow(s, l, state.glow, spec.color);
    }

    let base = if state.active {
        spec.color
    } else {
        spec.color.faded(0.35)
    };
    let hot = base.lerp(Color::AMBER, state.intensity as f32);
    s.set_stroke(Paint::Solid(hot));
    s.set_fill(Paint::Solid(hot));
    s.set_line_width((l * 0.04).max(1.5));
    s.set_line_dash(&[]);

    match spec.kind {
        GlyphKind::Source => draw_source(s, l, hot),
        GlyphKind::Resistor => zigzag(s, l, 0.6, 6, l * 0.12),
        GlyphKind::Inductor => draw_inductor(s, l),
        GlyphKind::Capacitor => draw_capacitor(s, l, hot, state.intensity),
        GlyphKind::Diode => draw_diode(s, l),
        GlyphKind::Switch => draw_switch(s, l, state.active),
        GlyphKind::Mass => draw_mass(s, l, hot),
        GlyphKind::Spring => zigzag(s, l, 0.9, 10, l * 0.15),
        GlyphKind::Damper => draw_damper(s, l),
        GlyphKind::Tank => draw_tank(s, l, hot, state.intensity),
        GlyphKind::Pipe => draw_pipe(s, l, state.intensity),
        GlyphKind::Pulley => draw_pulley(s, l),
        GlyphKind::Blade => draw_blade(s, l),
        GlyphKind::Polarizer => draw_polarizer(s, l),
        GlyphKind::Panel => draw_panel(s, l, state.intensity),
    }

    if let Some(label) = &spec.label {
        s.rotate(-(spec.orientation as f64 + spin));
        s.set_fill(Paint::Solid(Color::TEXT));
        s.set_font(Font::new((l * 0.18).clamp(9.0, 14.0)));
        s.set_text_align(TextAlign::Center, TextBaseline::Top);
        s.fill_text(label, 0.0, l * 0.35);
    }
    s.restore();
}

fn draw_glow(s: &mut dyn Surface, l: f64, glow: f64, color: Color) {
    s.save();
    s.set_composite(CompositeMode::Lighter);
    s.set_fill(Paint::Radial {
        center: (0.0, 0.0),
        inner: 0.0,
        outer: l * 0.8,
        stops: vec![
            (0.0, color.with_alpha(0.6 * glow as f32)),
            (1.0, Color::TRANSPARENT),
        ],
    });
    s.fill_circle(0.0, 0.0, l * 0.8);
    s.restore();
}

/// Leads from the glyph ends to `±inner/2`.
fn leads(s: &mut dyn Surface, l: f64, inner: f64) {
    s.stroke_line(-l / 2.0, 0.0, -inner / 2.0, 0.0);
    s.stroke_line(inner / 2.0, 0.0, l / 2.0, 0.0);
}

fn zigzag(s: &mut dyn Surface, l: f64, body: f64, peaks: usize, amp: f64) {
    let w = l * body;
    leads(s, l, w);
    s.begin_path();
    s.move_to(-w / 2.0, 0.0);
    let seg = w / (peaks as f64 * 2.0);
    for i in 0..peaks * 2 {
        let x = -w / 2.0 + seg * (i as f64 + 0.5);
        let y = if i % 2 == 0 { -amp } else { amp };
        s.line_to(x, y);
    }
    s.line_to(w / 2.0, 0.0);
    s.stroke();
}

fn draw_source(s: &mut dyn Surface, l: f64, color: Color) {
    let r = l * 0.25;
    leads(s, l, r * 2.0);
    s.stroke_circle(0.0, 0.0, r);
    s.set_fill(Paint::Solid(color));
    s.set_font(Font::new(r * 0.9).bold());
    s.set_text_align(TextAlign::Center, TextBaseline::Middle);
    s.fill_text("+", -r * 0.45, 0.0);
    s.fill_text("−", r * 0.45, 0.0);
}

fn draw_inductor(s: &mut dyn Surface, l: f64) {
    let w = l * 0.6;
    leads(s, l, w);
    let humps = 4;
    let r = w / (humps as f64 * 2.0);
    s.begin_path();
    s.move_to(-w / 2.0, 0.0);
    for i in 0..humps {
        let cx = -w / 2.0 + r * (2 * i + 1) as f64;
        s.arc(cx, 0.0, r, PI, TAU);
    }
    s.stroke();
}

fn draw_capacitor(s: &mut dyn Surface, l: f64, color: Color, charge: f64) {
    let gap = l * 0.12;
    let h = l * 0.45;
    leads(s, l, gap);
    // Plate shading follows stored charge.
    if charge > 0.0 {
        s.set_fill(Paint::Solid(color.with_alpha(0.25 + 0.6 * charge as f32)));
        s.fill_rect(-gap / 2.0 - 3.0, -h / 2.0, 3.0, h);
        s.fill_rect(gap / 2.0, -h / 2.0, 3.0, h);
    }
    s.stroke_line(-gap / 2.0, -h / 2.0, -gap / 2.0, h / 2.0);
    s.stroke_line(gap / 2.0, -h / 2.0, gap / 2.0, h / 2.0);
}

fn draw_diode(s: &mut dyn Surface, l: f64) {
    let w = l * 0.3;
    leads(s, l, w);
    s.begin_path();
    s.move_to(-w / 2.0, -w / 2.0);
    s.line_to(w / 2.0, 0.0);
    s.line_to(-w / 2.0, w / 2.0);
    s.close_path();
    s.fill();
    s.stroke_line(w / 2.0, -w / 2.0, w / 2.0, w / 2.0);
}

fn draw_switch(s: &mut dyn Surface, l: f64, closed: bool) {
    let w = l * 0.5;
    leads(s, l, w);
    s.fill_circle(-w / 2.0, 0.0, l * 0.03 + 1.5);
    s.fill_circle(w / 2.0, 0.0, l * 0.03 + 1.5);
    let angle: f64 = if closed { 0.0 } else { -0.5 };
    s.stroke_line(-w / 2.0, 0.0, -w / 2.0 + w * angle.cos(), w * angle.sin());
}

fn draw_mass(s: &mut dyn Surface, l: f64, color: Color) {
    let w = l * 0.6;
    s.set_fill(Paint::Solid(color.with_alpha(0.85)));
    s.fill_rect(-w / 2.0, -w / 2.0, w, w);
    s.stroke_rect(-w / 2.0, -w / 2.0, w, w);
    s.set_fill(Paint::Solid(Color::BACKGROUND));
    s.set_font(Font::new(w * 0.4).bold());
    s.set_text_align(TextAlign::Center, TextBaseline::Middle);
    s.fill_text("m", 0.0, 0.0);
}

fn draw_damper(s: &mut dyn Surface, l: f64) {
    let w = l * 0.35;
    let h = l * 0.3;
    s.stroke_line(-l / 2.0, 0.0, -w / 2.0, 0.0);
    // Cylinder open on the right, piston rod from the right.
    s.begin_path();
    s.move_to(w / 2.0, -h / 2.0);
    s.line_to(-w / 2.0, -h / 2.0);
    s.line_to(-w / 2.0, h / 2.0);
    s.line_to(w / 2.0, h / 2.0);
    s.stroke();
    s.stroke_line(0.0, -h * 0.4, 0.0, h * 0.4);
    s.stroke_line(0.0, 0.0, l / 2.0, 0.0);
}

fn draw_tank(s: &mut dyn Surface, l: f64, color: Color, level: f64) {
    let w = l * 0.7;
    let h = l * 0.9;
    let fill = h * level.clamp(0.0, 1.0);
    s.set_fill(Paint::Linear {
        from: (0.0, h / 2.0 - fill),
        to: (0.0, h / 2.0),
        stops: vec![(0.0, color.with_alpha(0.5)), (1.0, color.with_alpha(0.9))],
    });
    s.fill_rect(-w / 2.0, h / 2.0 - fill, w, fill);
    s.begin_path();
    s.move_to(-w / 2.0, -h / 2.0);
    s.line_to(-w / 2.0, h / 2.0);
    s.line_to(w / 2.0, h / 2.0);
    s.line_to(w / 2.0, -h / 2.0);
    s.stroke();
}

fn draw_pipe(s: &mut dyn Surface, l: f64, flow: f64) {
    let d = l * 0.2;
    if flow > 0.0 {
        s.set_fill(Paint::Solid(Color::CYAN.with_alpha(0.2 + 0.5 * flow as f32)));
        s.fill_rect(-l / 2.0, -d / 2.0, l, d);
    }
    s.stroke_line(-l / 2.0, -d / 2.0, l / 2.0, -d / 2.0);
    s.stroke_line(-l / 2.0, d / 2.0, l / 2.0, d / 2.0);
}

fn draw_pulley(s: &mut dyn Surface, l: f64) {
    let r = l * 0.4;
    s.stroke_circle(0.0, 0.0, r);
    s.fill_circle(0.0, 0.0, r * 0.12);
    for i in 0..3 {
        let a = i as f64 * TAU / 3.0;
        s.stroke_line(0.0, 0.0, r * a.cos(), r * a.sin());
    }
}

fn draw_blade(s: &mut dyn Surface, l: f64) {
    let r = l * 0.5;
    for i in 0..3 {
        let a = i as f64 * TAU / 3.0;
        let (c, sn) = (a.cos(), a.sin());
        let (pc, ps) = ((a + FRAC_PI_2).cos(), (a + FRAC_PI_2).sin());
        let w = r * 0.12;
        s.begin_path();
        s.move_to(pc * w, ps * w);
        s.quadratic_to(c * r * 0.6 + pc * w * 1.5, sn * r * 0.6 + ps * w * 1.5, c * r, sn * r);
        s.line_to(-pc * w, -ps * w);
        s.close_path();
        s.fill();
    }
    s.fill_circle(0.0, 0.0, r * 0.1);
}

fn draw_polarizer(s: &mut dyn Surface, l: f64) {
    let r = l * 0.45;
    s.stroke_circle(0.0, 0.0, r);
    s.save();
    s.set_line_width(1.0);
    for i in -3..=3 {
        let y = i as f64 * r / 4.0;
        let half = (r * r - y * y).max(0.0).sqrt();
        s.stroke_line(-half, y, half, y);
    }
    s.restore();
}

fn draw_panel(s: &mut dyn Surface, l: f64, irradiance: f64) {
    let w = l;
    let h = l * 0.6;
    let (cols, rows) = (3, 2);
    let cell = Color::BLUE.lerp(Color::AMBER, irradiance as f32 * 0.5);
    s.set_fill(Paint::Solid(cell.with_alpha(0.8)));
    for c in 0..cols {
        for r in 0..rows {
            let cw = w / cols as f64;
            let ch = h / rows as f64;
            s.fill_rect(-w / 2.0 + c as f64 * cw + 1.0, -h / 2.0 + r as f64 * ch + 1.0, cw - 2.0, ch - 2.0);
        }
    }
    s.stroke_rect(-w / 2.0, -h / 2.0, w, h);
}
