//! Flow-dot overlay.
//!
//! Equally spaced dots travel along a polyline. Their phase advances by
//! `rate · dt · visual_speed` each tick, so the sign of `rate` sets the
//! direction and its magnitude the speed. Below `threshold` no dots are
//! drawn. Phase is visual state owned by the renderer and advanced with
//! real `dt`, independent of the model's time scale.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::surface::{Paint, Surface};
use crate::visuals::Color;

fn default_spacing() -> f32 {
    24.0
}

fn default_dot_radius() -> f32 {
    3.0
}

fn default_flow_color() -> Color {
    Color::AMBER
}

/// Declared path for one flow signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPathSpec {
    /// Flow id in the snapshot's `scene.flows`.
    pub id: String,
    pub points: Vec<Vec2>,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    /// Path units per second per unit of rate.
    pub visual_speed: f32,
    /// `|rate|` below this suppresses the dots.
    #[serde(default)]
    pub threshold: f32,
    #[serde(default = "default_flow_color")]
    pub color: Color,
    #[serde(default = "default_dot_radius")]
    pub dot_radius: f32,
    /// Connect the last point back to the first.
    #[serde(default)]
    pub closed: bool,
}

impl FlowPathSpec {
    pub fn new(id: &str, points: Vec<Vec2>, visual_speed: f32) -> Self {
        Self {
            id: id.to_string(),
            points,
            spacing: default_spacing(),
            visual_speed,
            threshold: 0.0,
            color: default_flow_color(),
            dot_radius: default_dot_radius(),
            closed: false,
        }
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }
}

/// Runtime state for one flow path.
#[derive(Debug, Clone)]
pub struct FlowPath {
    spec: FlowPathSpec,
    vertices: Vec<Vec2>,
    /// Cumulative length at each vertex.
    cumulative: Vec<f32>,
    phase: f32,
    rate: f64,
}

impl FlowPath {
    pub fn new(spec: FlowPathSpec) -> Self {
        let mut vertices = spec.points.clone();
        if spec.closed {
            if let Some(&first) = vertices.first() {
                vertices.push(first);
            }
        }
        let mut cumulative = Vec::with_capacity(vertices.len());
        let mut total = 0.0;
        for (i, v) in vertices.iter().enumerate() {
            if i > 0 {
                total += v.distance(vertices[i - 1]);
            }
            cumulative.push(total);
        }
        Self {
            spec,
            vertices,
            cumulative,
            phase: 0.0,
            rate: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Restart the dot phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Advance the dot phase for this tick.
    pub fn advance(&mut self, rate: f64, dt: f64) {
        self.rate = if rate.is_finite() { rate } else { 0.0 };
        let spacing = f64::from(self.spec.spacing.max(1.0));
        // Reduce in f64 so huge rates cannot overflow the f32 phase.
        let step = self.rate * dt * f64::from(self.spec.visual_speed);
        if !step.is_finite() {
            return;
        }
        let phase = (f64::from(self.phase) + step.rem_euclid(spacing)).rem_euclid(spacing) as f32;
        self.phase = if f64::from(phase) < spacing { phase } else { 0.0 };
    }

    /// Whether dots are currently shown.
    pub fn visible(&self) -> bool {
        (self.rate.abs() as f32) >= self.spec.threshold && self.rate != 0.0 && self.length() > 0.0
    }

    /// Dot positions along the path.
    pub fn dots(&self) -> Vec<Vec2> {
        if !self.visible() {
            return Vec::new();
        }
        let spacing = self.spec.spacing.max(1.0);
        let total = self.length();
        let mut out = Vec::new();
        let mut s = self.phase;
        while s < total {
            out.push(self.point_at(s));
            s += spacing;
        }
        out
    }

    /// Axis-aligned bounds of the path.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        self.vertices.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(lo, hi), v| (lo.min(*v), hi.max(*v)),
        )
    }

    fn point_at(&self, s: f32) -> Vec2 {
        let i = self.cumulative.partition_point(|&c| c <= s).max(1);
        if i >= self.vertices.len() {
            return self.vertices.last().copied().unwrap_or(Vec2::ZERO);
        }
        let (a, b) = (self.vertices[i - 1], self.vertices[i]);
        let seg = self.cumulative[i] - self.cumulative[i - 1];
        let t = if seg > 0.0 {
            (s - self.cumulative[i - 1]) / seg
        } else {
            0.0
        };
        a.lerp(b, t)
    }

    /// Draw the dots, clipped to the path's bounding region.
    pub fn draw(&self, s: &mut dyn Surface) {
        let dots = self.dots();
        if dots.is_empty() {
            return;
        }
        let r = self.spec.dot_radius;
        let (lo, hi) = self.bounds();
        s.save();
        s.clip_rect(
            (lo.x - r) as f64,
            (lo.y - r) as f64,
            (hi.x - lo.x + 2.0 * r) as f64,
            (hi.y - lo.y + 2.0 * r) as f64,
        );
        s.set_fill(Paint::Solid(self.spec.color));
        for d in dots {
            s.fill_circle(d.x as f64, d.y as f64, r as f64);
        }
        s.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight() -> FlowPath {
        FlowPath::new(
            FlowPathSpec::new("loop", vec![Vec2::ZERO, Vec2::new(100.0, 0.0)], 10.0)
                .spacing(25.0)
                .threshold(0.01),
        )
    }

    #[test]
    fn test_dots_equally_spaced() {
        let mut path = straight();
        path.advance(0.5, 1.0); // phase 5
        let dots = path.dots();
        assert_eq!(dots.len(), 4);
        assert!((dots[0].x - 5.0).abs() < 1e-4);
        assert!((dots[1].x - dots[0].x - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_direction_follows_sign() {
        let mut path = straight();
        path.advance(0.5, 1.0);
        assert!((path.phase() - 5.0).abs() < 1e-4);
        path.advance(-0.2, 1.0);
        assert!((path.phase() - 3.0).abs() < 1e-4);
        path.advance(-0.5, 1.0);
        assert!((path.phase() - 23.0).abs() < 1e-4);
    }

    #[test]
    fn test_huge_rate_keeps_phase_finite() {
        let mut path = straight();
        path.advance(0.5, 1.0);
        path.advance(f64::MAX, 10.0);
        assert!((path.phase() - 5.0).abs() < 1e-4);

        path.advance(1e300, 1.0);
        assert!(path.phase().is_finite());
        assert!((0.0..25.0).contains(&path.phase()));
        assert!(!path.dots().is_empty());

        // ordinary rates still move the dots afterwards
        let before = path.phase();
        path.advance(0.1, 1.0);
        let moved = (path.phase() - before).rem_euclid(25.0);
        assert!((moved - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_suppressed_below_threshold() {
        let mut path = straight();
        path.advance(0.001, 1.0);
        assert!(path.dots().is_empty());
    }

    #[test]
    fn test_closed_path_length() {
        let path = FlowPath::new(
            FlowPathSpec::new(
                "sq",
                vec![
                    Vec2::ZERO,
                    Vec2::new(10.0, 0.0),
                    Vec2::new(10.0, 10.0),
                    Vec2::new(0.0, 10.0),
                ],
                1.0,
            )
            .closed(),
        );
        assert_eq!(path.length(), 40.0);
    }
}
