//! Allowed regions for particles and their boundary handling.
//!
//! Scene coordinates are the scene's logical view units, `y` pointing down.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::model::SceneState;
use crate::scene::spawn::SpawnContext;

/// Distance kept between a resolved particle and the wall it touched.
pub const CONTACT_EPSILON: f32 = 1e-3;

/// Declared region. Containers resolve their height from a scene field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Region {
    Rect {
        min: Vec2,
        max: Vec2,
    },
    Circle {
        center: Vec2,
        radius: f32,
    },
    /// Horizontal pipe from `start_x` to `end_x`.
    Pipe {
        start_x: f32,
        end_x: f32,
        center_y: f32,
        radius: f32,
    },
    /// Open-top container whose fill height is `max_height · level`, where
    /// `level` is read from a scene field in `0..1`.
    Container {
        x: f32,
        width: f32,
        bottom: f32,
        max_height: f32,
        level_field: String,
    },
}

impl Region {
    /// Concrete shape for the current snapshot.
    pub fn shape(&self, scene: &SceneState) -> Shape {
        match self {
            Region::Rect { min, max } => Shape::Rect {
                min: *min,
                max: *max,
            },
            Region::Circle { center, radius } => Shape::Circle {
                center: *center,
                radius: *radius,
            },
            Region::Pipe {
                start_x,
                end_x,
                center_y,
                radius,
            } => Shape::Pipe {
                start_x: *start_x,
                end_x: *end_x,
                center_y: *center_y,
                radius: *radius,
            },
            Region::Container {
                x,
                width,
                bottom,
                max_height,
                level_field,
            } => {
                let level = scene
                    .field(level_field)
                    .filter(|l| l.is_finite())
                    .unwrap_or(1.0)
                    .clamp(0.0, 1.0) as f32;
                Shape::Rect {
                    min: Vec2::new(*x, bottom - max_height * level),
                    max: Vec2::new(x + width, *bottom),
                }
            }
        }
    }
}

/// What happens at the region edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Reflect the normal velocity component and clamp inside.
    #[default]
    Reflect,
    /// Leave one side, re-enter from the opposite side. Pipes wrap along
    /// the flow axis and reflect off their walls.
    Wrap,
    /// Particles leaving the region are destroyed.
    Absorb,
}

/// Outcome of boundary resolution for one particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    None,
    Touched,
    Exited,
}

/// Resolved region geometry for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect {
        min: Vec2,
        max: Vec2,
    },
    Circle {
        center: Vec2,
        radius: f32,
    },
    Pipe {
        start_x: f32,
        end_x: f32,
        center_y: f32,
        radius: f32,
    },
}

impl Shape {
    /// Axis-aligned bounds.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match *self {
            Shape::Rect { min, max } => (min, max),
            Shape::Circle { center, radius } => (center - Vec2::splat(radius), center + Vec2::splat(radius)),
            Shape::Pipe {
                start_x,
                end_x,
                center_y,
                radius,
            } => (
                Vec2::new(start_x, center_y - radius),
                Vec2::new(end_x, center_y + radius),
            ),
        }
    }

    /// Whether a particle of `radius` centred at `p` lies strictly inside.
    pub fn contains(&self, p: Vec2, radius: f32) -> bool {
        match *self {
            Shape::Circle { center, radius: r } => p.distance(center) < r - radius,
            _ => {
                let (min, max) = self.bounds();
                p.x > min.x + radius && p.x < max.x - radius && p.y > min.y + radius && p.y < max.y - radius
            }
        }
    }

    /// Uniform random point at least `margin` away from the edge.
    pub fn random_point(&self, ctx: &mut SpawnContext, margin: f32) -> Vec2 {
        match *self {
            Shape::Circle { center, radius } => {
                ctx.random_in_disk(center, (radius - margin - CONTACT_EPSILON).max(0.0))
            }
            _ => {
                let (min, max) = self.bounds();
                let (lo, hi) = inset(min, max, margin + CONTACT_EPSILON);
                ctx.random_in_rect(lo, hi)
            }
        }
    }

    /// Resolve a particle against this shape.
    pub fn resolve(
        &self,
        boundary: Boundary,
        position: &mut Vec2,
        velocity: &mut Vec2,
        radius: f32,
    ) -> Contact {
        match *self {
            Shape::Rect { min, max } => match boundary {
                Boundary::Reflect => reflect_box(min, max, position, velocity, radius, true, true),
                Boundary::Wrap => wrap_box(min, max, position, radius, true, true),
                Boundary::Absorb => absorb(self.contains(*position, radius)),
            },
            Shape::Circle { center, radius: r } => match boundary {
                Boundary::Absorb => absorb(self.contains(*position, radius)),
                Boundary::Wrap => {
                    // Re-enter from the antipodal point.
                    let d = *position - center;
                    let limit = r - radius;
                    if d.length() >= limit && limit > 0.0 {
                        *position = center - d.normalize_or_zero() * (limit - CONTACT_EPSILON);
                        Contact::Touched
                    } else {
                        Contact::None
                    }
                }
                Boundary::Reflect => {
                    let d = *position - center;
                    let limit = (r - radius).max(0.0);
                    let dist = d.length();
                    if dist < limit {
                        return Contact::None;
                    }
                    let n = if dist > 0.0 { d / dist } else { Vec2::X };
                    *position = center + n * (limit - CONTACT_EPSILON).max(0.0);
                    let vn = velocity.dot(n);
                    if vn > 0.0 {
                        *velocity -= 2.0 * vn * n;
                    }
                    Contact::Touched
                }
            },
            Shape::Pipe { .. } => {
                let (min, max) = self.bounds();
                // Walls always reflect; the ends follow the boundary rule.
                let wall = reflect_box(min, max, position, velocity, radius, false, true);
                let ends = match boundary {
                    Boundary::Reflect => reflect_box(min, max, position, velocity, radius, true, false),
                    Boundary::Wrap => wrap_box(min, max, position, radius, true, false),
                    Boundary::Absorb => absorb(position.x > min.x && position.x < max.x),
                };
                match (wall, ends) {
                    (_, Contact::Exited) => Contact::Exited,
                    (Contact::None, Contact::None) => Contact::None,
                    _ => Contact::Touched,
                }
            }
        }
    }
}

fn absorb(inside: bool) -> Contact {
    if inside {
        Contact::None
    } else {
        Contact::Exited
    }
}

fn inset(min: Vec2, max: Vec2, margin: f32) -> (Vec2, Vec2) {
    let mut lo = min + Vec2::splat(margin);
    let mut hi = max - Vec2::splat(margin);
    if lo.x >= hi.x {
        let c = (min.x + max.x) * 0.5;
        lo.x = c;
        hi.x = c;
    }
    if lo.y >= hi.y {
        let c = (min.y + max.y) * 0.5;
        lo.y = c;
        hi.y = c;
    }
    (lo, hi)
}

fn reflect_axis(p: &mut f32, v: &mut f32, lo: f32, hi: f32) -> bool {
    if lo >= hi {
        *p = (lo + hi) * 0.5;
        *v = 0.0;
        return true;
    }
    if *p <= lo {
        *p = (lo + CONTACT_EPSILON).min((lo + hi) * 0.5);
        *v = v.abs();
        true
    } else if *p >= hi {
        *p = (hi - CONTACT_EPSILON).max((lo + hi) * 0.5);
        *v = -v.abs();
        true
    } else {
        false
    }
}

fn reflect_box(
    min: Vec2,
    max: Vec2,
    position: &mut Vec2,
    velocity: &mut Vec2,
    radius: f32,
    x: bool,
    y: bool,
) -> Contact {
    let mut touched = false;
    if x {
        touched |= reflect_axis(&mut position.x, &mut velocity.x, min.x + radius, max.x - radius);
    }
    if y {
        touched |= reflect_axis(&mut position.y, &mut velocity.y, min.y + radius, max.y - radius);
    }
    if touched {
        Contact::Touched
    } else {
        Contact::None
    }
}

fn wrap_axis(p: &mut f32, lo: f32, hi: f32) -> bool {
    let span = hi - lo;
    if span <= 0.0 {
        // Particle wider than the region: park it on the centre line.
        let centre = (lo + hi) * 0.5;
        let moved = *p != centre;
        *p = centre;
        return moved;
    }
    if *p > lo && *p < hi {
        return false;
    }
    let mut wrapped = lo + (*p - lo).rem_euclid(span);
    if wrapped <= lo {
        wrapped = lo + CONTACT_EPSILON;
    } else if wrapped >= hi {
        wrapped = hi - CONTACT_EPSILON;
    }
    *p = wrapped;
    true
}

fn wrap_box(min: Vec2, max: Vec2, position: &mut Vec2, radius: f32, x: bool, y: bool) -> Contact {
    let mut touched = false;
    if x {
        touched |= wrap_axis(&mut position.x, min.x + radius, max.x - radius);
    }
    if y {
        touched |= wrap_axis(&mut position.y, min.y + radius, max.y - radius);
    }
    if touched {
        Contact::Touched
    } else {
        Contact::None
    }
}
