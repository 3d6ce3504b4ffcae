//! Declarative particle motion rules.
//!
//! Rules are evaluated on the CPU once per particle per tick, in two
//! phases around boundary resolution:
//!
//! 1. position is integrated by `velocity · dt`,
//! 2. **force** rules adjust velocity (gravity, drag, drift, jitter),
//! 3. the region boundary is resolved,
//! 4. **rescale** rules set the speed (target speed, pipe flow, limits).
//!
//! Rules read snapshot fields by name, so the model steers motion without
//! owning any particle.
//!
//! # Example
//!
//! ```ignore
//! ParticleClassSpec::new("gas")
//!     .with_rule(MotionRule::Jitter { strength: 30.0 })
//!     .with_rule(MotionRule::TargetSpeed { field: "thermal_speed".into(), scale: 1.0 })
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::model::SceneState;
use crate::scene::region::Shape;
use crate::scene::spawn::SpawnContext;

/// When a rule runs relative to boundary resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Force,
    Rescale,
}

/// Per-tick inputs shared by every rule.
pub struct MotionContext<'a> {
    /// Real seconds since the previous tick.
    pub dt: f32,
    pub scene: &'a SceneState,
    pub shape: &'a Shape,
    pub rng: &'a mut SpawnContext,
}

impl MotionContext<'_> {
    fn field(&self, name: &str) -> f32 {
        self.scene
            .field(name)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0) as f32
    }
}

/// Motion rules for one particle class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionRule {
    /// Constant acceleration in view units per second squared.
    ///
    /// ```ignore
    /// MotionRule::Gravity { acceleration: Vec2::new(0.0, 98.0) }
    /// ```
    Gravity { acceleration: Vec2 },

    /// Velocity damping. Higher values slow particles faster.
    ///
    /// Applied as `velocity *= 1 - strength · dt`.
    Drag { strength: f32 },

    /// Convective drift along `direction`, scaled by a scene field.
    ///
    /// Acceleration is `direction · field · scale`.
    Drift {
        field: String,
        direction: Vec2,
        scale: f32,
    },

    /// Random velocity kicks (Brownian look).
    Jitter { strength: f32 },

    /// Rescale speed to `field · scale`, keeping direction.
    ///
    /// Used when temperature changes dynamically: particles speed up or
    /// slow down without changing heading.
    TargetSpeed { field: String, scale: f32 },

    /// Parabolic pipe profile.
    ///
    /// Axial speed is `base · (1 − (r/R)²)` with `base = speed_field · scale`,
    /// floored at `min_fraction · base` so particles never stall at the wall.
    /// Cross-flow jitter grows with the turbulence field and with proximity
    /// to the wall. Only meaningful inside a pipe region.
    PipeFlow {
        speed_field: String,
        scale: f32,
        min_fraction: f32,
        #[serde(default)]
        turbulence_field: Option<String>,
        #[serde(default)]
        turbulence_scale: f32,
    },

    /// Clamp speed into `[min, max]`.
    SpeedLimit { min: f32, max: f32 },
}

impl MotionRule {
    pub fn phase(&self) -> Phase {
        match self {
            MotionRule::TargetSpeed { .. }
            | MotionRule::PipeFlow { .. }
            | MotionRule::SpeedLimit { .. } => Phase::Rescale,
            _ => Phase::Force,
        }
    }

    /// Apply to one particle's velocity (position is read for pipe flow).
    pub fn apply(&self, position: Vec2, velocity: &mut Vec2, ctx: &mut MotionContext<'_>) {
        let dt = ctx.dt;
        match self {
            MotionRule::Gravity { acceleration } => *velocity += *acceleration * dt,
            MotionRule::Drag { strength } => {
                *velocity *= (1.0 - strength * dt).max(0.0);
            }
            MotionRule::Drift {
                field,
                direction,
                scale,
            } => {
                let amount = ctx.field(field) * scale;
                *velocity += direction.normalize_or_zero() * amount * dt;
            }
            MotionRule::Jitter { strength } => {
                let kick = Vec2::new(ctx.rng.random_signed(), ctx.rng.random_signed());
                *velocity += kick * *strength * dt.sqrt();
            }
            MotionRule::TargetSpeed { field, scale } => {
                let target = (ctx.field(field) * scale).max(0.0);
                let speed = velocity.length();
                *velocity = if speed > f32::EPSILON {
                    *velocity / speed * target
                } else {
                    ctx.rng.random_velocity(target)
                };
            }
            MotionRule::PipeFlow {
                speed_field,
                scale,
                min_fraction,
                turbulence_field,
                turbulence_scale,
            } => {
                let Shape::Pipe {
                    center_y, radius, ..
                } = *ctx.shape
                else {
                    return;
                };
                let base = ctx.field(speed_field) * scale;
                let rel = if radius > 0.0 {
                    ((position.y - center_y).abs() / radius).min(1.0)
                } else {
                    0.0
                };
                let profile = (1.0 - rel * rel).max(min_fraction.clamp(0.0, 1.0));
                velocity.x = base * profile;

                let turbulence = turbulence_field
                    .as_ref()
                    .map(|f| ctx.field(f))
                    .unwrap_or(0.0)
                    * turbulence_scale;
                let amplitude = turbulence * (0.3 + 0.7 * rel);
                let kick = ctx.rng.random_signed() * amplitude;
                velocity.y = velocity.y * 0.9 + kick;
            }
            MotionRule::SpeedLimit { min, max } => {
                let speed = velocity.length();
                if speed > *max {
                    *velocity *= max / speed;
                } else if speed < *min && speed > f32::EPSILON {
                    *velocity *= min / speed;
                }
            }
        }
    }
}
