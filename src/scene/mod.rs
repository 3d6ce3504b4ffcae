//! Scene rendering: particles, schematic glyphs and flow dots.

pub mod flow;
pub mod glyph;
pub mod motion;
pub mod particles;
pub mod region;
pub mod renderer;
pub mod spawn;

pub use flow::{FlowPath, FlowPathSpec};
pub use glyph::{draw_glyph, GlyphKind, GlyphSpec};
pub use motion::{MotionContext, MotionRule, Phase};
pub use particles::{Particle, ParticlePool, ParticleState};
pub use region::{Boundary, Contact, Region, Shape};
pub use renderer::{ParticleClassSpec, SceneRenderer, SceneSpec, Tint};
pub use spawn::{hsv_to_rgb, SpawnContext};
