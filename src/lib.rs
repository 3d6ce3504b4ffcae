//! # rtviz - Real-Time Visualization Engine
//!
//! Interactive science explainers with a simple, declarative API.
//!
//! rtviz handles the frame loop, parameter plumbing and drawing (particles,
//! schematic glyphs, plots, readouts) so a sample only has to describe its
//! parameters and the physics that turns them into numbers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rtviz::prelude::*;
//!
//! struct Decay;
//!
//! impl ModelInfo for Decay {
//!     fn declare(&self) -> ModelDeclaration {
//!         ModelDeclaration::new()
//!             .parameters(&["k"])
//!             .scalar(ScalarDecl::new("n"))
//!             .series(SeriesDecl::new("n"))
//!     }
//!
//!     fn hot_swap(&self) -> HotSwap {
//!         HotSwap::Reseed
//!     }
//! }
//!
//! impl ClosedFormModel for Decay {
//!     fn evaluate(&self, p: &ParamValues, _origin: &ModelState, t: f64) -> Snapshot {
//!         let n = (-p.get("k") * t).exp();
//!         Snapshot::empty().with_scalar("n", n).with_sample("n", t, n)
//!     }
//! }
//!
//! let schema = SampleSchema::new("decay", "Exponential decay")
//!     .param(ParamSpec::log("k", 0.1, 10.0, 1.0))
//!     .plot(PlotSpec::new("plot").series(PlotSeries::line("n", Color::CYAN)));
//!
//! let mut shell = SampleShell::mount(Sample::new(schema, Model::closed_form(Decay)))?;
//! let mut host = HeadlessHost::new().with_canvas("plot", CanvasSize::default());
//! shell.frame(0.0, &mut host);
//! ```
//!
//! ## Core Concepts
//!
//! ### Parameters
//!
//! A [`ParameterStore`] owns every slider value of one sample. Writes are
//! clamped, snapped to the step grid and bump a revision counter. Renderers
//! and models never write it during a frame.
//!
//! ### Models
//!
//! A model is either closed form ([`ClosedFormModel`], evaluated at sim time
//! `t`) or integrated ([`IntegratedModel`], stepped with bounded sub-steps).
//! It returns a [`Snapshot`] of named scalars, series samples, labels and
//! scene state, all of which must be declared up front.
//!
//! ### Driver
//!
//! The [`AnimationDriver`] turns host frame callbacks into ticks: it
//! observes parameter edits, applies the model's [`HotSwap`] policy,
//! advances sim time and dispatches the snapshot to renderers in order.
//!
//! ### Renderers
//!
//! | Renderer | Draws |
//! |----------|-------|
//! | [`SceneRenderer`] | Particles, schematic glyphs, flow dots |
//! | [`PlotRenderer`] | Line, bar and area series with autoscaled axes |
//! | [`ReadoutRenderer`] | Formatted values and inline diagnostics |
//!
//! ### Particle Classes
//!
//! Use [`ParticleClass`] derive for type-safe class names:
//!
//! ```ignore
//! #[derive(ParticleClass, Clone, Copy, PartialEq)]
//! enum Phase {
//!     Liquid,
//!     Vapour,
//! }
//!
//! ModelDeclaration::new().classes_of::<Phase>();
//! Snapshot::empty().with_target(Phase::Vapour.name(), 40);
//! ```

extern crate self as rtviz;

pub mod driver;
#[cfg(feature = "egui")]
pub mod egui_host;
pub mod error;
pub mod format;
pub mod model;
pub mod params;
pub mod plot;
pub mod readout;
pub mod render;
pub mod samples;
pub mod scene;
pub mod series;
pub mod shell;
pub mod surface;
pub mod time;
pub mod visuals;

pub use driver::{AnimationDriver, DriverConfig, DriverState, FrameHandle, FrameScheduler, ManualScheduler};
pub use error::{ContractError, Error, ParameterError, RenderError, SchemaError};
pub use format::Formatter;
pub use glam::Vec2;
pub use model::{
    ClosedFormModel, DomainPolicy, GlyphState, HotSwap, IntegratedModel, Model, ModelDeclaration,
    ModelInfo, ModelState, ParticleClass, ScalarDecl, SeriesDecl, Snapshot, TimeMode, Timing,
};
pub use params::{ParamSpec, ParamValues, ParameterStore, Scale};
pub use plot::{AxisSpec, PlotRenderer, PlotSeries, PlotSpec, RefValue, ReferenceLine};
pub use readout::{ReadoutEntry, ReadoutRenderer, ReadoutSink, ReadoutSpec, TextReadout};
pub use render::{Frame, HeadlessHost, RenderHost, Renderer};
pub use rtviz_derive::ParticleClass;
pub use scene::{
    Boundary, FlowPathSpec, GlyphKind, GlyphSpec, MotionRule, ParticleClassSpec, Region, SceneRenderer,
    SceneSpec,
};
pub use series::{Eviction, History, SeriesBuffer};
pub use shell::{ControlAction, ControlsSpec, LayoutSpec, Sample, SampleSchema, SampleShell};
pub use surface::{CanvasSize, RecordingSurface, Surface};
pub use time::FrameClock;
pub use visuals::{Color, Palette};

/// Everything a sample author needs.
pub mod prelude {
    pub use crate::driver::{AnimationDriver, DriverConfig, DriverState, FrameScheduler};
    pub use crate::error::Error;
    pub use crate::format::Formatter;
    pub use crate::model::{
        ClosedFormModel, DomainPolicy, GlyphState, HotSwap, IntegratedModel, Model, ModelDeclaration,
        ModelInfo, ModelState, ParticleClass, ScalarDecl, SeriesDecl, Snapshot, Timing,
    };
    pub use crate::params::{ParamSpec, ParamValues, ParameterStore};
    pub use crate::plot::{AxisSpec, PlotSeries, PlotSpec, RefValue, ReferenceLine};
    pub use crate::readout::{ColorRule, ReadoutEntry, ReadoutSpec};
    pub use crate::render::{HeadlessHost, RenderHost};
    pub use crate::scene::{
        Boundary, FlowPathSpec, GlyphKind, GlyphSpec, MotionRule, ParticleClassSpec, Region, SceneSpec, Tint,
    };
    pub use crate::series::Eviction;
    pub use crate::shell::{ControlAction, Sample, SampleSchema, SampleShell};
    pub use crate::surface::CanvasSize;
    pub use crate::visuals::{Color, Palette};
    pub use crate::Vec2;
    pub use rtviz_derive::ParticleClass;
    #[cfg(feature = "egui")]
    pub use crate::egui_host::{parameter_controls, EguiHost, EguiSurface};
    #[cfg(feature = "egui")]
    pub use egui;
}
