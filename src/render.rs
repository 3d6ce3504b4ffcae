//! Renderer trait, per-tick frame and host lookup.
//!
//! The driver builds one [`Frame`] per tick and hands it to every renderer
//! in declared order. All renderers of a tick see the same snapshot and the
//! same parameter revision. Frames borrow driver-owned data, so renderers
//! cannot keep references past the call.

use std::collections::BTreeMap;

use crate::driver::DriverState;
use crate::error::RenderError;
use crate::model::{ModelDeclaration, Snapshot};
use crate::params::ParamValues;
use crate::readout::{ReadoutSink, TextReadout};
use crate::series::History;
use crate::surface::{CanvasSize, RecordingSurface, Surface};

/// Everything a renderer may read for one tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Tick counter.
    pub index: u64,
    /// Parameter revision that produced `snapshot`.
    pub revision: u64,
    /// Bumped on reset and hard restarts; renderers drop spatial state.
    pub epoch: u64,
    pub sim_time: f64,
    /// Real seconds since the previous tick (0 when paused or redrawing).
    pub dt: f64,
    /// Model seconds advanced this tick.
    pub sim_dt: f64,
    pub snapshot: &'a Snapshot,
    /// Most recent snapshot without an `invalid` flag.
    pub last_valid: Option<&'a Snapshot>,
    pub history: &'a History,
    pub params: &'a ParamValues,
    pub declaration: &'a ModelDeclaration,
    pub state: DriverState,
    /// Contract failure shown inline by the readout.
    pub diagnostic: Option<&'a str>,
    /// Final frame before the driver releases its renderers.
    pub teardown: bool,
}

impl<'a> Frame<'a> {
    /// Snapshot to draw: the current one, or the last valid one when the
    /// current snapshot is flagged invalid.
    pub fn display_snapshot(&self) -> &'a Snapshot {
        match (&self.snapshot.invalid, self.last_valid) {
            (Some(_), Some(valid)) => valid,
            _ => self.snapshot,
        }
    }

    /// Whether renderers should draw dimmed.
    pub fn is_stale(&self) -> bool {
        self.snapshot.invalid.is_some() || self.diagnostic.is_some()
    }
}

/// A component that turns frames into pixels or text.
pub trait Renderer {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Canvas or container id this renderer owns.
    fn target(&self) -> &str;

    /// Draw one frame. Must tolerate an empty teardown frame.
    fn render(&mut self, frame: &Frame<'_>, host: &mut dyn RenderHost) -> Result<(), RenderError>;
}

/// Host-side lookup of drawing targets by id.
pub trait RenderHost {
    fn surface(&mut self, id: &str) -> Option<&mut dyn Surface>;
    fn readout(&mut self, id: &str) -> Option<&mut dyn ReadoutSink>;
}

/// Dispatch a frame to each renderer in order.
///
/// A failing renderer is logged and skipped; the rest still draw. Returns
/// the failures for callers that want to surface them.
pub fn dispatch(
    renderers: &mut [Box<dyn Renderer>],
    frame: &Frame<'_>,
    host: &mut dyn RenderHost,
) -> Vec<(String, RenderError)> {
    let mut failures = Vec::new();
    for renderer in renderers.iter_mut() {
        if let Err(err) = renderer.render(frame, host) {
            tracing::warn!(
                renderer = renderer.name(),
                target = renderer.target(),
                frame = frame.index,
                error = %err,
                "render skipped"
            );
            failures.push((renderer.name().to_string(), err));
        }
    }
    failures
}

/// In-memory host: recording canvases and text readouts.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    surfaces: BTreeMap<String, RecordingSurface>,
    readouts: BTreeMap<String, TextReadout>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canvas(mut self, id: &str, size: CanvasSize) -> Self {
        self.add_canvas(id, size);
        self
    }

    pub fn with_readout(mut self, id: &str) -> Self {
        self.readouts.insert(id.to_string(), TextReadout::default());
        self
    }

    pub fn add_canvas(&mut self, id: &str, size: CanvasSize) {
        self.surfaces
            .insert(id.to_string(), RecordingSurface::new(size));
    }

    pub fn canvas(&self, id: &str) -> Option<&RecordingSurface> {
        self.surfaces.get(id)
    }

    pub fn canvas_mut(&mut self, id: &str) -> Option<&mut RecordingSurface> {
        self.surfaces.get_mut(id)
    }

    pub fn text(&self, id: &str) -> Option<&TextReadout> {
        self.readouts.get(id)
    }

    /// Drop recorded commands on every canvas.
    pub fn clear_commands(&mut self) {
        for s in self.surfaces.values_mut() {
            s.take_commands();
        }
    }
}

impl RenderHost for HeadlessHost {
    fn surface(&mut self, id: &str) -> Option<&mut dyn Surface> {
        self.surfaces
            .get_mut(id)
            .map(|s| s as &mut dyn Surface)
    }

    fn readout(&mut self, id: &str) -> Option<&mut dyn ReadoutSink> {
        self.readouts
            .get_mut(id)
            .map(|r| r as &mut dyn ReadoutSink)
    }
}
