//! Sample shell: mounts a declarative sample onto a driver.
//!
//! A [`SampleSchema`] declares parameters, layout and controls. Mounting it
//! together with a [`Model`] creates the sample's own [`ParameterStore`],
//! builds one renderer per layout entry (scenes, then plots, then the
//! readout) and binds them to an [`AnimationDriver`]. Host input (sliders,
//! numeric fields, buttons, resizes) is forwarded through the shell.
//!
//! # Example
//!
//! ```ignore
//! let mut shell = SampleShell::mount(samples::rc_lowpass())?;
//! let mut host = HeadlessHost::new()
//!     .with_canvas("rc-scene", CanvasSize::default())
//!     .with_readout("rc-readout");
//! shell.frame(0.0, &mut host);
//! shell.set_param("R", 2200.0)?;
//! shell.frame(0.016, &mut host);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::driver::{AnimationDriver, DriverConfig, DriverState, FrameScheduler};
use crate::error::{Error, ParameterError, RenderError, SchemaError};
use crate::model::Model;
use crate::params::{ParamSpec, ParameterStore};
use crate::plot::{PlotRenderer, PlotSpec};
use crate::readout::{ReadoutRenderer, ReadoutSpec};
use crate::render::RenderHost;
use crate::scene::{SceneRenderer, SceneSpec};
use crate::surface::CanvasSize;

fn default_true() -> bool {
    true
}

/// Renderer layout of a sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSpec {
    #[serde(default)]
    pub readout: Option<ReadoutSpec>,
    #[serde(default)]
    pub scenes: Vec<SceneSpec>,
    #[serde(default)]
    pub plots: Vec<PlotSpec>,
}

/// What a custom button does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlAction {
    /// Write a fixed value.
    SetParam { name: String, value: f64 },
    /// Flip a parameter between its bounds (switches, toggles).
    Toggle { name: String },
    /// Restore every parameter to its initial value.
    ResetParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomControl {
    pub id: String,
    pub label: String,
    pub action: ControlAction,
}

/// Buttons the host should show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsSpec {
    #[serde(default = "default_true")]
    pub pause: bool,
    #[serde(default = "default_true")]
    pub reset: bool,
    #[serde(default)]
    pub custom: Vec<CustomControl>,
}

impl Default for ControlsSpec {
    fn default() -> Self {
        Self {
            pause: true,
            reset: true,
            custom: Vec::new(),
        }
    }
}

/// Declarative part of a sample, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSchema {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub parameters: Vec<ParamSpec>,
    #[serde(default)]
    pub layout: LayoutSpec,
    #[serde(default)]
    pub controls: ControlsSpec,
    #[serde(default)]
    pub driver: DriverConfig,
}

impl SampleSchema {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            parameters: Vec::new(),
            layout: LayoutSpec::default(),
            controls: ControlsSpec::default(),
            driver: DriverConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        serde_json::to_string_pretty(self).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn readout(mut self, spec: ReadoutSpec) -> Self {
        self.layout.readout = Some(spec);
        self
    }

    pub fn scene(mut self, spec: SceneSpec) -> Self {
        self.layout.scenes.push(spec);
        self
    }

    pub fn plot(mut self, spec: PlotSpec) -> Self {
        self.layout.plots.push(spec);
        self
    }

    pub fn control(mut self, id: &str, label: &str, action: ControlAction) -> Self {
        self.controls.custom.push(CustomControl {
            id: id.to_string(),
            label: label.to_string(),
            action,
        });
        self
    }

    /// Every canvas and container id, in render order.
    pub fn targets(&self) -> Vec<&str> {
        let layout = &self.layout;
        layout
            .scenes
            .iter()
            .map(|s| s.canvas_id.as_str())
            .chain(layout.plots.iter().map(|p| p.canvas_id.as_str()))
            .chain(layout.readout.iter().map(|r| r.container.as_str()))
            .collect()
    }
}

/// Schema plus evaluator.
#[derive(Debug)]
pub struct Sample {
    pub schema: SampleSchema,
    pub model: Model,
}

impl Sample {
    pub fn new(schema: SampleSchema, model: Model) -> Self {
        Self { schema, model }
    }
}

/// A mounted sample: store, driver and renderers.
#[derive(Debug)]
pub struct SampleShell {
    schema: SampleSchema,
    store: ParameterStore,
    driver: AnimationDriver,
}

impl SampleShell {
    /// Validate the schema and bind renderers to a fresh driver.
    pub fn mount(sample: Sample) -> Result<Self, Error> {
        let Sample { schema, model } = sample;
        let store = ParameterStore::declare(schema.parameters.clone())?;
        let mut driver = AnimationDriver::new(model, &store, schema.driver.clone())?;

        let mut seen = BTreeSet::new();
        for id in schema.targets() {
            if !seen.insert(id) {
                return Err(SchemaError::DuplicateCanvas(id.to_string()).into());
            }
        }
        for control in &schema.controls.custom {
            let name = match &control.action {
                ControlAction::SetParam { name, .. } | ControlAction::Toggle { name } => name,
                ControlAction::ResetParameters => continue,
            };
            if !store.contains(name) {
                return Err(SchemaError::UndeclaredReference {
                    kind: "parameter",
                    name: name.clone(),
                }
                .into());
            }
        }

        for scene in &schema.layout.scenes {
            let renderer = SceneRenderer::new(scene.clone(), driver.declaration())?;
            driver.attach(Box::new(renderer));
        }
        for plot in &schema.layout.plots {
            let renderer = PlotRenderer::new(plot.clone(), &store, driver.declaration())?;
            driver.attach(Box::new(renderer));
        }
        if let Some(readout) = &schema.layout.readout {
            let renderer = ReadoutRenderer::new(readout, &store, driver.declaration())?;
            driver.attach(Box::new(renderer));
        }

        tracing::info!(sample = %schema.id, params = store.len(), "sample mounted");
        Ok(Self {
            schema,
            store,
            driver,
        })
    }

    pub fn id(&self) -> &str {
        &self.schema.id
    }

    pub fn title(&self) -> &str {
        &self.schema.title
    }

    pub fn schema(&self) -> &SampleSchema {
        &self.schema
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Mutable store access for hosts that bind widgets directly.
    pub fn store_mut(&mut self) -> &mut ParameterStore {
        &mut self.store
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.driver.diagnostic()
    }

    /// Install the host's frame scheduler.
    pub fn set_scheduler(&mut self, scheduler: Box<dyn FrameScheduler>) {
        self.driver.set_scheduler(scheduler);
    }

    // ========== Frame loop ==========

    /// Host frame callback at timestamp `now` (seconds).
    pub fn frame(&mut self, now: f64, host: &mut dyn RenderHost) -> DriverState {
        self.driver.tick(&self.store, now, host)
    }

    // ========== Input ==========

    /// Slider or numeric input. Returns whether the value changed.
    pub fn set_param(&mut self, name: &str, value: f64) -> Result<bool, ParameterError> {
        self.store.set(name, value)
    }

    /// Slider position in `[0, 1]`, mapped through the parameter's scale.
    pub fn set_position(&mut self, name: &str, position: f64) -> Result<bool, ParameterError> {
        self.store.set_position(name, position)
    }

    /// Numeric text field. Unparseable text is rejected like a non-finite
    /// value and leaves the store untouched.
    pub fn set_from_text(&mut self, name: &str, text: &str) -> Result<bool, ParameterError> {
        let value = text.trim().parse::<f64>().unwrap_or(f64::NAN);
        self.store.set(name, value)
    }

    /// Text shown next to a slider, formatted with the parameter's formatter.
    pub fn display(&self, name: &str) -> Result<String, ParameterError> {
        self.store
            .parameter(name)
            .map(|p| p.display())
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))
    }

    pub fn pause(&mut self) {
        self.driver.pause();
    }

    pub fn play(&mut self) {
        self.driver.resume();
    }

    pub fn toggle_pause(&mut self) {
        self.driver.toggle_pause();
    }

    /// Reset button: fresh initial conditions, error flag cleared.
    pub fn reset(&mut self) {
        self.driver.reset();
    }

    /// Restore every parameter to its declared initial value.
    pub fn reset_parameters(&mut self) -> bool {
        self.store.reset_to_initial()
    }

    /// Custom button press.
    pub fn press(&mut self, control_id: &str) -> Result<bool, Error> {
        let control = self
            .schema
            .controls
            .custom
            .iter()
            .find(|c| c.id == control_id)
            .ok_or_else(|| SchemaError::UndeclaredReference {
                kind: "control",
                name: control_id.to_string(),
            })?;
        tracing::debug!(control = control_id, "control pressed");
        let changed = match &control.action {
            ControlAction::SetParam { name, value } => self.store.set(name, *value)?,
            ControlAction::Toggle { name } => {
                let p = self
                    .store
                    .parameter(name)
                    .ok_or_else(|| ParameterError::UnknownParameter(name.clone()))?;
                let spec = p.spec();
                let mid = (spec.min + spec.max) / 2.0;
                let target = if p.value() > mid { spec.min } else { spec.max };
                self.store.set(name, target)?
            }
            ControlAction::ResetParameters => self.store.reset_to_initial(),
        };
        Ok(changed)
    }

    // ========== Host events ==========

    /// Resize one canvas and redraw the last snapshot.
    pub fn resize(
        &mut self,
        canvas_id: &str,
        size: CanvasSize,
        host: &mut dyn RenderHost,
    ) -> Result<(), RenderError> {
        let surface = host
            .surface(canvas_id)
            .ok_or_else(|| RenderError::MissingTarget(canvas_id.to_string()))?;
        surface.resize(size);
        tracing::debug!(
            canvas = canvas_id,
            width = size.backing_width(),
            height = size.backing_height(),
            "canvas resized"
        );
        self.driver.redraw(host);
        Ok(())
    }

    /// Tab or window visibility change.
    pub fn set_visible(&mut self, visible: bool) {
        self.driver.set_visible(visible);
    }

    /// Cancel the frame loop and release renderers.
    pub fn teardown(&mut self, host: &mut dyn RenderHost) {
        self.driver.teardown(host);
        tracing::info!(sample = %self.schema.id, "sample unmounted");
    }
}
