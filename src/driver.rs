//! Animation driver: one cooperative loop per sample.
//!
//! Each host frame callback is one tick:
//!
//! 1. read the store revision and apply the hot-swap / hold policy,
//! 2. compute a clamped real `dt` from the host timestamp,
//! 3. advance sim time by `dt · timeScale`,
//! 4. evaluate (closed form) or integrate with sub-steps,
//! 5. validate and dispatch the snapshot to every renderer in order.
//!
//! The driver borrows the store immutably for the whole tick, so nothing
//! dispatched inside a frame can write parameters; edits land between
//! ticks and back-to-back edits collapse to the latest value.

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Error, ParameterError};
use crate::model::{HotSwap, Model, ModelDeclaration, ModelState, Snapshot};
use crate::params::{ParamValues, ParameterStore};
use crate::render::{dispatch, Frame, RenderHost, Renderer};
use crate::series::History;
use crate::time::FrameClock;

fn default_max_frame_gap() -> f64 {
    0.1
}

fn default_max_integration_step() -> f64 {
    0.02
}

fn default_max_substeps() -> usize {
    10_000
}

fn default_seed() -> u64 {
    0x5EED
}

/// Driver tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Largest real `dt` accepted for one frame, in seconds.
    #[serde(default = "default_max_frame_gap")]
    pub max_frame_gap: f64,
    /// Largest model-time step handed to `integrate`.
    #[serde(default = "default_max_integration_step")]
    pub max_integration_step: f64,
    /// Cap on integration sub-steps per tick.
    #[serde(default = "default_max_substeps")]
    pub max_substeps: usize,
    /// Seed stamped on snapshots that do not carry their own.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_frame_gap: default_max_frame_gap(),
            max_integration_step: default_max_integration_step(),
            max_substeps: default_max_substeps(),
            seed: default_seed(),
        }
    }
}

/// Run state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Paused,
    Finished,
}

/// Handle to a pending host frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub u64);

/// Host frame scheduler (request / cancel next paint).
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler that only counts requests, for headless hosts.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Option<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

/// Drives one model and its renderers.
pub struct AnimationDriver {
    model: Model,
    declaration: ModelDeclaration,
    config: DriverConfig,
    clock: FrameClock,
    state: DriverState,
    renderers: Vec<Box<dyn Renderer>>,
    history: History,
    params: ParamValues,
    seen_revision: u64,
    time_scale: f64,
    sim_time: f64,
    /// Initial conditions for closed-form evaluation.
    origin: ModelState,
    /// Current state for integrated models.
    model_state: ModelState,
    snapshot: Snapshot,
    last_valid: Option<Snapshot>,
    frame_index: u64,
    epoch: u64,
    diagnostic: Option<String>,
    hidden: bool,
    scheduler: Option<Box<dyn FrameScheduler>>,
    pending: Option<FrameHandle>,
    torn_down: bool,
}

impl std::fmt::Debug for AnimationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationDriver")
            .field("model", &self.model)
            .field("state", &self.state)
            .field("sim_time", &self.sim_time)
            .field("time_scale", &self.time_scale)
            .field("revision", &self.seen_revision)
            .field("renderers", &self.renderers.len())
            .finish()
    }
}

impl AnimationDriver {
    /// Bind a model to a store.
    ///
    /// Fails when the model reads a parameter the store does not declare, or
    /// when its output declaration is malformed.
    pub fn new(model: Model, store: &ParameterStore, config: DriverConfig) -> Result<Self, Error> {
        let declaration = model.declare();
        declaration.check()?;
        for name in &declaration.parameters {
            if !store.contains(name) {
                return Err(ParameterError::UnknownParameter(name.clone()).into());
            }
        }

        let params = store.get_all();
        let origin = model.initial_state(&params);
        let time_scale = model.timing(&params).time_scale();
        tracing::debug!(mode = ?model.mode(), time_scale, "driver created");

        Ok(Self {
            history: History::from_declaration(&declaration),
            declaration,
            clock: FrameClock::new(config.max_frame_gap),
            config,
            state: DriverState::Running,
            renderers: Vec::new(),
            seen_revision: params.revision(),
            params,
            time_scale,
            sim_time: 0.0,
            model_state: origin.clone(),
            origin,
            model,
            snapshot: Snapshot::empty(),
            last_valid: None,
            frame_index: 0,
            epoch: 0,
            diagnostic: None,
            hidden: false,
            scheduler: None,
            pending: None,
            torn_down: false,
        })
    }

    /// Attach a renderer. Render order is attachment order.
    pub fn attach(&mut self, renderer: Box<dyn Renderer>) {
        self.renderers.push(renderer);
    }

    /// Install the host frame scheduler and request the first frame.
    pub fn set_scheduler(&mut self, scheduler: Box<dyn FrameScheduler>) {
        self.scheduler = Some(scheduler);
        if self.state == DriverState::Running {
            self.request_next();
        }
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[inline]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    #[inline]
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Revision used for the latest frame.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.seen_revision
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn last_valid(&self) -> Option<&Snapshot> {
        self.last_valid.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn declaration(&self) -> &ModelDeclaration {
        &self.declaration
    }

    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Playback speed multiplier on top of the model's time scale.
    pub fn set_playback_speed(&mut self, speed: f64) {
        self.clock.set_time_scale(speed);
    }

    /// Contract failure message, if the driver stopped on one.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Run one tick for host timestamp `now` (seconds).
    pub fn tick(
        &mut self,
        store: &ParameterStore,
        now: f64,
        host: &mut dyn RenderHost,
    ) -> DriverState {
        if self.torn_down {
            return self.state;
        }
        self.pending = None;

        let revision_changed = store.revision() != self.seen_revision;
        if revision_changed {
            self.observe_edits(store);
        }

        let dt = self.clock.update(now);
        let mut sim_dt = 0.0;

        if self.state == DriverState::Running {
            sim_dt = dt * self.time_scale;
            self.snapshot = self.advance(sim_dt);
        } else if revision_changed || self.snapshot.is_empty() {
            self.snapshot = self.advance(0.0);
        }

        self.accept_snapshot(sim_dt > 0.0);
        self.frame_index += 1;
        self.render_frame(dt, sim_dt, false, host);

        if self.state == DriverState::Running {
            self.request_next();
        }
        self.state
    }

    /// Redraw the current snapshot without advancing (resize, visibility).
    pub fn redraw(&mut self, host: &mut dyn RenderHost) {
        if self.torn_down {
            return;
        }
        self.render_frame(0.0, 0.0, false, host);
    }

    pub fn pause(&mut self) {
        if self.state == DriverState::Running {
            self.state = DriverState::Paused;
            self.clock.pause();
            self.cancel_pending();
            tracing::debug!(sim_time = self.sim_time, "driver paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == DriverState::Paused {
            self.state = DriverState::Running;
            self.hidden = false;
            self.clock.resume();
            self.request_next();
            tracing::debug!(sim_time = self.sim_time, "driver resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            DriverState::Running => self.pause(),
            DriverState::Paused => self.resume(),
            DriverState::Finished => {}
        }
    }

    /// Host visibility change. Hiding pauses a running driver; showing
    /// resumes only if hiding paused it.
    pub fn set_visible(&mut self, visible: bool) {
        if !visible && self.state == DriverState::Running {
            self.pause();
            self.hidden = true;
        } else if visible && self.hidden {
            self.hidden = false;
            self.resume();
        }
    }

    /// Restart from fresh initial conditions with the current parameters.
    pub fn reset(&mut self) {
        if self.torn_down {
            return;
        }
        self.origin = self.model.initial_state(&self.params);
        self.model_state = self.origin.clone();
        self.sim_time = 0.0;
        self.history.clear();
        self.snapshot = Snapshot::empty();
        self.last_valid = None;
        self.diagnostic = None;
        self.epoch += 1;
        self.hidden = false;
        self.clock.reset();
        self.state = DriverState::Running;
        self.request_next();
        tracing::debug!(epoch = self.epoch, "driver reset");
    }

    /// Cancel the pending frame, deliver an empty teardown frame and drop
    /// every renderer.
    pub fn teardown(&mut self, host: &mut dyn RenderHost) {
        if self.torn_down {
            return;
        }
        self.cancel_pending();
        self.snapshot = Snapshot::empty();
        self.last_valid = None;
        self.render_frame(0.0, 0.0, true, host);
        self.renderers.clear();
        self.scheduler = None;
        self.state = DriverState::Finished;
        self.torn_down = true;
        tracing::debug!(frames = self.frame_index, "driver torn down");
    }

    fn observe_edits(&mut self, store: &ParameterStore) {
        let (hold, hot) = store
            .changed_since(self.seen_revision)
            .into_iter()
            .filter_map(|name| store.parameter(name))
            .fold((false, false), |(h, s), p| {
                (h || p.spec().hold, s || p.spec().hot_swap)
            });

        self.params = store.get_all();
        self.seen_revision = self.params.revision();
        self.time_scale = self.model.timing(&self.params).time_scale();

        if hold && self.state == DriverState::Running {
            self.pause();
        }
        if hot {
            self.hot_swap();
        }
    }

    fn hot_swap(&mut self) {
        let policy = self.model.hot_swap();
        tracing::debug!(?policy, sim_time = self.sim_time, "hot swap");
        match policy {
            HotSwap::Continue => {}
            HotSwap::Reseed => {
                if !self.snapshot.state.is_empty() {
                    self.origin = self.snapshot.state.clone();
                }
                self.sim_time = 0.0;
                self.history.clear();
                if self.state == DriverState::Finished && self.diagnostic.is_none() {
                    self.state = DriverState::Running;
                }
            }
            HotSwap::Restart => {
                self.origin = self.model.initial_state(&self.params);
                self.model_state = self.origin.clone();
                self.sim_time = 0.0;
                self.history.clear();
                self.epoch += 1;
                if self.state == DriverState::Finished && self.diagnostic.is_none() {
                    self.state = DriverState::Running;
                }
            }
        }
    }

    /// Advance sim time by `sim_dt` and produce a snapshot.
    fn advance(&mut self, sim_dt: f64) -> Snapshot {
        match &self.model {
            Model::ClosedForm(m) => {
                self.sim_time += sim_dt;
                m.evaluate(&self.params, &self.origin, self.sim_time)
            }
            Model::Integrated(m) => {
                if sim_dt > 0.0 {
                    let max_step = m
                        .max_step()
                        .filter(|s| s.is_finite() && *s > 0.0)
                        .unwrap_or(self.config.max_integration_step)
                        .max(f64::EPSILON);
                    let steps = ((sim_dt / max_step).ceil() as usize)
                        .clamp(1, self.config.max_substeps.max(1));
                    let h = sim_dt / steps as f64;
                    for _ in 0..steps {
                        self.model_state = m.integrate(&self.model_state, &self.params, h);
                    }
                    self.sim_time += sim_dt;
                }
                m.observe(&self.model_state, &self.params, self.sim_time)
            }
        }
    }

    /// Validate the fresh snapshot and fold it into history.
    fn accept_snapshot(&mut self, advanced: bool) {
        let checked = self
            .declaration
            .validate(&self.snapshot)
            .and_then(|()| {
                if self.snapshot.invalid.is_none() {
                    self.history
                        .apply(&self.snapshot, self.params.revision(), advanced)
                } else {
                    Ok(())
                }
            });

        if let Err(err) = checked {
            self.fail_contract(err);
            return;
        }

        if self.snapshot.seed.is_none() {
            self.snapshot.seed = Some(self.config.seed);
        }
        if self.snapshot.invalid.is_none() {
            self.last_valid = Some(self.snapshot.clone());
        }
        if self.snapshot.finished && self.state == DriverState::Running {
            self.state = DriverState::Finished;
            self.cancel_pending();
            tracing::debug!(sim_time = self.sim_time, "model finished");
        }
    }

    fn fail_contract(&mut self, err: ContractError) {
        tracing::warn!(error = %err, frame = self.frame_index, "evaluator contract violated");
        self.diagnostic = Some(err.to_string());
        self.snapshot = Snapshot::empty();
        self.state = DriverState::Finished;
        self.cancel_pending();
    }

    fn render_frame(&mut self, dt: f64, sim_dt: f64, teardown: bool, host: &mut dyn RenderHost) {
        let frame = Frame {
            index: self.frame_index,
            revision: self.params.revision(),
            epoch: self.epoch,
            sim_time: self.sim_time,
            dt,
            sim_dt,
            snapshot: &self.snapshot,
            last_valid: self.last_valid.as_ref(),
            history: &self.history,
            params: &self.params,
            declaration: &self.declaration,
            state: self.state,
            diagnostic: self.diagnostic.as_deref(),
            teardown,
        };
        dispatch(&mut self.renderers, &frame, host);
    }

    fn request_next(&mut self) {
        if self.pending.is_some() || self.torn_down {
            return;
        }
        if let Some(scheduler) = self.scheduler.as_mut() {
            self.pending = Some(scheduler.request_frame());
        }
    }

    fn cancel_pending(&mut self) {
        if let (Some(handle), Some(scheduler)) = (self.pending.take(), self.scheduler.as_mut()) {
            scheduler.cancel_frame(handle);
        }
    }
}
