//! Model evaluator protocol.
//!
//! A model turns a frozen parameter set into a [`Snapshot`]. Two time modes
//! exist and each model picks exactly one by the trait it implements:
//!
//! - [`ClosedFormModel`]: `evaluate(params, origin, t)` is a pure function
//!   of simulation time.
//! - [`IntegratedModel`]: the driver threads `integrate(state, params, dt)`
//!   with sub-stepping and reads a snapshot back through `observe`.
//!
//! Models advertise their outputs up front in a [`ModelDeclaration`]; the
//! driver checks every snapshot against it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::format::Formatter;
use crate::params::ParamValues;
use crate::series::Eviction;

/// Relative tolerance on declared scalar ranges.
const RANGE_SLACK: f64 = 1e-9;

/// Whether a series sample batch is appended or replaces the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    Append,
    Replace,
}

/// Samples produced for one series in one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesUpdate {
    pub samples: Vec<(f64, f64)>,
    pub mode: UpdateMode,
}

/// Appearance state of one schematic glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphState {
    pub active: bool,
    /// `0..1`, drives conductor colour and plate shading.
    pub intensity: f64,
    /// Radians.
    pub rotation: f64,
    /// `0..1` halo strength.
    pub glow: f64,
}

impl Default for GlyphState {
    fn default() -> Self {
        Self {
            active: true,
            intensity: 0.0,
            rotation: 0.0,
            glow: 0.0,
        }
    }
}

impl GlyphState {
    pub fn active(active: bool) -> Self {
        Self {
            active,
            ..Self::default()
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = sanitize_unit(intensity);
        self
    }

    pub fn with_glow(mut self, glow: f64) -> Self {
        self.glow = sanitize_unit(glow);
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = if rotation.is_finite() { rotation } else { 0.0 };
        self
    }
}

fn sanitize_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Spatial part of a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneState {
    /// Target particle count per class.
    pub particle_targets: BTreeMap<String, usize>,
    /// Scalar fields read by motion rules (speed, drift, temperature).
    pub fields: BTreeMap<String, f64>,
    pub glyphs: BTreeMap<String, GlyphState>,
    /// Signed rate per flow path.
    pub flows: BTreeMap<String, f64>,
}

impl SceneState {
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    pub fn target(&self, class: &str) -> usize {
        self.particle_targets.get(class).copied().unwrap_or(0)
    }
}

/// Explicit model memory threaded by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelState(pub Vec<f64>);

impl ModelState {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Component `i`, or NaN when absent.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.0.get(i).copied().unwrap_or(f64::NAN)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Full evaluator output for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub scalars: BTreeMap<String, f64>,
    /// Text outputs such as a spectral region name.
    pub labels: BTreeMap<String, String>,
    pub series: BTreeMap<String, SeriesUpdate>,
    pub scene: SceneState,
    /// Computed state, used to reseed on hot swap.
    pub state: ModelState,
    /// Numeric-domain failure. Renderers dim the last valid frame and the
    /// readout shows the message.
    pub invalid: Option<String>,
    /// The model reached its terminal condition.
    pub finished: bool,
    /// Seed for renderer-side randomness.
    pub seed: Option<u64>,
}

impl Snapshot {
    /// Empty snapshot, also delivered to renderers on teardown.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, name: &str, value: f64) -> Self {
        self.scalars.insert(name.to_string(), value);
        self
    }

    pub fn with_label(mut self, name: &str, text: impl Into<String>) -> Self {
        self.labels.insert(name.to_string(), text.into());
        self
    }

    /// Append one `(t, value)` sample to a series.
    pub fn with_sample(mut self, series: &str, t: f64, value: f64) -> Self {
        self.series
            .entry(series.to_string())
            .or_default()
            .samples
            .push((t, value));
        self
    }

    /// Replace a series' whole history with `samples`.
    pub fn with_series(mut self, series: &str, samples: Vec<(f64, f64)>) -> Self {
        self.series.insert(
            series.to_string(),
            SeriesUpdate {
                samples,
                mode: UpdateMode::Replace,
            },
        );
        self
    }

    pub fn with_target(mut self, class: &str, count: usize) -> Self {
        self.scene.particle_targets.insert(class.to_string(), count);
        self
    }

    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.scene.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_glyph(mut self, id: &str, state: GlyphState) -> Self {
        self.scene.glyphs.insert(id.to_string(), state);
        self
    }

    pub fn with_flow(mut self, id: &str, rate: f64) -> Self {
        self.scene.flows.insert(id.to_string(), rate);
        self
    }

    pub fn with_state(mut self, state: ModelState) -> Self {
        self.state = state;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Flag a numeric-domain failure.
    pub fn invalid(mut self, message: impl Into<String>) -> Self {
        self.invalid = Some(message.into());
        self
    }

    pub fn finished(mut self) -> Self {
        self.finished = true;
        self
    }

    #[inline]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    #[inline]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.labels.is_empty()
            && self.series.is_empty()
            && self.scene == SceneState::default()
    }
}

/// Axis domain a series expects along `t`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Show only the most recent `span` of time.
    FixedWindow { span: f64 },
    /// Grow as data arrive.
    #[default]
    GrowToMax,
    /// Logarithmic `t` axis (spectra, frequency responses).
    LogX,
}

/// Declared scalar output.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarDecl {
    pub name: String,
    pub unit: String,
    pub range: Option<(f64, f64)>,
    pub formatter: Formatter,
}

impl ScalarDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: String::new(),
            range: None,
            formatter: Formatter::default(),
        }
    }

    /// Set the unit and use an engineering formatter for it.
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self.formatter = Formatter::engineering(unit);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }
}

/// Declared series output.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDecl {
    pub name: String,
    pub domain: DomainPolicy,
    pub eviction: Eviction,
}

impl SeriesDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: DomainPolicy::default(),
            eviction: Eviction::default(),
        }
    }

    pub fn domain(mut self, domain: DomainPolicy) -> Self {
        self.domain = domain;
        self
    }

    pub fn eviction(mut self, eviction: Eviction) -> Self {
        self.eviction = eviction;
        self
    }
}

/// Everything a model may emit, fixed at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDeclaration {
    /// Parameters the model reads; each must exist in the store.
    pub parameters: Vec<String>,
    pub scalars: Vec<ScalarDecl>,
    pub labels: Vec<String>,
    pub series: Vec<SeriesDecl>,
    pub classes: Vec<String>,
    pub fields: Vec<String>,
    pub glyphs: Vec<String>,
    pub flows: Vec<String>,
}

impl ModelDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameters(mut self, names: &[&str]) -> Self {
        self.parameters.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn scalar(mut self, decl: ScalarDecl) -> Self {
        self.scalars.push(decl);
        self
    }

    pub fn label(mut self, name: &str) -> Self {
        self.labels.push(name.to_string());
        self
    }

    pub fn series(mut self, decl: SeriesDecl) -> Self {
        self.series.push(decl);
        self
    }

    /// Declare particle classes from a `#[derive(ParticleClass)]` enum.
    pub fn classes_of<C: ParticleClass>(mut self) -> Self {
        self.classes.extend(C::NAMES.iter().map(|s| s.to_string()));
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(name.to_string());
        self
    }

    pub fn glyph(mut self, id: &str) -> Self {
        self.glyphs.push(id.to_string());
        self
    }

    pub fn flow(mut self, id: &str) -> Self {
        self.flows.push(id.to_string());
        self
    }

    pub fn scalar_decl(&self, name: &str) -> Option<&ScalarDecl> {
        self.scalars.iter().find(|s| s.name == name)
    }

    pub fn series_decl(&self, name: &str) -> Option<&SeriesDecl> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Check the declaration itself: declared ranges must be finite and
    /// non-empty.
    pub fn check(&self) -> Result<(), ContractError> {
        for s in &self.scalars {
            if let Some((lo, hi)) = s.range {
                if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                    return Err(ContractError::InvalidDeclaredRange(s.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Check that a snapshot only names declared outputs and that valid
    /// snapshots keep finite scalars inside their declared ranges.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<(), ContractError> {
        fn declared<'a>(mut names: impl Iterator<Item = &'a String>, name: &str) -> bool {
            names.any(|n| n == name)
        }

        for (name, &value) in &snapshot.scalars {
            let Some(decl) = self.scalar_decl(name) else {
                return Err(ContractError::UndeclaredScalar(name.clone()));
            };
            // Invalid snapshots carry placeholders; non-finite values are
            // shown as such by the readout.
            if snapshot.invalid.is_some() || !value.is_finite() {
                continue;
            }
            if let Some((min, max)) = decl.range {
                let slack = (max - min) * RANGE_SLACK;
                if value < min - slack || value > max + slack {
                    return Err(ContractError::ScalarOutOfRange {
                        name: name.clone(),
                        value,
                        min,
                        max,
                    });
                }
            }
        }
        for name in snapshot.labels.keys() {
            if !declared(self.labels.iter(), name) {
                return Err(ContractError::UndeclaredLabel(name.clone()));
            }
        }
        for name in snapshot.series.keys() {
            if !self.series.iter().any(|s| &s.name == name) {
                return Err(ContractError::UndeclaredSeries(name.clone()));
            }
        }
        for name in snapshot.scene.particle_targets.keys() {
            if !declared(self.classes.iter(), name) {
                return Err(ContractError::UndeclaredClass(name.clone()));
            }
        }
        for name in snapshot.scene.fields.keys() {
            if !declared(self.fields.iter(), name) {
                return Err(ContractError::UndeclaredField(name.clone()));
            }
        }
        for name in snapshot.scene.glyphs.keys() {
            if !declared(self.glyphs.iter(), name) {
                return Err(ContractError::UndeclaredGlyph(name.clone()));
            }
        }
        for name in snapshot.scene.flows.keys() {
            if !declared(self.flows.iter(), name) {
                return Err(ContractError::UndeclaredFlow(name.clone()));
            }
        }
        Ok(())
    }
}

/// What the driver does when a hot-swap parameter changes mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotSwap {
    /// Reset sim time to 0 and seed initial conditions from the current
    /// computed state.
    Reseed,
    /// Keep running; the next tick simply uses the new parameters.
    Continue,
    /// Hard reset to the model's declared initial state.
    Restart,
}

/// Real-time pacing declared by a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Simulated interval worth watching, e.g. `5·τ`.
    pub simulation_duration: f64,
    /// Real seconds that interval should take on screen.
    pub real_seconds_per_run: f64,
}

impl Timing {
    pub fn new(simulation_duration: f64, real_seconds_per_run: f64) -> Self {
        Self {
            simulation_duration,
            real_seconds_per_run,
        }
    }

    /// `simulation_duration / real_seconds_per_run`, or 1 when degenerate.
    pub fn time_scale(&self) -> f64 {
        let scale = self.simulation_duration / self.real_seconds_per_run;
        if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Behaviour shared by both time modes.
pub trait ModelInfo {
    /// Outputs this model may emit.
    fn declare(&self) -> ModelDeclaration;

    /// Policy applied when a hot-swap parameter changes.
    fn hot_swap(&self) -> HotSwap;

    /// Real-time pacing for the current parameters.
    fn timing(&self, _params: &ParamValues) -> Timing {
        Timing::default()
    }

    /// Initial conditions for a fresh run.
    fn initial_state(&self, _params: &ParamValues) -> ModelState {
        ModelState::default()
    }
}

/// Model with a closed-form solution in simulation time.
pub trait ClosedFormModel: ModelInfo {
    /// Evaluate at `t`, starting from `origin` (the state at `t = 0`).
    ///
    /// Must be deterministic in `(params, origin, t)`.
    fn evaluate(&self, params: &ParamValues, origin: &ModelState, t: f64) -> Snapshot;
}

/// Model advanced by numerical integration.
pub trait IntegratedModel: ModelInfo {
    /// Advance `state` by `dt` model seconds.
    fn integrate(&self, state: &ModelState, params: &ParamValues, dt: f64) -> ModelState;

    /// Read a snapshot out of `state` at sim time `t`.
    fn observe(&self, state: &ModelState, params: &ParamValues, t: f64) -> Snapshot;

    /// Largest step `integrate` accepts. `None` uses the driver default.
    fn max_step(&self) -> Option<f64> {
        None
    }
}

/// Which time mode a model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    ClosedForm,
    Integrated,
}

/// A model in exactly one time mode.
pub enum Model {
    ClosedForm(Box<dyn ClosedFormModel>),
    Integrated(Box<dyn IntegratedModel>),
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Model").field(&self.mode()).finish()
    }
}

impl Model {
    pub fn closed_form(model: impl ClosedFormModel + 'static) -> Self {
        Model::ClosedForm(Box::new(model))
    }

    pub fn integrated(model: impl IntegratedModel + 'static) -> Self {
        Model::Integrated(Box::new(model))
    }

    pub fn mode(&self) -> TimeMode {
        match self {
            Model::ClosedForm(_) => TimeMode::ClosedForm,
            Model::Integrated(_) => TimeMode::Integrated,
        }
    }

    pub fn declare(&self) -> ModelDeclaration {
        match self {
            Model::ClosedForm(m) => m.declare(),
            Model::Integrated(m) => m.declare(),
        }
    }

    pub fn hot_swap(&self) -> HotSwap {
        match self {
            Model::ClosedForm(m) => m.hot_swap(),
            Model::Integrated(m) => m.hot_swap(),
        }
    }

    pub fn timing(&self, params: &ParamValues) -> Timing {
        match self {
            Model::ClosedForm(m) => m.timing(params),
            Model::Integrated(m) => m.timing(params),
        }
    }

    pub fn initial_state(&self, params: &ParamValues) -> ModelState {
        match self {
            Model::ClosedForm(m) => m.initial_state(params),
            Model::Integrated(m) => m.initial_state(params),
        }
    }
}

/// Particle class enumeration, usually derived with
/// `#[derive(ParticleClass)]`.
///
/// ```ignore
/// #[derive(ParticleClass, Clone, Copy, PartialEq, Debug)]
/// enum Compartment {
///     #[class(rename = "S")]
///     Susceptible,
///     #[class(rename = "I")]
///     Infected,
///     #[class(rename = "R")]
///     Recovered,
/// }
///
/// assert_eq!(Compartment::Infected.name(), "I");
/// assert_eq!(Compartment::count(), 3);
/// ```
pub trait ParticleClass: Copy + Sized + 'static {
    /// Class names in declaration order.
    const NAMES: &'static [&'static str];

    fn index(self) -> usize;

    fn from_index(index: usize) -> Option<Self>;

    fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(Self::from_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl() -> ModelDeclaration {
        ModelDeclaration::new()
            .scalar(ScalarDecl::new("tau").unit("s"))
            .series(SeriesDecl::new("vc"))
            .glyph("resistor")
            .flow("loop")
    }

    #[test]
    fn test_validate_accepts_declared() {
        let snap = Snapshot::empty()
            .with_scalar("tau", 0.1)
            .with_sample("vc", 0.0, 0.0)
            .with_glyph("resistor", GlyphState::default())
            .with_flow("loop", 0.005);
        assert_eq!(decl().validate(&snap), Ok(()));
    }

    #[test]
    fn test_validate_rejects_undeclared() {
        let snap = Snapshot::empty().with_scalar("omega", 1.0);
        assert_eq!(
            decl().validate(&snap),
            Err(ContractError::UndeclaredScalar("omega".into()))
        );

        let snap = Snapshot::empty().with_target("S", 10);
        assert_eq!(
            decl().validate(&snap),
            Err(ContractError::UndeclaredClass("S".into()))
        );
    }

    #[test]
    fn test_declared_range_check() {
        let bad = ModelDeclaration::new().scalar(ScalarDecl::new("x").range(1.0, 1.0));
        assert!(bad.check().is_err());
        assert!(decl().check().is_ok());
    }

    #[test]
    fn test_scalar_outside_declared_range() {
        let decl = ModelDeclaration::new().scalar(ScalarDecl::new("p").range(0.0, 1.0));

        assert_eq!(decl.validate(&Snapshot::empty().with_scalar("p", 1.0)), Ok(()));
        // float noise at the edge is tolerated
        assert_eq!(decl.validate(&Snapshot::empty().with_scalar("p", 1.0 + 1e-15)), Ok(()));
        assert_eq!(
            decl.validate(&Snapshot::empty().with_scalar("p", 1.5)),
            Err(ContractError::ScalarOutOfRange {
                name: "p".into(),
                value: 1.5,
                min: 0.0,
                max: 1.0,
            })
        );

        // placeholders in invalid snapshots and non-finite values pass
        let invalid = Snapshot::empty().with_scalar("p", -3.0).invalid("n must be positive");
        assert_eq!(decl.validate(&invalid), Ok(()));
        assert_eq!(decl.validate(&Snapshot::empty().with_scalar("p", f64::NAN)), Ok(()));
    }

    #[test]
    fn test_time_scale() {
        assert_eq!(Timing::new(0.5, 10.0).time_scale(), 0.05);
        assert_eq!(Timing::new(1.0, 0.0).time_scale(), 1.0);
    }

    #[test]
    fn test_glyph_state_sanitizes() {
        let g = GlyphState::active(true)
            .with_intensity(3.0)
            .with_glow(f64::NAN);
        assert_eq!(g.intensity, 1.0);
        assert_eq!(g.glow, 0.0);
    }

    #[test]
    fn test_snapshot_empty() {
        assert!(Snapshot::empty().is_empty());
        assert!(!Snapshot::empty().with_scalar("tau", 1.0).is_empty());
    }
}
