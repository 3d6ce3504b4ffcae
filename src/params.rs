//! Parameter store: the observable, ordered set of slider values.
//!
//! Every accepted write bumps a monotonic revision number. The driver
//! stamps each frame with the revision it read, so renderers can tell
//! which parameter set produced the data they are drawing.
//!
//! # Example
//!
//! ```ignore
//! let mut store = ParameterStore::declare(vec![
//!     ParamSpec::linear("Vin", 0.0, 12.0, 0.1, 5.0).unit("V"),
//!     ParamSpec::log("R", 100.0, 100e3, 1000.0).unit("Ω"),
//! ])?;
//!
//! store.set("Vin", 7.33)?;          // snaps to 7.3
//! store.set_position("R", 0.5)?;    // geometric midpoint, ~3.16 kΩ
//! assert_eq!(store.revision(), 2);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ParameterError, SchemaError};
use crate::format::Formatter;

/// Upper bound on queued re-entrant writes processed after one `set`.
const MAX_CASCADE: usize = 1024;

/// Slider mapping between position and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Position maps linearly onto `[min, max]`.
    #[default]
    Linear,
    /// Position `s` maps onto `min · (max/min)^s`.
    Log,
}

fn default_true() -> bool {
    true
}

/// Declaration of one parameter.
///
/// For [`Scale::Linear`] the `step` is measured in value units. For
/// [`Scale::Log`] it is measured in slider-position units (`0..1`), since
/// equal value steps are meaningless on a logarithmic slider. A step of zero
/// means continuous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub step: f64,
    #[serde(default)]
    pub scale: Scale,
    pub initial: f64,
    #[serde(default)]
    pub formatter: Formatter,
    /// Editing this parameter pauses a running driver.
    #[serde(default)]
    pub hold: bool,
    /// Editing this parameter triggers the evaluator's hot-swap policy.
    #[serde(default = "default_true")]
    pub hot_swap: bool,
}

impl ParamSpec {
    /// Linear parameter.
    pub fn linear(name: &str, min: f64, max: f64, step: f64, initial: f64) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            min,
            max,
            step,
            scale: Scale::Linear,
            initial,
            formatter: Formatter::default(),
            hold: false,
            hot_swap: true,
        }
    }

    /// Logarithmic parameter with a continuous slider.
    pub fn log(name: &str, min: f64, max: f64, initial: f64) -> Self {
        Self {
            scale: Scale::Log,
            ..Self::linear(name, min, max, 0.0, initial)
        }
    }

    /// Set the display label.
    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Use the default engineering formatter with this unit.
    pub fn unit(mut self, unit: &str) -> Self {
        self.formatter = Formatter::engineering(unit);
        self
    }

    /// Set an explicit formatter.
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Set the slider step (position units for log parameters).
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Pause the driver when this parameter is edited.
    pub fn hold(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Apply edits without invoking the hot-swap policy.
    pub fn without_hot_swap(mut self) -> Self {
        self.hot_swap = false;
        self
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min >= self.max {
            return Err(SchemaError::InvalidRange {
                name: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        if !self.step.is_finite() || self.step < 0.0 {
            return Err(SchemaError::InvalidStep {
                name: self.name.clone(),
                step: self.step,
            });
        }
        if self.scale == Scale::Log && self.min <= 0.0 {
            return Err(SchemaError::NonPositiveLogBound {
                name: self.name.clone(),
                min: self.min,
            });
        }
        if !self.initial.is_finite() || self.initial < self.min || self.initial > self.max {
            return Err(SchemaError::InitialOutOfRange {
                name: self.name.clone(),
                initial: self.initial,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// A declared parameter with its current value.
#[derive(Debug, Clone)]
pub struct Parameter {
    spec: ParamSpec,
    value: f64,
    changed_at: u64,
}

impl Parameter {
    #[inline]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    /// Revision at which this parameter last changed (0 = never).
    #[inline]
    pub fn changed_at(&self) -> u64 {
        self.changed_at
    }

    /// Current value through the parameter's formatter.
    pub fn display(&self) -> String {
        self.spec.formatter.format(self.value)
    }

    /// Clamp to range and snap to the step grid. Log parameters snap in
    /// slider-position units, the same grid `value_at` uses.
    ///
    /// A value already within rounding distance of a grid point is kept
    /// verbatim so that `set(get())` is a no-op.
    pub fn normalize(&self, raw: f64) -> f64 {
        let spec = &self.spec;
        let clamped = raw.clamp(spec.min, spec.max);
        if spec.step <= 0.0 {
            return clamped;
        }
        let (snapped, tolerance) = match spec.scale {
            Scale::Linear => {
                let n = ((clamped - spec.min) / spec.step).round();
                ((spec.min + n * spec.step).clamp(spec.min, spec.max), spec.step * 1e-9)
            }
            Scale::Log => (self.value_at(self.position_for(clamped)), clamped * 1e-9),
        };
        if (snapped - clamped).abs() <= tolerance {
            clamped
        } else {
            snapped
        }
    }

    /// Value for slider position `s` in `[0, 1]`.
    pub fn value_at(&self, s: f64) -> f64 {
        let spec = &self.spec;
        let s = if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 };
        match spec.scale {
            Scale::Linear => self.normalize(spec.min + s * (spec.max - spec.min)),
            Scale::Log => {
                let s = if spec.step > 0.0 {
                    ((s / spec.step).round() * spec.step).clamp(0.0, 1.0)
                } else {
                    s
                };
                (spec.min * (spec.max / spec.min).powf(s)).clamp(spec.min, spec.max)
            }
        }
    }

    /// Slider position in `[0, 1]` for a value.
    pub fn position_for(&self, value: f64) -> f64 {
        let spec = &self.spec;
        let v = value.clamp(spec.min, spec.max);
        let s = match spec.scale {
            Scale::Linear => (v - spec.min) / (spec.max - spec.min),
            Scale::Log => (v / spec.min).ln() / (spec.max / spec.min).ln(),
        };
        s.clamp(0.0, 1.0)
    }
}

/// Identifier returned by [`ParameterStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a listener sees for one accepted write.
///
/// Writes issued through [`ChangeContext::set`] are queued and applied after
/// every listener has observed the current change.
pub struct ChangeContext<'a> {
    revision: u64,
    name: &'a str,
    value: f64,
    writes: &'a mut Vec<(String, f64)>,
}

impl ChangeContext<'_> {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Queue a write to another parameter.
    pub fn set(&mut self, name: &str, value: f64) {
        self.writes.push((name.to_string(), value));
    }
}

type Listener = Box<dyn FnMut(&mut ChangeContext<'_>)>;

/// Ordered, observable parameter set.
pub struct ParameterStore {
    params: Vec<Parameter>,
    index: Arc<HashMap<String, usize>>,
    names: Arc<[String]>,
    revision: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("params", &self.params)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ParameterStore {
    /// Register the full parameter set. Declaration order is display order.
    pub fn declare(specs: Vec<ParamSpec>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(specs.len());
        let mut params = Vec::with_capacity(specs.len());
        for spec in specs {
            spec.validate()?;
            if index.insert(spec.name.clone(), params.len()).is_some() {
                return Err(SchemaError::DuplicateName(spec.name));
            }
            params.push(Parameter {
                value: spec.initial,
                spec,
                changed_at: 0,
            });
        }
        let names: Arc<[String]> = params.iter().map(|p| p.spec.name.clone()).collect();
        Ok(Self {
            params,
            index: Arc::new(index),
            names,
            revision: 0,
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    /// Current revision. Starts at 0 and increases on each accepted write.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Current value of a parameter.
    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.params[i].value)
    }

    /// Immutable snapshot of every value, stamped with the current revision.
    pub fn get_all(&self) -> ParamValues {
        ParamValues {
            names: Arc::clone(&self.names),
            index: Arc::clone(&self.index),
            values: self.params.iter().map(|p| p.value).collect(),
            revision: self.revision,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Names of parameters changed after `revision`.
    pub fn changed_since(&self, revision: u64) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.changed_at > revision)
            .map(|p| p.name())
            .collect()
    }

    /// Set a value. Returns `true` when the value changed and the revision
    /// was bumped.
    pub fn set(&mut self, name: &str, raw: f64) -> Result<bool, ParameterError> {
        let i = self.lookup(name)?;
        if !raw.is_finite() {
            return Err(ParameterError::NonFinite {
                name: name.to_string(),
                value: raw,
            });
        }
        let value = self.params[i].normalize(raw);
        Ok(self.commit(vec![(i, value)]))
    }

    /// Set a value from a slider position in `[0, 1]`.
    pub fn set_position(&mut self, name: &str, s: f64) -> Result<bool, ParameterError> {
        let i = self.lookup(name)?;
        let value = self.params[i].value_at(s);
        Ok(self.commit(vec![(i, value)]))
    }

    /// Slider position of the current value.
    pub fn position(&self, name: &str) -> Result<f64, ParameterError> {
        let i = self.lookup(name)?;
        Ok(self.params[i].position_for(self.params[i].value))
    }

    /// Restore every parameter to its declared initial value.
    pub fn reset_to_initial(&mut self) -> bool {
        let writes = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.spec.initial))
            .collect();
        self.commit(writes)
    }

    /// Register a listener. Listeners run synchronously in registration order.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&mut ChangeContext<'_>) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn lookup(&self, name: &str) -> Result<usize, ParameterError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))
    }

    /// Apply writes, notify listeners, then drain any writes they queued.
    ///
    /// Queued writes are processed iteratively, never recursively.
    fn commit(&mut self, initial: Vec<(usize, f64)>) -> bool {
        let mut queue: VecDeque<(usize, f64)> = initial.into();
        let mut changed_any = false;
        let mut processed = 0usize;

        while let Some((i, value)) = queue.pop_front() {
            processed += 1;
            if processed > MAX_CASCADE {
                tracing::warn!(
                    dropped = queue.len() + 1,
                    "parameter listener cascade exceeded limit"
                );
                break;
            }
            if self.params[i].value == value {
                continue;
            }
            self.revision += 1;
            self.params[i].value = value;
            self.params[i].changed_at = self.revision;
            changed_any = true;
            tracing::trace!(
                name = %self.params[i].spec.name,
                value,
                revision = self.revision,
                "parameter set"
            );

            let mut writes = Vec::new();
            let mut listeners = std::mem::take(&mut self.listeners);
            for (_, listener) in listeners.iter_mut() {
                let mut ctx = ChangeContext {
                    revision: self.revision,
                    name: &self.params[i].spec.name,
                    value,
                    writes: &mut writes,
                };
                listener(&mut ctx);
            }
            self.listeners = listeners;

            for (name, raw) in writes {
                match self.index.get(&name) {
                    Some(&j) if raw.is_finite() => queue.push_back((j, self.params[j].normalize(raw))),
                    _ => tracing::warn!(%name, raw, "ignoring queued write"),
                }
            }
        }
        changed_any
    }
}

/// Frozen copy of parameter values handed to evaluators.
#[derive(Debug, Clone)]
pub struct ParamValues {
    names: Arc<[String]>,
    index: Arc<HashMap<String, usize>>,
    values: Vec<f64>,
    revision: u64,
}

impl ParamValues {
    /// Build from explicit pairs, mostly useful for evaluating models
    /// outside a store.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        let names: Arc<[String]> = pairs.iter().map(|(n, _)| n.to_string()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            names,
            index: Arc::new(index),
            values: pairs.iter().map(|(_, v)| *v).collect(),
            revision: 0,
        }
    }

    /// Value of `name`, or NaN when undeclared.
    #[inline]
    pub fn get(&self, name: &str) -> f64 {
        self.try_get(name).unwrap_or(f64::NAN)
    }

    #[inline]
    pub fn try_get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    /// Copy with one value replaced. Unknown names are ignored.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        if let Some(&i) = self.index.get(name) {
            self.values[i] = value;
        }
        self
    }

    /// Revision of the store when this snapshot was taken.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl PartialEq for ParamValues {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names && self.values == other.values
    }
}
