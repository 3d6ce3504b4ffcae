//! Error types for rtviz.
//!
//! Construction-time failures (malformed schemas, unknown parameter bindings,
//! evaluator output mismatches) are surfaced as typed errors so a sample
//! fails to mount instead of rendering garbage. Numeric domain problems are
//! not errors: evaluators report them in-band through
//! [`Snapshot::invalid`](crate::model::Snapshot::invalid).

use thiserror::Error;

/// A parameter declaration is malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Two parameters share the same name.
    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),

    /// A parameter was declared with an empty name.
    #[error("parameter name must not be empty")]
    EmptyName,

    /// `min` is not strictly below `max`, or a bound is not finite.
    #[error("parameter '{name}' has an invalid range [{min}, {max}]")]
    InvalidRange { name: String, min: f64, max: f64 },

    /// The step is negative or not finite.
    #[error("parameter '{name}' has an invalid step {step}")]
    InvalidStep { name: String, step: f64 },

    /// Logarithmic parameters need strictly positive bounds.
    #[error("log-scale parameter '{name}' must have min > 0 (got {min})")]
    NonPositiveLogBound { name: String, min: f64 },

    /// The declared initial value lies outside `[min, max]`.
    #[error("parameter '{name}' initial value {initial} is outside [{min}, {max}]")]
    InitialOutOfRange {
        name: String,
        initial: f64,
        min: f64,
        max: f64,
    },

    /// A layout entry references something the schema does not declare.
    #[error("layout references undeclared {kind} '{name}'")]
    UndeclaredReference { kind: &'static str, name: String },

    /// Two canvases or containers share the same id.
    #[error("duplicate canvas id '{0}'")]
    DuplicateCanvas(String),

    /// The schema JSON could not be parsed.
    #[error("failed to parse sample schema: {0}")]
    Parse(String),
}

/// Errors raised by parameter store access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// The name was never declared.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A non-finite raw value was offered to `set`.
    #[error("parameter '{name}' cannot be set to non-finite value {value}")]
    NonFinite { name: String, value: f64 },
}

/// The evaluator produced output that does not match its declaration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("evaluator emitted undeclared scalar '{0}'")]
    UndeclaredScalar(String),

    #[error("evaluator emitted undeclared series '{0}'")]
    UndeclaredSeries(String),

    #[error("evaluator emitted undeclared particle class '{0}'")]
    UndeclaredClass(String),

    #[error("evaluator emitted undeclared glyph '{0}'")]
    UndeclaredGlyph(String),

    #[error("evaluator emitted undeclared flow '{0}'")]
    UndeclaredFlow(String),

    #[error("evaluator emitted undeclared label '{0}'")]
    UndeclaredLabel(String),

    #[error("evaluator emitted undeclared scene field '{0}'")]
    UndeclaredField(String),

    /// A series sample went backwards in time within one append batch.
    #[error("series '{name}' produced non-monotonic time {t} after {previous}")]
    NonMonotonic { name: String, t: f64, previous: f64 },

    /// A scalar landed outside the range its declaration advertises.
    #[error("scalar '{name}' = {value} is outside its declared range [{min}, {max}]")]
    ScalarOutOfRange { name: String, value: f64, min: f64, max: f64 },

    /// A declared output range is not finite or is empty.
    #[error("declared range for '{0}' is not a finite, non-empty interval")]
    InvalidDeclaredRange(String),
}

/// Failure inside one renderer for one frame.
///
/// The driver catches these per renderer; sibling renderers still draw.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The host did not provide the canvas this renderer draws into.
    #[error("render target '{0}' is not available")]
    MissingTarget(String),

    /// The surface rejected a drawing operation.
    #[error("surface error: {0}")]
    Surface(String),

    /// The frame referenced data the renderer could not resolve.
    #[error("renderer '{renderer}' could not resolve '{what}'")]
    Unresolved { renderer: String, what: String },
}

/// Top-level error type aggregating every engine failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
