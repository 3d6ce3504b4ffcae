//! Readout renderer: label/value text with engineering formatting.
//!
//! Pure snapshot-to-text. Values come from scalars, parameters, text labels
//! or small arithmetic expressions over them; colour may follow snapshot
//! state (a "Heating"/"Cooling" label, the sign of a rate).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, SchemaError};
use crate::format::{Formatter, NOT_A_NUMBER};
use crate::model::{ModelDeclaration, Snapshot};
use crate::params::{ParamValues, ParameterStore};
use crate::render::{Frame, RenderHost, Renderer};
use crate::visuals::Color;

/// Operand of a readout expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Scalar(String),
    Param(String),
    Const(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprOp {
    Sum,
    /// First operand minus the rest.
    Difference,
    Product,
    /// First operand divided by the rest.
    Ratio,
}

/// Where a readout value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Scalar(String),
    Param(String),
    /// Text output of the model. Keyed as `text` so it never collides
    /// with the entry's own `label` field once flattened.
    #[serde(rename = "text")]
    Label(String),
    Expr { op: ExprOp, operands: Vec<Operand> },
}

/// Colour driven by snapshot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorRule {
    /// Colour picked by the text of a model label.
    Label {
        label: String,
        map: BTreeMap<String, Color>,
    },
    /// Colour picked by the sign of a scalar.
    Sign {
        scalar: String,
        positive: Color,
        negative: Color,
    },
}

/// One line of the readout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadoutEntry {
    #[serde(flatten)]
    pub source: ValueSource,
    pub label: String,
    #[serde(default)]
    pub formatter: Option<Formatter>,
    #[serde(default)]
    pub color_from: Option<ColorRule>,
    /// Text shown when the value is unavailable or non-finite.
    #[serde(default)]
    pub fallback: Option<String>,
}

impl ReadoutEntry {
    pub fn scalar(name: &str, label: &str) -> Self {
        Self::from_source(ValueSource::Scalar(name.to_string()), label)
    }

    pub fn param(name: &str, label: &str) -> Self {
        Self::from_source(ValueSource::Param(name.to_string()), label)
    }

    pub fn text(name: &str, label: &str) -> Self {
        Self::from_source(ValueSource::Label(name.to_string()), label)
    }

    pub fn expr(op: ExprOp, operands: Vec<Operand>, label: &str) -> Self {
        Self::from_source(ValueSource::Expr { op, operands }, label)
    }

    fn from_source(source: ValueSource, label: &str) -> Self {
        Self {
            source,
            label: label.to_string(),
            formatter: None,
            color_from: None,
            fallback: None,
        }
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn color_from(mut self, rule: ColorRule) -> Self {
        self.color_from = Some(rule);
        self
    }

    pub fn fallback(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }
}

/// Readout layout: a container id and its entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadoutSpec {
    pub container: String,
    pub entries: Vec<ReadoutEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A rendered readout line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutLine {
    pub label: String,
    pub value: String,
    pub color: Option<Color>,
    pub dimmed: bool,
}

/// Host container receiving readout text.
pub trait ReadoutSink {
    /// Start a new frame; previous content is replaced.
    fn begin(&mut self);
    fn line(&mut self, line: ReadoutLine);
    /// Inline message (invalid parameters, contract failures).
    fn message(&mut self, severity: Severity, text: &str);
    fn end(&mut self);
}

/// Readout sink that keeps plain text.
#[derive(Debug, Clone, Default)]
pub struct TextReadout {
    lines: Vec<ReadoutLine>,
    messages: Vec<(Severity, String)>,
    frames: u64,
}

impl TextReadout {
    pub fn lines(&self) -> &[ReadoutLine] {
        &self.lines
    }

    pub fn messages(&self) -> &[(Severity, String)] {
        &self.messages
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Value text for a label.
    pub fn value(&self, label: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.value.as_str())
    }

    pub fn line(&self, label: &str) -> Option<&ReadoutLine> {
        self.lines.iter().find(|l| l.label == label)
    }

    /// Everything as `label: value` lines followed by messages.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for l in &self.lines {
            out.push_str(&l.label);
            out.push_str(": ");
            out.push_str(&l.value);
            out.push('\n');
        }
        for (_, m) in &self.messages {
            out.push_str(m);
            out.push('\n');
        }
        out
    }
}

impl ReadoutSink for TextReadout {
    fn begin(&mut self) {
        self.lines.clear();
        self.messages.clear();
    }

    fn line(&mut self, line: ReadoutLine) {
        self.lines.push(line);
    }

    fn message(&mut self, severity: Severity, text: &str) {
        self.messages.push((severity, text.to_string()));
    }

    fn end(&mut self) {
        self.frames += 1;
    }
}

#[derive(Debug, Clone)]
struct ResolvedEntry {
    entry: ReadoutEntry,
    formatter: Formatter,
}

/// Writes a [`ReadoutSpec`] into a host container each frame.
#[derive(Debug, Clone)]
pub struct ReadoutRenderer {
    container: String,
    entries: Vec<ResolvedEntry>,
}

impl ReadoutRenderer {
    /// Resolve formatters and check every reference against the store and
    /// the model declaration.
    pub fn new(
        spec: &ReadoutSpec,
        store: &ParameterStore,
        decl: &ModelDeclaration,
    ) -> Result<Self, SchemaError> {
        let check_scalar = |name: &str| {
            decl.scalar_decl(name)
                .map(|s| s.formatter.clone())
                .ok_or_else(|| SchemaError::UndeclaredReference {
                    kind: "scalar",
                    name: name.to_string(),
                })
        };
        let check_param = |name: &str| {
            store
                .parameter(name)
                .map(|p| p.spec().formatter.clone())
                .ok_or_else(|| SchemaError::UndeclaredReference {
                    kind: "parameter",
                    name: name.to_string(),
                })
        };

        let mut entries = Vec::with_capacity(spec.entries.len());
        for entry in &spec.entries {
            let natural = match &entry.source {
                ValueSource::Scalar(name) => check_scalar(name)?,
                ValueSource::Param(name) => check_param(name)?,
                ValueSource::Label(name) => {
                    if !decl.labels.iter().any(|l| l == name) {
                        return Err(SchemaError::UndeclaredReference {
                            kind: "label",
                            name: name.clone(),
                        });
                    }
                    Formatter::default()
                }
                ValueSource::Expr { operands, .. } => {
                    let mut first = None;
                    for op in operands {
                        let f = match op {
                            Operand::Scalar(name) => Some(check_scalar(name)?),
                            Operand::Param(name) => Some(check_param(name)?),
                            Operand::Const(_) => None,
                        };
                        if first.is_none() {
                            first = f;
                        }
                    }
                    first.unwrap_or_default()
                }
            };
            match &entry.color_from {
                Some(ColorRule::Sign { scalar, .. }) => {
                    check_scalar(scalar)?;
                }
                Some(ColorRule::Label { label, .. }) if !decl.labels.iter().any(|l| l == label) => {
                    return Err(SchemaError::UndeclaredReference {
                        kind: "label",
                        name: label.clone(),
                    });
                }
                _ => {}
            }
            entries.push(ResolvedEntry {
                formatter: entry.formatter.clone().unwrap_or(natural),
                entry: entry.clone(),
            });
        }

        Ok(Self {
            container: spec.container.clone(),
            entries,
        })
    }

    fn value_text(&self, resolved: &ResolvedEntry, snap: &Snapshot, params: &ParamValues) -> String {
        let entry = &resolved.entry;
        let fallback = || {
            entry
                .fallback
                .clone()
                .unwrap_or_else(|| NOT_A_NUMBER.to_string())
        };
        let number = match &entry.source {
            ValueSource::Label(name) => {
                return snap.label(name).map(str::to_string).unwrap_or_else(fallback);
            }
            ValueSource::Scalar(name) => snap.scalar(name),
            ValueSource::Param(name) => params.try_get(name),
            ValueSource::Expr { op, operands } => evaluate(*op, operands, snap, params),
        };
        match number {
            Some(v) if v.is_finite() => resolved.formatter.format(v),
            _ => fallback(),
        }
    }
}

fn operand_value(op: &Operand, snap: &Snapshot, params: &ParamValues) -> Option<f64> {
    match op {
        Operand::Scalar(name) => snap.scalar(name),
        Operand::Param(name) => params.try_get(name),
        Operand::Const(v) => Some(*v),
    }
}

fn evaluate(op: ExprOp, operands: &[Operand], snap: &Snapshot, params: &ParamValues) -> Option<f64> {
    let mut values = operands.iter().map(|o| operand_value(o, snap, params));
    let first = values.next()??;
    values.try_fold(first, |acc, v| {
        let v = v?;
        Some(match op {
            ExprOp::Sum => acc + v,
            ExprOp::Difference => acc - v,
            ExprOp::Product => acc * v,
            ExprOp::Ratio => acc / v,
        })
    })
}

fn pick_color(rule: &ColorRule, snap: &Snapshot) -> Option<Color> {
    match rule {
        ColorRule::Label { label, map } => snap.label(label).and_then(|t| map.get(t)).copied(),
        ColorRule::Sign {
            scalar,
            positive,
            negative,
        } => snap.scalar(scalar).filter(|v| v.is_finite()).map(|v| {
            if v >= 0.0 {
                *positive
            } else {
                *negative
            }
        }),
    }
}

impl Renderer for ReadoutRenderer {
    fn name(&self) -> &str {
        "readout"
    }

    fn target(&self) -> &str {
        &self.container
    }

    fn render(&mut self, frame: &Frame<'_>, host: &mut dyn RenderHost) -> Result<(), RenderError> {
        let sink = host
            .readout(&self.container)
            .ok_or_else(|| RenderError::MissingTarget(self.container.clone()))?;

        sink.begin();
        if frame.teardown {
            sink.end();
            return Ok(());
        }

        // invalid frames keep showing the last valid values, dimmed
        let snap = frame.display_snapshot();
        let dimmed = frame.is_stale();
        for resolved in &self.entries {
            let value = self.value_text(resolved, snap, frame.params);
            let color = resolved
                .entry
                .color_from
                .as_ref()
                .and_then(|rule| pick_color(rule, snap));
            sink.line(ReadoutLine {
                label: resolved.entry.label.clone(),
                value,
                color,
                dimmed,
            });
        }
        if let Some(msg) = &frame.snapshot.invalid {
            sink.message(Severity::Warning, msg);
        }
        if let Some(diag) = frame.diagnostic {
            sink.message(Severity::Error, diag);
        }
        sink.end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverState;
    use crate::model::ScalarDecl;
    use crate::params::ParamSpec;
    use crate::render::HeadlessHost;
    use crate::series::History;

    fn decl() -> ModelDeclaration {
        ModelDeclaration::new()
            .scalar(ScalarDecl::new("ic").unit("A"))
            .scalar(ScalarDecl::new("vc").unit("V"))
            .label("mode")
    }

    fn store() -> ParameterStore {
        ParameterStore::declare(vec![ParamSpec::linear("Vin", 0.0, 12.0, 0.1, 5.0).unit("V")])
            .unwrap()
    }

    #[test]
    fn test_rejects_undeclared_reference() {
        let spec = ReadoutSpec {
            container: "readout".into(),
            entries: vec![ReadoutEntry::scalar("power", "P")],
        };
        let err = ReadoutRenderer::new(&spec, &store(), &decl()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UndeclaredReference {
                kind: "scalar",
                name: "power".into()
            }
        );
    }

    #[test]
    fn test_expression_and_fallback() {
        let spec = ReadoutSpec {
            container: "readout".into(),
            entries: vec![
                ReadoutEntry::expr(
                    ExprOp::Difference,
                    vec![Operand::Param("Vin".into()), Operand::Scalar("vc".into())],
                    "Vr",
                ),
                ReadoutEntry::scalar("ic", "ic").fallback("n/a"),
            ],
        };
        let r = ReadoutRenderer::new(&spec, &store(), &decl()).unwrap();
        let params = store().get_all();
        let snap = Snapshot::empty()
            .with_scalar("vc", 3.0)
            .with_scalar("ic", f64::NAN);
        assert_eq!(r.value_text(&r.entries[0], &snap, &params), "2.0 V");
        assert_eq!(r.value_text(&r.entries[1], &snap, &params), "n/a");
    }

    #[test]
    fn test_color_from_label() {
        let mut map = BTreeMap::new();
        map.insert("Heating".to_string(), Color::RED);
        map.insert("Cooling".to_string(), Color::BLUE);
        let rule = ColorRule::Label {
            label: "mode".into(),
            map,
        };
        let snap = Snapshot::empty().with_label("mode", "Cooling");
        assert_eq!(pick_color(&rule, &snap), Some(Color::BLUE));
    }

    #[test]
    fn test_entry_json_flattened() {
        let e: ReadoutEntry =
            serde_json::from_str(r#"{"scalar":"vc","label":"Capacitor voltage"}"#).unwrap();
        assert_eq!(e.source, ValueSource::Scalar("vc".into()));
        assert!(e.color_from.is_none());
    }

    #[test]
    fn test_text_entry_survives_json() {
        let spec = ReadoutSpec {
            container: "readout".into(),
            entries: vec![
                ReadoutEntry::text("mode", "Mode"),
                ReadoutEntry::scalar("vc", "Vc"),
            ],
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains(r#""text":"mode""#), "{json}");
        let back: ReadoutSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.entries[0].source, ValueSource::Label("mode".into()));
    }

    fn frame_for<'a>(
        snapshot: &'a Snapshot,
        last_valid: Option<&'a Snapshot>,
        history: &'a History,
        params: &'a ParamValues,
        declaration: &'a ModelDeclaration,
    ) -> Frame<'a> {
        Frame {
            index: 0,
            revision: 0,
            epoch: 0,
            sim_time: 0.0,
            dt: 0.0,
            sim_dt: 0.0,
            snapshot,
            last_valid,
            history,
            params,
            declaration,
            state: DriverState::Running,
            diagnostic: None,
            teardown: false,
        }
    }

    #[test]
    fn test_invalid_frame_shows_last_valid_dimmed() {
        let decl = decl();
        let history = History::from_declaration(&decl);
        let params = store().get_all();
        let spec = ReadoutSpec {
            container: "readout".into(),
            entries: vec![ReadoutEntry::scalar("vc", "Vc")],
        };
        let mut r = ReadoutRenderer::new(&spec, &store(), &decl).unwrap();
        let mut host = HeadlessHost::new().with_readout("readout");

        let valid = Snapshot::empty().with_scalar("vc", 3.0);
        let invalid = Snapshot::empty().invalid("C must be positive");
        r.render(&frame_for(&valid, Some(&valid), &history, &params, &decl), &mut host).unwrap();
        let line = host.text("readout").unwrap().line("Vc").unwrap().clone();
        assert_eq!(line.value, "3.0 V");
        assert!(!line.dimmed);

        r.render(&frame_for(&invalid, Some(&valid), &history, &params, &decl), &mut host).unwrap();
        let readout = host.text("readout").unwrap();
        let line = readout.line("Vc").unwrap();
        assert_eq!(line.value, "3.0 V");
        assert!(line.dimmed);
        assert_eq!(
            readout.messages(),
            &[(Severity::Warning, "C must be positive".to_string())]
        );
    }
}
