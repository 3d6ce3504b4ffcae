//! Bounded history buffers for time-series output.
//!
//! The driver owns one [`SeriesBuffer`] per declared series and hands them to
//! renderers by reference for the current frame only.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::model::{DomainPolicy, ModelDeclaration, Snapshot, UpdateMode};

/// How old samples leave a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Eviction {
    /// Keep at most `max_len` samples.
    Ring { max_len: usize },
    /// Keep samples newer than `latest − span`, capped at `max_len`.
    Window { span: f64, max_len: usize },
}

impl Eviction {
    /// Maximum number of samples the buffer can hold.
    pub fn bound(&self) -> usize {
        match *self {
            Eviction::Ring { max_len } | Eviction::Window { max_len, .. } => max_len.max(1),
        }
    }
}

impl Default for Eviction {
    fn default() -> Self {
        Eviction::Ring { max_len: 2048 }
    }
}

/// One stored sample, stamped with the parameter revision that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub t: f64,
    pub value: f64,
    pub revision: u64,
}

/// Ring of `(t, value)` samples with strictly increasing `t`.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    name: String,
    points: VecDeque<SeriesPoint>,
    eviction: Eviction,
    generation: u64,
}

impl SeriesBuffer {
    pub fn new(name: &str, eviction: Eviction) -> Self {
        Self {
            name: name.to_string(),
            points: VecDeque::with_capacity(eviction.bound().min(4096)),
            eviction,
            generation: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eviction(&self) -> Eviction {
        self.eviction
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bumped every time history is discarded (reset, hot swap, replace).
    /// Autoscaling axes use it to forget their observed extent.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.front()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SeriesPoint> + ExactSizeIterator {
        self.points.iter()
    }

    /// Append one sample. Rejects timestamps that do not advance.
    pub fn push(&mut self, t: f64, value: f64, revision: u64) -> Result<(), ContractError> {
        if let Some(last) = self.points.back() {
            if !advances(last.t, t) {
                return Err(ContractError::NonMonotonic {
                    name: self.name.clone(),
                    t,
                    previous: last.t,
                });
            }
        } else if !t.is_finite() {
            return Err(ContractError::NonMonotonic {
                name: self.name.clone(),
                t,
                previous: f64::NEG_INFINITY,
            });
        }
        self.points.push_back(SeriesPoint { t, value, revision });
        self.evict();
        Ok(())
    }

    /// Append a batch. Stops at the first rejected sample.
    pub fn extend(&mut self, samples: &[(f64, f64)], revision: u64) -> Result<(), ContractError> {
        for &(t, v) in samples {
            self.push(t, v, revision)?;
        }
        Ok(())
    }

    /// Replace the whole contents (bar charts, spectra). The batch must be
    /// strictly increasing in `t`; only the newest `bound` samples are kept.
    pub fn replace(&mut self, samples: &[(f64, f64)], revision: u64) -> Result<(), ContractError> {
        for pair in samples.windows(2) {
            if !advances(pair[0].0, pair[1].0) {
                return Err(ContractError::NonMonotonic {
                    name: self.name.clone(),
                    t: pair[1].0,
                    previous: pair[0].0,
                });
            }
        }
        self.points.clear();
        self.generation += 1;
        let skip = samples.len().saturating_sub(self.eviction.bound());
        self.points.extend(
            samples[skip..]
                .iter()
                .map(|&(t, value)| SeriesPoint { t, value, revision }),
        );
        Ok(())
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.points.clear();
        self.generation += 1;
    }

    /// `(min, max)` over finite values, if any.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// `(first t, last t)`, if any.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.points.front()?.t, self.points.back()?.t))
    }

    fn evict(&mut self) {
        let bound = self.eviction.bound();
        while self.points.len() > bound {
            self.points.pop_front();
        }
        if let Eviction::Window { span, .. } = self.eviction {
            let Some(latest) = self.points.back().map(|p| p.t) else {
                return;
            };
            while self.points.len() > 1 {
                match self.points.front() {
                    Some(p) if p.t < latest - span => {
                        self.points.pop_front();
                    }
                    _ => break,
                }
            }
        }
    }
}

/// Every declared series buffer, owned by the driver.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: BTreeMap<String, (SeriesBuffer, DomainPolicy)>,
}

impl History {
    /// One empty buffer per declared series.
    pub fn from_declaration(decl: &ModelDeclaration) -> Self {
        let entries = decl
            .series
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    (SeriesBuffer::new(&s.name, s.eviction), s.domain),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&SeriesBuffer> {
        self.entries.get(name).map(|(b, _)| b)
    }

    pub fn domain(&self, name: &str) -> Option<DomainPolicy> {
        self.entries.get(name).map(|(_, d)| *d)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesBuffer> {
        self.entries.values().map(|(b, _)| b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every buffer's contents.
    pub fn clear(&mut self) {
        for (buf, _) in self.entries.values_mut() {
            buf.clear();
        }
    }

    /// Fold a snapshot's series output into history.
    ///
    /// Appends are only taken when sim time advanced this tick, or when a
    /// buffer is still empty, so a paused redraw never re-appends.
    pub fn apply(
        &mut self,
        snapshot: &Snapshot,
        revision: u64,
        advanced: bool,
    ) -> Result<(), ContractError> {
        for (name, update) in &snapshot.series {
            let (buf, _) = self
                .entries
                .get_mut(name)
                .ok_or_else(|| ContractError::UndeclaredSeries(name.clone()))?;
            match update.mode {
                UpdateMode::Replace => buf.replace(&update.samples, revision)?,
                UpdateMode::Append if advanced || buf.is_empty() => {
                    buf.extend(&update.samples, revision)?
                }
                UpdateMode::Append => {}
            }
        }
        Ok(())
    }
}

fn advances(previous: f64, t: f64) -> bool {
    matches!(t.partial_cmp(&previous), Some(std::cmp::Ordering::Greater))
}
