use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One prediction record: a labeled query, the probability the model
/// reported for it, and the ground-truth outcome (0 or 1).
///
/// Uniqueness is by label only; two records with the same label are the
/// same fact even when their predicted values differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralValue {
    pub label: String,
    pub predicted: f64,
    pub observed: u8,
}

impl GeneralValue {
    pub fn new(label: impl Into<String>, predicted: f64, observed: u8) -> Self {
        Self {
            label: label.into(),
            predicted,
            observed,
        }
    }
}

/// One edge-level prediction record for a single edge-type channel.
///
/// `predicted` is the fraction of sampled graphs containing exactly this
/// edge; `observed` is 1 when the ground-truth graph contains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeValue {
    pub from: String,
    pub to: String,
    /// Display form of the edge, e.g. `V --> W` or `X o-o Y`.
    pub edge: String,
    pub predicted: f64,
    pub observed: u8,
}

impl EdgeValue {
    pub fn label(&self) -> &str {
        &self.edge
    }
}

/// The common input shape for the statistics in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedPredicted {
    pub observed: u8,
    pub predicted: f64,
}

impl From<&GeneralValue> for ObservedPredicted {
    fn from(v: &GeneralValue) -> Self {
        Self {
            observed: v.observed,
            predicted: v.predicted,
        }
    }
}

impl From<&EdgeValue> for ObservedPredicted {
    fn from(v: &EdgeValue) -> Self {
        Self {
            observed: v.observed,
            predicted: v.predicted,
        }
    }
}

/// Accumulates prediction records across a whole resampling campaign.
///
/// Records are deduplicated by label with a first-insert-wins policy: once
/// a label has been recorded, later inserts for the same label are dropped.
/// The recorder is created once per campaign and shared by every search
/// iteration, so a fact queried in many iterations contributes one record.
#[derive(Debug, Default)]
pub struct SampleRecorder {
    values: Vec<GeneralValue>,
    labels: HashSet<String>,
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its label was already seen. Returns whether
    /// the record was kept.
    pub fn record(&mut self, value: GeneralValue) -> bool {
        if self.labels.contains(&value.label) {
            return false;
        }
        self.labels.insert(value.label.clone());
        self.values.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[GeneralValue] {
        &self.values
    }

    /// Snapshot the records in the shape the statistics consume.
    pub fn observed_predicted(&self) -> Vec<ObservedPredicted> {
        self.values.iter().map(ObservedPredicted::from).collect()
    }
}
