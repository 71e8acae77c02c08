use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::models::ObservedPredicted;
use crate::MetricsError;

/// One point on the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// Rank-based ROC curve with the DeLong AUC estimator.
///
/// The AUC is the tie-aware Mann-Whitney statistic; its variance comes from
/// the DeLong placement values, giving a normal-approximation confidence
/// interval without any distributional assumption on the scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    points: Vec<RocPoint>,
    auc: f64,
    auc_variance: f64,
    num_positives: usize,
    num_negatives: usize,
}

impl RocCurve {
    pub fn new(values: &[ObservedPredicted]) -> Result<Self, MetricsError> {
        crate::validate(values)?;

        let positives: Vec<f64> = values
            .iter()
            .filter(|v| v.observed == 1)
            .map(|v| v.predicted)
            .collect();
        let negatives: Vec<f64> = values
            .iter()
            .filter(|v| v.observed == 0)
            .map(|v| v.predicted)
            .collect();
        if positives.is_empty() || negatives.is_empty() {
            return Err(MetricsError::SingleClass);
        }

        let (auc, auc_variance) = delong(&positives, &negatives);
        let points = curve_points(values, positives.len(), negatives.len());
        tracing::debug!(
            auc,
            auc_variance,
            positives = positives.len(),
            negatives = negatives.len(),
            "computed roc curve"
        );

        Ok(Self {
            points,
            auc,
            auc_variance,
            num_positives: positives.len(),
            num_negatives: negatives.len(),
        })
    }

    pub fn auc(&self) -> f64 {
        self.auc
    }

    pub fn auc_variance(&self) -> f64 {
        self.auc_variance
    }

    /// 95% confidence interval for the AUC, clamped to [0, 1].
    pub fn auc_confidence_interval(&self) -> (f64, f64) {
        let z = Normal::new(0.0, 1.0).unwrap().inverse_cdf(0.975);
        let margin = z * self.auc_variance.max(0.0).sqrt();
        ((self.auc - margin).max(0.0), (self.auc + margin).min(1.0))
    }

    /// Threshold-sweep points from (0, 0) to (1, 1).
    pub fn points(&self) -> &[RocPoint] {
        &self.points
    }

    pub fn num_positives(&self) -> usize {
        self.num_positives
    }

    pub fn num_negatives(&self) -> usize {
        self.num_negatives
    }

    /// Multi-line text summary in the report format.
    pub fn summary(&self) -> String {
        let (lo, hi) = self.auc_confidence_interval();
        format!(
            "AUC: {:.6}\n95% CI: [{:.6}, {:.6}]\nPositives: {}\nNegatives: {}\n",
            self.auc, lo, hi, self.num_positives, self.num_negatives
        )
    }
}

/// Midranks of `values` (1-based, ties share their average rank).
fn midranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Ranks i+1 ..= j+1 tie; assign their midpoint.
        let mid = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = mid;
        }
        i = j + 1;
    }
    ranks
}

/// DeLong AUC and variance from positive/negative placement values.
fn delong(positives: &[f64], negatives: &[f64]) -> (f64, f64) {
    let m = positives.len();
    let n = negatives.len();

    let mut combined: Vec<f64> = Vec::with_capacity(m + n);
    combined.extend_from_slice(positives);
    combined.extend_from_slice(negatives);

    let tz = midranks(&combined);
    let tx = midranks(positives);
    let ty = midranks(negatives);

    let v10: Vec<f64> = (0..m).map(|i| (tz[i] - tx[i]) / n as f64).collect();
    let v01: Vec<f64> = (0..n)
        .map(|j| 1.0 - (tz[m + j] - ty[j]) / m as f64)
        .collect();

    let auc = v10.iter().sum::<f64>() / m as f64;

    let s10 = sample_variance(&v10, auc);
    let s01 = sample_variance(&v01, auc);
    let variance = s10 / m as f64 + s01 / n as f64;

    (auc, variance)
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn curve_points(values: &[ObservedPredicted], m: usize, n: usize) -> Vec<RocPoint> {
    let mut sorted: Vec<ObservedPredicted> = values.to_vec();
    sorted.sort_by(|a, b| b.predicted.total_cmp(&a.predicted));

    let mut points = vec![RocPoint {
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < sorted.len() {
        let threshold = sorted[i].predicted;
        // Consume every record tied at this threshold before emitting a point.
        while i < sorted.len() && sorted[i].predicted == threshold {
            if sorted[i].observed == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            false_positive_rate: fp as f64 / n as f64,
            true_positive_rate: tp as f64 / m as f64,
        });
    }
    points
}
