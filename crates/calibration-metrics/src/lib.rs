//! Calibration and discrimination metrics for probabilistic predictions.
//!
//! Holds the record types shared across an experiment (per-query samples,
//! per-edge samples), the calibrated probability bucket remapper, and the
//! two statistics computed over accumulated records: Hosmer-Lemeshow
//! grouped expected-vs-observed goodness of fit, and a DeLong ROC/AUC.

pub mod buckets;
pub mod hosmer_lemeshow;
pub mod models;
pub mod roc;

pub use buckets::{BucketError, CalibrationBuckets, ProbabilityBucket};
pub use hosmer_lemeshow::{HosmerLemeshow, RiskGroup};
pub use models::{EdgeValue, GeneralValue, ObservedPredicted, SampleRecorder};
pub use roc::{RocCurve, RocPoint};

use thiserror::Error;

/// Errors from metric construction over observed/predicted records.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("no records to compute statistics over")]
    Empty,

    #[error("predicted value {0} is outside [0, 1]")]
    PredictedOutOfRange(f64),

    #[error("observed value {0} is not 0 or 1")]
    ObservedOutOfRange(u8),

    #[error("all records belong to a single class; ROC requires both positives and negatives")]
    SingleClass,

    #[error("rank grouping requires at least one group")]
    NoGroups,
}

/// Validate a slice of records before computing a statistic.
pub(crate) fn validate(values: &[ObservedPredicted]) -> Result<(), MetricsError> {
    if values.is_empty() {
        return Err(MetricsError::Empty);
    }
    for v in values {
        if !(0.0..=1.0).contains(&v.predicted) || v.predicted.is_nan() {
            return Err(MetricsError::PredictedOutOfRange(v.predicted));
        }
        if v.observed > 1 {
            return Err(MetricsError::ObservedOutOfRange(v.observed));
        }
    }
    Ok(())
}
