use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A half-open probability range [lo, hi) mapped to a single calibrated
/// value. The last bucket of a scheme is closed on the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityBucket {
    pub lo: f64,
    pub hi: f64,
    /// The calibrated probability every raw value in this range maps to.
    pub value: f64,
}

/// Configuration errors for a bucket scheme. These are fatal: a scheme that
/// does not tile [0, 1] cannot produce a calibrated output.
#[derive(Debug, Error)]
pub enum BucketError {
    #[error("bucket scheme is empty")]
    Empty,

    #[error("bucket [{lo}, {hi}) is not a valid range")]
    InvalidRange { lo: f64, hi: f64 },

    #[error("bucket scheme must start at 0.0, starts at {0}")]
    DoesNotStartAtZero(f64),

    #[error("bucket scheme must end at 1.0, ends at {0}")]
    DoesNotEndAtOne(f64),

    #[error("gap or overlap between buckets at {0}: next bucket starts at {1}")]
    NotContiguous(f64, f64),

    #[error("calibrated value {0} is outside [0, 1]")]
    ValueOutOfRange(f64),
}

/// An ordered, contiguous, exhaustive bucket scheme over [0, 1].
///
/// Remapping is pure and stateless: the same raw probability always maps to
/// the same calibrated value. Schemes are data, not code; experiments swap
/// them via configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBuckets {
    buckets: Vec<ProbabilityBucket>,
}

impl CalibrationBuckets {
    pub fn new(buckets: Vec<ProbabilityBucket>) -> Result<Self, BucketError> {
        if buckets.is_empty() {
            return Err(BucketError::Empty);
        }
        for b in &buckets {
            if !b.lo.is_finite() || !b.hi.is_finite() || b.lo >= b.hi {
                return Err(BucketError::InvalidRange { lo: b.lo, hi: b.hi });
            }
            if !(0.0..=1.0).contains(&b.value) {
                return Err(BucketError::ValueOutOfRange(b.value));
            }
        }
        let first = buckets.first().unwrap();
        if first.lo != 0.0 {
            return Err(BucketError::DoesNotStartAtZero(first.lo));
        }
        let last = buckets.last().unwrap();
        if last.hi != 1.0 {
            return Err(BucketError::DoesNotEndAtOne(last.hi));
        }
        for pair in buckets.windows(2) {
            if pair[0].hi != pair[1].lo {
                return Err(BucketError::NotContiguous(pair[0].hi, pair[1].lo));
            }
        }
        Ok(Self { buckets })
    }

    /// The bucket scheme tuned for the probabilistic independence test:
    /// within each range the empirical independence rate observed in past
    /// runs matches the assigned value.
    pub fn adjusted() -> Self {
        Self::new(vec![
            ProbabilityBucket { lo: 0.0, hi: 0.39, value: 0.0 },
            ProbabilityBucket { lo: 0.39, hi: 0.9, value: 0.222222 },
            ProbabilityBucket { lo: 0.9, hi: 0.92, value: 0.5 },
            ProbabilityBucket { lo: 0.92, hi: 0.97, value: 0.0 },
            ProbabilityBucket { lo: 0.97, hi: 1.0, value: 0.666667 },
        ])
        .unwrap()
    }

    /// Map a raw probability to the calibrated value of the first bucket
    /// containing it. Buckets are lower-inclusive, upper-exclusive; the last
    /// bucket also contains 1.0. Out-of-range inputs are clamped to [0, 1];
    /// NaN maps to the first bucket's value rather than falling through the
    /// half-open comparisons into the top bucket.
    pub fn remap(&self, p: f64) -> f64 {
        if p.is_nan() {
            return self.buckets[0].value;
        }
        let p = p.clamp(0.0, 1.0);
        for b in &self.buckets {
            if p >= b.lo && p < b.hi {
                return b.value;
            }
        }
        // Only p == 1.0 falls through the half-open scan.
        self.buckets.last().map(|b| b.value).unwrap_or(p)
    }

    pub fn buckets(&self) -> &[ProbabilityBucket] {
        &self.buckets
    }

    /// The distinct calibrated output levels, in bucket order.
    pub fn levels(&self) -> Vec<f64> {
        let mut levels: Vec<f64> = Vec::new();
        for b in &self.buckets {
            if !levels.iter().any(|v| v == &b.value) {
                levels.push(b.value);
            }
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_scheme_maps_each_range() {
        let buckets = CalibrationBuckets::adjusted();
        assert_eq!(buckets.remap(0.0), 0.0);
        assert_eq!(buckets.remap(0.2), 0.0);
        assert_eq!(buckets.remap(0.5), 0.222222);
        assert_eq!(buckets.remap(0.91), 0.5);
        assert_eq!(buckets.remap(0.95), 0.0);
        assert_eq!(buckets.remap(0.98), 0.666667);
        assert_eq!(buckets.remap(1.0), 0.666667);
    }

    #[test]
    fn boundaries_are_lower_inclusive() {
        let buckets = CalibrationBuckets::adjusted();
        // Exactly 0.39 belongs to the [0.39, 0.9) bucket, not [0, 0.39).
        assert_eq!(buckets.remap(0.39), 0.222222);
        assert_eq!(buckets.remap(0.9), 0.5);
        assert_eq!(buckets.remap(0.92), 0.0);
        assert_eq!(buckets.remap(0.97), 0.666667);
    }

    #[test]
    fn nan_maps_to_the_first_bucket() {
        let buckets = CalibrationBuckets::adjusted();
        assert_eq!(buckets.remap(f64::NAN), 0.0);

        // Out-of-range finite inputs clamp to the nearest edge.
        assert_eq!(buckets.remap(-0.5), 0.0);
        assert_eq!(buckets.remap(1.5), 0.666667);
    }

    #[test]
    fn rejects_gap() {
        let result = CalibrationBuckets::new(vec![
            ProbabilityBucket { lo: 0.0, hi: 0.4, value: 0.1 },
            ProbabilityBucket { lo: 0.5, hi: 1.0, value: 0.9 },
        ]);
        assert!(matches!(result, Err(BucketError::NotContiguous(_, _))));
    }

    #[test]
    fn rejects_incomplete_coverage() {
        let result = CalibrationBuckets::new(vec![ProbabilityBucket {
            lo: 0.0,
            hi: 0.9,
            value: 0.5,
        }]);
        assert!(matches!(result, Err(BucketError::DoesNotEndAtOne(_))));

        let result = CalibrationBuckets::new(vec![ProbabilityBucket {
            lo: 0.1,
            hi: 1.0,
            value: 0.5,
        }]);
        assert!(matches!(result, Err(BucketError::DoesNotStartAtZero(_))));
    }

    #[test]
    fn rejects_empty_and_bad_values() {
        assert!(matches!(
            CalibrationBuckets::new(vec![]),
            Err(BucketError::Empty)
        ));
        let result = CalibrationBuckets::new(vec![ProbabilityBucket {
            lo: 0.0,
            hi: 1.0,
            value: 1.5,
        }]);
        assert!(matches!(result, Err(BucketError::ValueOutOfRange(_))));
    }

    #[test]
    fn levels_are_deduplicated() {
        let buckets = CalibrationBuckets::adjusted();
        assert_eq!(buckets.levels(), vec![0.0, 0.222222, 0.5, 0.666667]);
    }
}
