use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::models::ObservedPredicted;
use crate::MetricsError;

/// One probability-ranked group of records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskGroup {
    /// Number of records in the group.
    pub count: usize,
    /// Mean predicted probability in the group.
    pub mean_predicted: f64,
    /// Expected number of positives: sum of predicted probabilities.
    pub expected: f64,
    /// Observed number of positives: sum of ground-truth outcomes.
    pub observed: f64,
    /// Empirical positive rate in the group.
    pub observed_rate: f64,
}

/// Hosmer-Lemeshow grouped expected-vs-observed goodness of fit.
///
/// Records are partitioned into risk groups; within each group the expected
/// positive count (sum of predicted probabilities) is compared against the
/// observed positive count. A well-calibrated predictor has near-zero
/// deviation in every group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HosmerLemeshow {
    groups: Vec<RiskGroup>,
    statistic: f64,
    degrees_of_freedom: usize,
    p_value: f64,
}

impl HosmerLemeshow {
    /// Group records by distinct predicted value: one risk group per level.
    ///
    /// This is the natural grouping for calibrated outputs that take only a
    /// handful of discrete probability levels.
    pub fn by_risk_value(values: &[ObservedPredicted]) -> Result<Self, MetricsError> {
        crate::validate(values)?;

        let mut sorted: Vec<ObservedPredicted> = values.to_vec();
        sorted.sort_by(|a, b| a.predicted.total_cmp(&b.predicted));

        let mut groups: Vec<Vec<ObservedPredicted>> = Vec::new();
        for v in sorted {
            match groups.last_mut() {
                Some(group) if group[0].predicted == v.predicted => group.push(v),
                _ => groups.push(vec![v]),
            }
        }

        Ok(Self::from_groups(groups))
    }

    /// Partition rank-sorted records into `n_groups` near-equal groups
    /// (classic decile-style grouping).
    pub fn by_rank(values: &[ObservedPredicted], n_groups: usize) -> Result<Self, MetricsError> {
        crate::validate(values)?;
        if n_groups == 0 {
            return Err(MetricsError::NoGroups);
        }

        let mut sorted: Vec<ObservedPredicted> = values.to_vec();
        sorted.sort_by(|a, b| a.predicted.total_cmp(&b.predicted));

        let n_groups = n_groups.min(sorted.len());
        let base = sorted.len() / n_groups;
        let remainder = sorted.len() % n_groups;

        let mut groups: Vec<Vec<ObservedPredicted>> = Vec::with_capacity(n_groups);
        let mut start = 0;
        for g in 0..n_groups {
            let size = base + usize::from(g < remainder);
            groups.push(sorted[start..start + size].to_vec());
            start += size;
        }

        Ok(Self::from_groups(groups))
    }

    fn from_groups(raw_groups: Vec<Vec<ObservedPredicted>>) -> Self {
        let mut groups = Vec::with_capacity(raw_groups.len());
        let mut statistic = 0.0;

        for members in &raw_groups {
            let count = members.len();
            let expected: f64 = members.iter().map(|v| v.predicted).sum();
            let observed: f64 = members.iter().map(|v| f64::from(v.observed)).sum();
            let mean_predicted = expected / count as f64;
            let observed_rate = observed / count as f64;

            // Guard the denominator for groups pinned at probability 0 or 1.
            let denom = (count as f64 * mean_predicted * (1.0 - mean_predicted)).max(1e-10);
            statistic += (observed - expected).powi(2) / denom;

            groups.push(RiskGroup {
                count,
                mean_predicted,
                expected,
                observed,
                observed_rate,
            });
        }

        let degrees_of_freedom = groups.len().saturating_sub(2).max(1);
        let p_value = match ChiSquared::new(degrees_of_freedom as f64) {
            Ok(chi2) => 1.0 - chi2.cdf(statistic),
            Err(_) => f64::NAN,
        };
        tracing::debug!(
            groups = groups.len(),
            statistic,
            degrees_of_freedom,
            p_value,
            "computed goodness of fit"
        );

        Self {
            groups,
            statistic,
            degrees_of_freedom,
            p_value,
        }
    }

    pub fn groups(&self) -> &[RiskGroup] {
        &self.groups
    }

    /// The chi-squared goodness-of-fit statistic. Zero means every group's
    /// observed positive count equals its expected count exactly.
    pub fn statistic(&self) -> f64 {
        self.statistic
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Expected positive counts per group, the x-coordinates of the
    /// calibration plot points.
    pub fn expected_values(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.expected).collect()
    }

    /// Observed positive counts per group, the y-coordinates of the
    /// calibration plot points.
    pub fn observed_values(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.observed).collect()
    }

    /// Multi-line text summary in the report format.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Number of risk groups: {}\n", self.groups.len()));
        out.push_str(&format!("Chi-squared statistic: {:.6}\n", self.statistic));
        out.push_str(&format!("Degrees of freedom: {}\n", self.degrees_of_freedom));
        out.push_str(&format!("P-value: {:.6}\n", self.p_value));
        out.push_str("Group,N,Mean Predicted,Expected,Observed\n");
        for (i, g) in self.groups.iter().enumerate() {
            out.push_str(&format!(
                "{},{},{:.6},{:.6},{:.0}\n",
                i + 1,
                g.count,
                g.mean_predicted,
                g.expected,
                g.observed
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(observed: u8, predicted: f64) -> ObservedPredicted {
        ObservedPredicted {
            observed,
            predicted,
        }
    }

    /// Build `count` records at probability `p` with exactly `positives`
    /// observed positives.
    fn level(p: f64, count: usize, positives: usize) -> Vec<ObservedPredicted> {
        (0..count)
            .map(|i| op(u8::from(i < positives), p))
            .collect()
    }

    #[test]
    fn perfect_calibration_has_zero_statistic() {
        let mut values = Vec::new();
        values.extend(level(0.2, 10, 2));
        values.extend(level(0.5, 10, 5));
        values.extend(level(0.8, 10, 8));

        let hl = HosmerLemeshow::by_risk_value(&values).unwrap();
        assert_eq!(hl.groups().len(), 3);
        assert!(hl.statistic() < 1e-9, "statistic = {}", hl.statistic());
        for g in hl.groups() {
            assert!((g.expected - g.observed).abs() < 1e-9);
        }
    }

    #[test]
    fn miscalibration_increases_statistic() {
        let calibrated: Vec<_> = level(0.5, 20, 10);
        let miscalibrated: Vec<_> = level(0.5, 20, 18);

        let good = HosmerLemeshow::by_risk_value(&calibrated).unwrap();
        let bad = HosmerLemeshow::by_risk_value(&miscalibrated).unwrap();
        assert!(bad.statistic() > good.statistic());
    }

    #[test]
    fn rank_grouping_splits_evenly() {
        let values: Vec<_> = (0..100).map(|i| op(0, i as f64 / 100.0)).collect();
        let hl = HosmerLemeshow::by_rank(&values, 10).unwrap();
        assert_eq!(hl.groups().len(), 10);
        for g in hl.groups() {
            assert_eq!(g.count, 10);
        }
    }

    #[test]
    fn rank_grouping_caps_groups_at_record_count() {
        let values: Vec<_> = (0..3).map(|i| op(0, i as f64 / 4.0)).collect();
        let hl = HosmerLemeshow::by_rank(&values, 10).unwrap();
        assert_eq!(hl.groups().len(), 3);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            HosmerLemeshow::by_risk_value(&[]),
            Err(MetricsError::Empty)
        ));
        assert!(matches!(
            HosmerLemeshow::by_risk_value(&[op(0, 1.2)]),
            Err(MetricsError::PredictedOutOfRange(_))
        ));
        assert!(matches!(
            HosmerLemeshow::by_risk_value(&[op(3, 0.5)]),
            Err(MetricsError::ObservedOutOfRange(_))
        ));
        assert!(matches!(
            HosmerLemeshow::by_rank(&[op(0, 0.5)], 0),
            Err(MetricsError::NoGroups)
        ));
    }

    #[test]
    fn plot_points_line_up_with_groups() {
        let mut values = level(0.25, 8, 2);
        values.extend(level(0.75, 8, 6));
        let hl = HosmerLemeshow::by_risk_value(&values).unwrap();
        assert_eq!(hl.expected_values(), vec![2.0, 6.0]);
        assert_eq!(hl.observed_values(), vec![2.0, 6.0]);
    }

    /// End-to-end scenario over the adjusted bucket scheme's output levels:
    /// 1000 records split across {0, 0.222222, 0.5, 0.666667}, observed
    /// rates matching each level exactly, must show near-zero deviation.
    #[test]
    fn bucketed_records_are_calibrated() {
        let mut values = Vec::new();
        values.extend(level(0.0, 250, 0));
        values.extend(level(0.222222, 250, 56)); // 250 * 0.222222 = 55.56
        values.extend(level(0.5, 250, 125));
        values.extend(level(0.666667, 250, 167)); // 250 * 0.666667 = 166.67

        let hl = HosmerLemeshow::by_risk_value(&values).unwrap();
        assert_eq!(hl.groups().len(), 4);
        for g in hl.groups() {
            assert!(
                (g.expected - g.observed).abs() < 1.0,
                "group at {} deviates: expected {}, observed {}",
                g.mean_predicted,
                g.expected,
                g.observed
            );
        }
        // Sampling-noise deviation below one count per group keeps the
        // summary statistic small.
        assert!(hl.statistic() < 0.05, "statistic = {}", hl.statistic());
    }
}
