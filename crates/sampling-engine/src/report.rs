use std::fs;
use std::io::Write;
use std::path::Path;

use calibration_metrics::{
    EdgeValue, GeneralValue, HosmerLemeshow, MetricsError, ObservedPredicted, RocCurve, RocPoint,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report file")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Renders the calibration and ROC plots for one set of records. Image
/// output stays outside this crate; implementations receive the computed
/// point arrays.
pub trait PlotRenderer {
    fn render_calibration(
        &self,
        path: &Path,
        title: &str,
        expected: &[f64],
        observed: &[f64],
    ) -> Result<(), ReportError>;

    fn render_roc(
        &self,
        path: &Path,
        title: &str,
        points: &[RocPoint],
        auc: f64,
    ) -> Result<(), ReportError>;
}

/// Default renderer: writes each plot as a plain-text point list.
#[derive(Debug, Default)]
pub struct PointListRenderer;

impl PlotRenderer for PointListRenderer {
    fn render_calibration(
        &self,
        path: &Path,
        title: &str,
        expected: &[f64],
        observed: &[f64],
    ) -> Result<(), ReportError> {
        let mut out = String::new();
        out.push_str(&format!("{title}\n"));
        out.push_str("expected,observed\n");
        for (e, o) in expected.iter().zip(observed) {
            out.push_str(&format!("{e:.6},{o:.6}\n"));
        }
        fs::write(path, out)?;
        Ok(())
    }

    fn render_roc(
        &self,
        path: &Path,
        title: &str,
        points: &[RocPoint],
        auc: f64,
    ) -> Result<(), ReportError> {
        let mut out = String::new();
        out.push_str(&format!("{title}\n"));
        out.push_str(&format!("AUC: {auc:.6}\n"));
        out.push_str("fpr,tpr\n");
        for p in points {
            out.push_str(&format!(
                "{:.6},{:.6}\n",
                p.false_positive_rate, p.true_positive_rate
            ));
        }
        fs::write(path, out)?;
        Ok(())
    }
}

/// Write oracle query records as CSV, sorted by descending predicted
/// probability.
pub fn write_general_csv(path: &Path, values: &[GeneralValue]) -> Result<(), ReportError> {
    let mut sorted: Vec<&GeneralValue> = values.iter().collect();
    sorted.sort_by(|a, b| b.predicted.total_cmp(&a.predicted));

    let mut file = fs::File::create(path)?;
    writeln!(file, "label,predicted,observed")?;
    for v in sorted {
        writeln!(file, "{},{:.6},{}", v.label, v.predicted, v.observed)?;
    }
    debug!(path = %path.display(), records = values.len(), "wrote query csv");
    Ok(())
}

/// Write per-edge channel records as CSV, sorted by descending predicted
/// probability.
pub fn write_edge_csv(path: &Path, values: &[EdgeValue]) -> Result<(), ReportError> {
    let mut sorted: Vec<&EdgeValue> = values.iter().collect();
    sorted.sort_by(|a, b| b.predicted.total_cmp(&a.predicted));

    let mut file = fs::File::create(path)?;
    writeln!(file, "from,to,edge,predicted,observed")?;
    for v in sorted {
        writeln!(
            file,
            "{},{},{},{:.6},{}",
            v.from, v.to, v.edge, v.predicted, v.observed
        )?;
    }
    debug!(path = %path.display(), records = values.len(), "wrote edge csv");
    Ok(())
}

/// Compute both statistics for one record set. A single-class ROC is not
/// an error; it happens routinely on sparse edge-type channels and is
/// reported as `None`.
fn compute_statistics(
    values: &[ObservedPredicted],
) -> Result<(HosmerLemeshow, Option<RocCurve>), ReportError> {
    let hl = HosmerLemeshow::by_risk_value(values)?;
    let roc = match RocCurve::new(values) {
        Ok(roc) => Some(roc),
        Err(MetricsError::SingleClass) => None,
        Err(other) => return Err(other.into()),
    };
    Ok((hl, roc))
}

fn statistics_text(title: &str, hl: &HosmerLemeshow, roc: Option<&RocCurve>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}\n\n"));

    out.push_str("Hosmer-Lemeshow Test\n");
    out.push_str(&hl.summary());

    out.push_str("\nROC\n");
    match roc {
        Some(roc) => out.push_str(&roc.summary()),
        None => out.push_str("unavailable: records contain a single outcome class\n"),
    }
    out
}

/// Write the Hosmer-Lemeshow and ROC summaries for one record set.
pub fn write_statistics(
    path: &Path,
    title: &str,
    values: &[ObservedPredicted],
) -> Result<(), ReportError> {
    let (hl, roc) = compute_statistics(values)?;
    fs::write(path, statistics_text(title, &hl, roc.as_ref()))?;
    Ok(())
}

/// Compute the statistics for one record set once and write the full
/// report bundle (statistics text, calibration plot, ROC plot) into `dir`
/// using the given file stem.
pub fn write_report_bundle(
    dir: &Path,
    stem: &str,
    title: &str,
    values: &[ObservedPredicted],
    renderer: &dyn PlotRenderer,
) -> Result<(), ReportError> {
    let (hl, roc) = compute_statistics(values)?;

    fs::write(
        dir.join(format!("{stem}_statistics.txt")),
        statistics_text(title, &hl, roc.as_ref()),
    )?;

    renderer.render_calibration(
        &dir.join(format!("{stem}_calibration.txt")),
        &format!("{title} calibration"),
        &hl.expected_values(),
        &hl.observed_values(),
    )?;

    if let Some(roc) = &roc {
        renderer.render_roc(
            &dir.join(format!("{stem}_roc.txt")),
            &format!("{title} ROC"),
            roc.points(),
            roc.auc(),
        )?;
    }
    Ok(())
}
