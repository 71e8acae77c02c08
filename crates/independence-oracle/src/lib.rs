//! Probabilistic conditional-independence oracle with calibration.
//!
//! The oracle wraps an external Bayesian constraint-inference routine over a
//! discrete dataset and turns its raw probability of independence into a
//! calibrated probability and a boolean verdict. Two memoization layers keep
//! judgments consistent within one search run: raw inference results are
//! cached per fact, and verdicts are cached per canonical (sorted) fact
//! label so that permuted queries replay the same answer.

pub mod dataset;
pub mod fact;
pub mod oracle;

pub use dataset::{DataSet, Variable, VariableKind, MISSING};
pub use fact::{FactKey, IndependenceFact};
pub use oracle::{
    CalibrationMode, ConstraintInference, DsepOracle, IndependenceVerdict, OracleConfig,
    OracleError, ProbabilisticOracle, VerdictRule,
};
