//! Resampling campaign driver, experiment orchestration, and report output.
//!
//! A campaign repeatedly runs a structure search, each attempt over a fresh
//! independence oracle, and collects graphs that pass a legality check until
//! a target count is reached. The experiment layer then aggregates the
//! accepted graphs into a consensus graph, scores each edge-type channel
//! against the ground-truth graph, computes calibration and discrimination
//! statistics over the recorded oracle queries, and writes the whole bundle
//! of reports to an output directory.

pub mod campaign;
pub mod experiment;
pub mod report;

pub use campaign::{run_campaign, CampaignConfig, CampaignError, CampaignOutcome};
pub use experiment::{
    DataSimulator, Experiment, ExperimentConfig, ExperimentSummary, SearchStrategy, SimulatedData,
};
pub use report::{PlotRenderer, PointListRenderer, ReportError};
