use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use calibration_metrics::{ObservedPredicted, SampleRecorder};
use causal_graphs::{aggregate, channel_values, ConsensusGraph, EdgeTypeChannel, PagGraph};
use independence_oracle::{
    ConstraintInference, DataSet, DsepOracle, OracleConfig, ProbabilisticOracle,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::campaign::{run_campaign, CampaignConfig};
use crate::report::{write_edge_csv, write_general_csv, write_report_bundle, PlotRenderer};

/// Everything a simulation hands back: the sampled dataset, the ground-truth
/// PAG the consensus is scored against, and a d-separation oracle over the
/// generating structure.
pub struct SimulatedData {
    pub data_set: DataSet,
    pub truth: PagGraph,
    pub ground_truth: Box<dyn DsepOracle>,
}

/// External data simulator: forward-samples a dataset from some generating
/// structure.
pub trait DataSimulator {
    fn simulate(&self, n_cases: usize, avg_degree: usize, seed: u64)
        -> anyhow::Result<SimulatedData>;
}

/// One structure-search algorithm driven by oracle queries, plus the
/// legality check its output graphs must pass to count toward the campaign
/// target.
pub trait SearchStrategy {
    fn search(
        &self,
        oracle: &mut ProbabilisticOracle<'_>,
        data: &DataSet,
    ) -> anyhow::Result<PagGraph>;

    fn is_legal(&self, graph: &PagGraph) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub title: String,
    pub n_cases: usize,
    pub avg_degree: usize,
    pub seed: u64,
    pub campaign: CampaignConfig,
    pub oracle: OracleConfig,
}

/// Headline numbers of a finished experiment.
#[derive(Debug)]
pub struct ExperimentSummary {
    pub attempts: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub recorded_queries: usize,
    pub consensus: ConsensusGraph,
}

/// Orchestrates the whole pipeline: simulate, resample, aggregate, score,
/// report.
pub struct Experiment<'a> {
    pub config: ExperimentConfig,
    pub simulator: &'a dyn DataSimulator,
    pub inference: &'a dyn ConstraintInference,
    pub search: &'a dyn SearchStrategy,
    pub renderer: &'a dyn PlotRenderer,
}

impl Experiment<'_> {
    /// Run the experiment and write all reports under `out_dir`.
    ///
    /// Each campaign attempt gets a fresh oracle seeded from the experiment
    /// seed plus the attempt number; the sample recorder is the one object
    /// shared across attempts. A failure in one output step surfaces to the
    /// caller but leaves the artifacts already written intact.
    pub fn run(&self, out_dir: &Path) -> anyhow::Result<ExperimentSummary> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;

        info!(title = %self.config.title, "starting experiment");

        let sim = self
            .simulator
            .simulate(self.config.n_cases, self.config.avg_degree, self.config.seed)
            .context("simulating data")?;
        info!(
            rows = sim.data_set.num_rows(),
            columns = sim.data_set.num_columns(),
            "simulated dataset"
        );

        let recorder = Rc::new(RefCell::new(SampleRecorder::new()));

        let outcome = run_campaign(
            &self.config.campaign,
            |attempt| {
                let oracle_config = OracleConfig {
                    seed: self.config.oracle.seed.wrapping_add(attempt as u64),
                    ..self.config.oracle.clone()
                };
                let mut oracle =
                    ProbabilisticOracle::new(&sim.data_set, self.inference, oracle_config)?
                        .with_ground_truth(sim.ground_truth.as_ref())
                        .with_recorder(recorder.clone());
                self.search.search(&mut oracle, &sim.data_set)
            },
            |graph| self.search.is_legal(graph),
        )?;

        let consensus = aggregate(&outcome.graphs);
        info!(
            accepted = outcome.accepted,
            consensus_edges = consensus.num_edges(),
            "aggregated consensus graph"
        );

        for channel in EdgeTypeChannel::ALL {
            let values = channel_values(&outcome.graphs, &sim.truth, channel);
            let dir = out_dir.join(channel.name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating channel directory {}", dir.display()))?;
            write_edge_csv(&dir.join("edge_data.csv"), &values)
                .with_context(|| format!("writing {} edge data", channel.name()))?;

            if values.is_empty() {
                warn!(channel = channel.name(), "no candidate edges; skipping statistics");
                continue;
            }
            let pairs: Vec<ObservedPredicted> =
                values.iter().map(ObservedPredicted::from).collect();
            write_report_bundle(
                &dir,
                "edge",
                &format!("{} edges", channel.name()),
                &pairs,
                self.renderer,
            )
            .with_context(|| format!("writing {} statistics", channel.name()))?;
        }

        let recorded = recorder.borrow().values().to_vec();
        write_general_csv(&out_dir.join("independence_queries.csv"), &recorded)
            .context("writing oracle query data")?;
        if recorded.is_empty() {
            warn!("no oracle queries recorded; skipping query statistics");
        } else {
            let pairs: Vec<ObservedPredicted> =
                recorded.iter().map(ObservedPredicted::from).collect();
            write_report_bundle(
                out_dir,
                "queries",
                "Independence oracle queries",
                &pairs,
                self.renderer,
            )
            .context("writing oracle query statistics")?;
        }

        fs::write(out_dir.join("consensus_graph.txt"), consensus.edge_list_string())
            .context("writing consensus graph listing")?;

        let config_json = serde_json::to_string_pretty(&self.config)
            .context("serializing experiment config")?;
        fs::write(out_dir.join("experiment_config.json"), config_json)
            .context("writing experiment config snapshot")?;

        let details = self.run_details(&sim, &outcome, &consensus);
        fs::write(out_dir.join("run_details.txt"), details)
            .context("writing run details")?;

        info!(
            attempts = outcome.attempts,
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            queries = recorded.len(),
            "experiment finished"
        );

        Ok(ExperimentSummary {
            attempts: outcome.attempts,
            accepted: outcome.accepted,
            rejected: outcome.rejected,
            recorded_queries: recorded.len(),
            consensus,
        })
    }

    fn run_details(
        &self,
        sim: &SimulatedData,
        outcome: &crate::campaign::CampaignOutcome,
        consensus: &ConsensusGraph,
    ) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n\n", self.config.title));
        out.push_str("Parameters\n");
        out.push_str(&format!("cases: {}\n", self.config.n_cases));
        out.push_str(&format!("average degree: {}\n", self.config.avg_degree));
        out.push_str(&format!("seed: {}\n", self.config.seed));
        out.push_str(&format!(
            "target valid graphs: {}\n",
            self.config.campaign.target_valid_graphs
        ));
        out.push_str(&format!(
            "max attempts: {}\n",
            self.config
                .campaign
                .max_attempts
                .map_or_else(|| "unbounded".to_string(), |m| m.to_string())
        ));
        out.push_str(&format!(
            "prior equivalent sample size: {}\n",
            self.config.oracle.prior_equivalent_sample_size
        ));
        out.push_str(&format!(
            "dataset: {} rows x {} columns\n\n",
            sim.data_set.num_rows(),
            sim.data_set.num_columns()
        ));

        out.push_str("Search\n");
        out.push_str(&format!("attempts: {}\n", outcome.attempts));
        out.push_str(&format!("valid graphs: {}\n", outcome.accepted));
        out.push_str(&format!("invalid graphs: {}\n", outcome.rejected));
        out.push_str(&format!("started: {}\n", outcome.started_at.to_rfc3339()));
        out.push_str(&format!("finished: {}\n", outcome.finished_at.to_rfc3339()));
        out.push_str(&format!(
            "duration: {} ms\n\n",
            outcome.duration().num_milliseconds()
        ));

        out.push_str("Consensus graph\n");
        out.push_str(&consensus.edge_list_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use causal_graphs::PagEdge;
    use independence_oracle::{Variable, VerdictRule};

    use super::*;
    use crate::report::PointListRenderer;

    struct ToySimulator;

    struct NeverIndependent;
    impl DsepOracle for NeverIndependent {
        fn is_independent(&self, _x: &str, _y: &str, _z: &[String]) -> bool {
            false
        }
    }

    impl DataSimulator for ToySimulator {
        fn simulate(
            &self,
            _n_cases: usize,
            _avg_degree: usize,
            _seed: u64,
        ) -> anyhow::Result<SimulatedData> {
            let data_set = DataSet::new(
                vec![Variable::discrete("X", 2), Variable::discrete("Y", 2)],
                vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]],
            )?;
            let mut truth = PagGraph::new(vec!["X".into(), "Y".into()]);
            truth.add_edge(PagEdge::directed("X", "Y"));
            Ok(SimulatedData {
                data_set,
                truth,
                ground_truth: Box::new(NeverIndependent),
            })
        }
    }

    struct FixedInference(f64);
    impl ConstraintInference for FixedInference {
        fn prob_independent(
            &self,
            _data: &DataSet,
            _rows: &[usize],
            _x: usize,
            _y: usize,
            _z: &[usize],
            _prior: f64,
        ) -> f64 {
            self.0
        }
    }

    /// Adds X --> Y unless the oracle calls the pair independent.
    struct EdgeIfDependent;
    impl SearchStrategy for EdgeIfDependent {
        fn search(
            &self,
            oracle: &mut ProbabilisticOracle<'_>,
            data: &DataSet,
        ) -> anyhow::Result<PagGraph> {
            let nodes: Vec<String> =
                data.variables().iter().map(|v| v.name.clone()).collect();
            let mut graph = PagGraph::new(nodes);
            let verdict = oracle.query("X", "Y", &[])?;
            if !verdict.independent {
                graph.add_edge(PagEdge::directed("X", "Y"));
            }
            Ok(graph)
        }

        fn is_legal(&self, _graph: &PagGraph) -> bool {
            true
        }
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            title: "toy experiment".into(),
            n_cases: 4,
            avg_degree: 1,
            seed: 11,
            campaign: CampaignConfig::new(4).with_max_attempts(50),
            oracle: OracleConfig {
                // 0.1 remaps to bucket value 0.0, so the threshold verdict
                // is always "dependent" and every sampled graph has the edge.
                verdict: VerdictRule::Threshold { cutoff: 0.5 },
                ..OracleConfig::default()
            },
        }
    }

    #[test]
    fn end_to_end_writes_the_full_report_tree() {
        let out_dir = std::env::temp_dir().join("sampling-engine-test-experiment");
        let _ = fs::remove_dir_all(&out_dir);

        let inference = FixedInference(0.1);
        let experiment = Experiment {
            config: config(),
            simulator: &ToySimulator,
            inference: &inference,
            search: &EdgeIfDependent,
            renderer: &PointListRenderer,
        };
        let summary = experiment.run(&out_dir).unwrap();

        assert_eq!(summary.accepted, 4);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.recorded_queries, 1);
        assert!(summary.consensus.edge_between("X", "Y").is_some());

        for channel in EdgeTypeChannel::ALL {
            assert!(out_dir.join(channel.name()).join("edge_data.csv").exists());
        }
        assert!(out_dir.join("independence_queries.csv").exists());
        assert!(out_dir.join("queries_statistics.txt").exists());
        assert!(out_dir.join("consensus_graph.txt").exists());
        assert!(out_dir.join("experiment_config.json").exists());
        assert!(out_dir.join("run_details.txt").exists());

        let csv = fs::read_to_string(out_dir.join("independence_queries.csv")).unwrap();
        assert!(csv.contains("P(X,Y)"));

        let details = fs::read_to_string(out_dir.join("run_details.txt")).unwrap();
        assert!(details.contains("toy experiment"));
        assert!(details.contains("valid graphs: 4"));

        // The tail-arrow channel has a true edge found in every sample.
        let ta = fs::read_to_string(
            out_dir.join("tail_arrow").join("edge_data.csv"),
        )
        .unwrap();
        assert!(ta.contains("X,Y,X --> Y,1.000000,1"));
    }

    #[test]
    fn consensus_edge_frequency_is_full_for_unanimous_samples() {
        let out_dir = std::env::temp_dir().join("sampling-engine-test-frequency");
        let _ = fs::remove_dir_all(&out_dir);

        let inference = FixedInference(0.1);
        let experiment = Experiment {
            config: config(),
            simulator: &ToySimulator,
            inference: &inference,
            search: &EdgeIfDependent,
            renderer: &PointListRenderer,
        };
        let summary = experiment.run(&out_dir).unwrap();
        let edge = summary.consensus.edge_between("X", "Y").unwrap();
        assert_eq!(edge.frequency, 1.0);
    }
}
