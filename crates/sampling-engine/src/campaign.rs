use causal_graphs::{PagGraph, SampledGraphSet};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameters of one resampling campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Number of legal graphs to collect before stopping.
    pub target_valid_graphs: usize,
    /// Safety valve: give up after this many search attempts. `None` runs
    /// until the target is met, however long that takes.
    pub max_attempts: Option<usize>,
}

impl CampaignConfig {
    pub fn new(target_valid_graphs: usize) -> Self {
        Self {
            target_valid_graphs,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(
        "campaign did not converge: {accepted}/{target} legal graphs \
         after {attempts} attempts"
    )]
    DidNotConverge {
        attempts: usize,
        accepted: usize,
        target: usize,
    },

    #[error("search attempt failed")]
    Search(#[from] anyhow::Error),
}

/// Result of a completed campaign. On success the graph set holds exactly
/// `target_valid_graphs` graphs, every one of which passed the legality
/// check.
#[derive(Debug)]
pub struct CampaignOutcome {
    pub graphs: SampledGraphSet,
    pub attempts: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CampaignOutcome {
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Run searches sequentially until enough legal graphs are collected.
///
/// `search` receives the 1-based attempt number and must run a complete
/// structure search over a fresh oracle; `is_legal` decides whether the
/// resulting graph counts toward the target. Search failures abort the
/// campaign.
pub fn run_campaign<S, L>(
    config: &CampaignConfig,
    mut search: S,
    mut is_legal: L,
) -> Result<CampaignOutcome, CampaignError>
where
    S: FnMut(usize) -> anyhow::Result<PagGraph>,
    L: FnMut(&PagGraph) -> bool,
{
    let started_at = Utc::now();
    let mut graphs = SampledGraphSet::new();
    let mut attempts = 0usize;
    let mut rejected = 0usize;

    info!(
        target_valid_graphs = config.target_valid_graphs,
        max_attempts = ?config.max_attempts,
        "starting resampling campaign"
    );

    while graphs.len() < config.target_valid_graphs {
        if let Some(max) = config.max_attempts {
            if attempts >= max {
                return Err(CampaignError::DidNotConverge {
                    attempts,
                    accepted: graphs.len(),
                    target: config.target_valid_graphs,
                });
            }
        }
        attempts += 1;

        let graph = search(attempts)?;
        if is_legal(&graph) {
            graphs.push(graph);
            debug!(
                attempt = attempts,
                accepted = graphs.len(),
                target = config.target_valid_graphs,
                "accepted graph"
            );
        } else {
            rejected += 1;
            warn!(attempt = attempts, "rejected illegal graph");
        }
    }

    let accepted = graphs.len();
    let finished_at = Utc::now();
    info!(attempts, accepted, rejected, "campaign finished");

    Ok(CampaignOutcome {
        graphs,
        attempts,
        accepted,
        rejected,
        started_at,
        finished_at,
    })
}
