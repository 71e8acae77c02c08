use std::collections::BTreeMap;

use calibration_metrics::EdgeValue;
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeTypeChannel, Endpoint, NodePair, PagEdge, PagGraph};

/// The accepted graphs of one resampling campaign, in acceptance order.
/// Append-only; every member passed the external legality check before
/// being pushed.
#[derive(Debug, Clone, Default)]
pub struct SampledGraphSet {
    graphs: Vec<PagGraph>,
}

impl SampledGraphSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, graph: PagGraph) {
        self.graphs.push(graph);
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn graphs(&self) -> &[PagGraph] {
        &self.graphs
    }
}

/// An edge of the consensus graph with the frequency of its winning
/// representation across the sampled graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEdge {
    pub edge: PagEdge,
    pub frequency: f64,
}

/// The high-edge-probability graph: per node pair, the modal edge
/// representation across all sampled graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusGraph {
    nodes: Vec<String>,
    edges: BTreeMap<NodePair, ConsensusEdge>,
}

impl ConsensusGraph {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = &ConsensusEdge> {
        self.edges.values()
    }

    pub fn edge_between(&self, x: &str, y: &str) -> Option<&ConsensusEdge> {
        self.edges.get(&NodePair::new(x, y))
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// The consensus graph without frequency annotations.
    pub fn to_graph(&self) -> PagGraph {
        let mut graph = PagGraph::new(self.nodes.clone());
        for ce in self.edges.values() {
            graph.add_edge(ce.edge.clone());
        }
        graph
    }

    /// Plain-text listing with per-edge frequencies.
    pub fn edge_list_string(&self) -> String {
        let mut out = String::new();
        out.push_str("Graph Nodes:\n");
        out.push_str(&self.nodes.join(";"));
        out.push_str("\n\nGraph Edges:\n");
        for (i, ce) in self.edges.values().enumerate() {
            out.push_str(&format!("{}. {} [{:.4}]\n", i + 1, ce.edge, ce.frequency));
        }
        out
    }
}

/// Reduce sampled graphs to the consensus graph.
///
/// For every unordered node pair, each distinct representation observed
/// across the samples is tallied, with "no edge" as a representation of its
/// own. The representation with the highest count wins; ties break in favor
/// of the representation seen first in sample order. A pair whose winner is
/// "no edge" stays absent. Frequencies are winner count over sample count.
pub fn aggregate(samples: &SampledGraphSet) -> ConsensusGraph {
    let mut nodes: Vec<String> = Vec::new();
    for graph in samples.graphs() {
        for n in graph.nodes() {
            if !nodes.contains(n) {
                nodes.push(n.clone());
            }
        }
    }

    let total = samples.len();
    let mut edges: BTreeMap<NodePair, ConsensusEdge> = BTreeMap::new();

    let mut sorted_nodes = nodes.clone();
    sorted_nodes.sort();

    for (i, a) in sorted_nodes.iter().enumerate() {
        for b in sorted_nodes.iter().skip(i + 1) {
            // Tally in first-seen order; absence counts as a representation.
            let mut tally: Vec<(Option<PagEdge>, usize)> = Vec::new();
            for graph in samples.graphs() {
                let repr = graph.edge_between(a, b).cloned();
                match tally.iter_mut().find(|(r, _)| *r == repr) {
                    Some((_, count)) => *count += 1,
                    None => tally.push((repr, 1)),
                }
            }

            // Strict comparison keeps the first-seen representation on ties.
            let mut winner: Option<&(Option<PagEdge>, usize)> = None;
            for entry in &tally {
                if winner.map_or(true, |w| entry.1 > w.1) {
                    winner = Some(entry);
                }
            }
            if let Some((Some(edge), count)) = winner {
                edges.insert(
                    edge.pair.clone(),
                    ConsensusEdge {
                        edge: edge.clone(),
                        frequency: *count as f64 / total as f64,
                    },
                );
            }
        }
    }

    ConsensusGraph { nodes, edges }
}

/// Extract one edge-type channel's prediction stream.
///
/// Every candidate edge of the channel (ordered node pairs for the
/// direction-bearing channels, unordered otherwise) becomes a record with
/// predicted = fraction of sampled graphs containing exactly that edge and
/// observed = whether the ground-truth graph contains it. Candidates that
/// are absent from both are skipped.
pub fn channel_values(
    samples: &SampledGraphSet,
    truth: &PagGraph,
    channel: EdgeTypeChannel,
) -> Vec<EdgeValue> {
    let mut nodes: Vec<String> = truth.nodes().to_vec();
    nodes.sort();

    let mut values = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        for b in nodes.iter().skip(i + 1) {
            for candidate in candidates(a, b, channel) {
                let hits = samples
                    .graphs()
                    .iter()
                    .filter(|g| g.contains_edge(&candidate.edge))
                    .count();
                let predicted = if samples.is_empty() {
                    0.0
                } else {
                    hits as f64 / samples.len() as f64
                };
                let observed = u8::from(truth.contains_edge(&candidate.edge));
                if predicted == 0.0 && observed == 0 {
                    continue;
                }
                values.push(EdgeValue {
                    from: candidate.from,
                    to: candidate.to,
                    edge: candidate.edge.to_string(),
                    predicted,
                    observed,
                });
            }
        }
    }
    values
}

struct Candidate {
    from: String,
    to: String,
    edge: PagEdge,
}

fn candidates(a: &str, b: &str, channel: EdgeTypeChannel) -> Vec<Candidate> {
    let near_from = match channel {
        EdgeTypeChannel::TailArrow => Endpoint::Tail,
        EdgeTypeChannel::CircleArrow => Endpoint::Circle,
        EdgeTypeChannel::CircleCircle => Endpoint::Circle,
        EdgeTypeChannel::ArrowArrow => Endpoint::Arrow,
    };
    if channel.is_oriented() {
        vec![
            Candidate {
                from: a.to_string(),
                to: b.to_string(),
                edge: PagEdge::new(a, b, near_from, Endpoint::Arrow),
            },
            Candidate {
                from: b.to_string(),
                to: a.to_string(),
                edge: PagEdge::new(b, a, near_from, Endpoint::Arrow),
            },
        ]
    } else {
        let near_to = match channel {
            EdgeTypeChannel::CircleCircle => Endpoint::Circle,
            _ => Endpoint::Arrow,
        };
        vec![Candidate {
            from: a.to_string(),
            to: b.to_string(),
            edge: PagEdge::new(a, b, near_from, near_to),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<String> {
        vec!["V".into(), "W".into(), "X".into(), "Y".into()]
    }

    fn graph_with(edges: Vec<PagEdge>) -> PagGraph {
        let mut g = PagGraph::new(nodes());
        for e in edges {
            g.add_edge(e);
        }
        g
    }

    #[test]
    fn identical_copies_aggregate_to_the_same_graph() {
        let base = graph_with(vec![
            PagEdge::directed("V", "X"),
            PagEdge::circle_arrow("W", "X"),
            PagEdge::bidirected("X", "Y"),
        ]);

        let mut samples = SampledGraphSet::new();
        for _ in 0..7 {
            samples.push(base.clone());
        }

        let consensus = aggregate(&samples);
        assert_eq!(consensus.to_graph(), base);
        for ce in consensus.edges() {
            assert_eq!(ce.frequency, 1.0);
        }
    }

    #[test]
    fn modal_representation_wins() {
        let directed = graph_with(vec![PagEdge::directed("V", "X")]);
        let circled = graph_with(vec![PagEdge::circle_circle("V", "X")]);

        let mut samples = SampledGraphSet::new();
        samples.push(circled.clone());
        samples.push(directed.clone());
        samples.push(directed.clone());

        let consensus = aggregate(&samples);
        let ce = consensus.edge_between("V", "X").unwrap();
        assert_eq!(ce.edge, PagEdge::directed("V", "X"));
        assert!((ce.frequency - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ties_break_by_first_seen() {
        let directed = graph_with(vec![PagEdge::directed("V", "X")]);
        let circled = graph_with(vec![PagEdge::circle_circle("V", "X")]);

        let mut samples = SampledGraphSet::new();
        samples.push(circled.clone());
        samples.push(directed);

        let consensus = aggregate(&samples);
        let ce = consensus.edge_between("V", "X").unwrap();
        assert_eq!(ce.edge, PagEdge::circle_circle("V", "X"));
        assert_eq!(ce.frequency, 0.5);
    }

    #[test]
    fn absence_can_win() {
        let with_edge = graph_with(vec![PagEdge::directed("V", "X")]);
        let without = graph_with(vec![]);

        let mut samples = SampledGraphSet::new();
        samples.push(without.clone());
        samples.push(without);
        samples.push(with_edge);

        let consensus = aggregate(&samples);
        assert!(consensus.edge_between("V", "X").is_none());
        assert_eq!(consensus.num_edges(), 0);
    }

    #[test]
    fn channel_values_report_frequency_and_truth() {
        let truth = graph_with(vec![PagEdge::directed("V", "X")]);
        let mut samples = SampledGraphSet::new();
        samples.push(graph_with(vec![PagEdge::directed("V", "X")]));
        samples.push(graph_with(vec![PagEdge::directed("V", "X")]));
        samples.push(graph_with(vec![PagEdge::directed("X", "V")]));
        samples.push(graph_with(vec![]));

        let values = channel_values(&samples, &truth, EdgeTypeChannel::TailArrow);
        assert_eq!(values.len(), 2);

        let forward = values.iter().find(|v| v.from == "V" && v.to == "X").unwrap();
        assert_eq!(forward.observed, 1);
        assert!((forward.predicted - 0.5).abs() < 1e-12);

        let reverse = values.iter().find(|v| v.from == "X" && v.to == "V").unwrap();
        assert_eq!(reverse.observed, 0);
        assert!((reverse.predicted - 0.25).abs() < 1e-12);
    }

    #[test]
    fn channel_values_skip_never_seen_candidates() {
        let truth = graph_with(vec![]);
        let mut samples = SampledGraphSet::new();
        samples.push(graph_with(vec![PagEdge::circle_circle("V", "W")]));

        let cc = channel_values(&samples, &truth, EdgeTypeChannel::CircleCircle);
        assert_eq!(cc.len(), 1);
        assert_eq!(cc[0].observed, 0);

        // Nothing bidirected anywhere: empty stream.
        let aa = channel_values(&samples, &truth, EdgeTypeChannel::ArrowArrow);
        assert!(aa.is_empty());
    }
}
