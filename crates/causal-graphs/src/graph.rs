use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Mark at one end of a PAG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    Tail,
    Arrow,
    Circle,
}

/// An unordered pair of node names, stored in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePair {
    a: String,
    b: String,
}

impl NodePair {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        let x = x.into();
        let y = y.into();
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn a(&self) -> &str {
        &self.a
    }

    pub fn b(&self) -> &str {
        &self.b
    }
}

/// The four edge-type prediction channels examined against ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeTypeChannel {
    /// Directed edge: tail at one end, arrow at the other.
    TailArrow,
    /// Partially directed: circle at one end, arrow at the other.
    CircleArrow,
    /// Non-directed: circles at both ends.
    CircleCircle,
    /// Bidirected: arrows at both ends.
    ArrowArrow,
}

impl EdgeTypeChannel {
    pub const ALL: [EdgeTypeChannel; 4] = [
        EdgeTypeChannel::TailArrow,
        EdgeTypeChannel::CircleArrow,
        EdgeTypeChannel::CircleCircle,
        EdgeTypeChannel::ArrowArrow,
    ];

    /// Whether candidate edges of this channel are direction-bearing.
    pub fn is_oriented(&self) -> bool {
        matches!(self, EdgeTypeChannel::TailArrow | EdgeTypeChannel::CircleArrow)
    }

    /// Short tag used in report file names.
    pub fn tag(&self) -> &'static str {
        match self {
            EdgeTypeChannel::TailArrow => "ta",
            EdgeTypeChannel::CircleArrow => "ca",
            EdgeTypeChannel::CircleCircle => "cc",
            EdgeTypeChannel::ArrowArrow => "aa",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EdgeTypeChannel::TailArrow => "tail_arrow",
            EdgeTypeChannel::CircleArrow => "circle_arrow",
            EdgeTypeChannel::CircleCircle => "circle_circle",
            EdgeTypeChannel::ArrowArrow => "arrow_arrow",
        }
    }
}

/// A PAG edge: an unordered node pair plus the mark at each end, with
/// `end_a` belonging to the lexicographically smaller node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagEdge {
    pub pair: NodePair,
    pub end_a: Endpoint,
    pub end_b: Endpoint,
}

impl PagEdge {
    /// Build an edge from `from` to `to`, with `near_from` the mark next to
    /// `from` and `near_to` the mark next to `to`. The endpoints are stored
    /// relative to the canonical node order.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        near_from: Endpoint,
        near_to: Endpoint,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        if from <= to {
            Self {
                pair: NodePair::new(from, to),
                end_a: near_from,
                end_b: near_to,
            }
        } else {
            Self {
                pair: NodePair::new(from, to),
                end_a: near_to,
                end_b: near_from,
            }
        }
    }

    /// A directed edge `from --> to`.
    pub fn directed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Endpoint::Tail, Endpoint::Arrow)
    }

    /// A partially directed edge `from o-> to`.
    pub fn circle_arrow(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Endpoint::Circle, Endpoint::Arrow)
    }

    /// A non-directed edge `a o-o b`.
    pub fn circle_circle(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self::new(x, y, Endpoint::Circle, Endpoint::Circle)
    }

    /// A bidirected edge `a <-> b`.
    pub fn bidirected(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self::new(x, y, Endpoint::Arrow, Endpoint::Arrow)
    }

    /// The channel this edge's endpoint combination belongs to, if any.
    /// Tail-tail (undirected) edges have no channel.
    pub fn channel(&self) -> Option<EdgeTypeChannel> {
        use Endpoint::*;
        match (self.end_a, self.end_b) {
            (Tail, Arrow) | (Arrow, Tail) => Some(EdgeTypeChannel::TailArrow),
            (Circle, Arrow) | (Arrow, Circle) => Some(EdgeTypeChannel::CircleArrow),
            (Circle, Circle) => Some(EdgeTypeChannel::CircleCircle),
            (Arrow, Arrow) => Some(EdgeTypeChannel::ArrowArrow),
            (Tail, Tail) => None,
            (Tail, Circle) | (Circle, Tail) => None,
        }
    }
}

impl fmt::Display for PagEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = match self.end_a {
            Endpoint::Tail => '-',
            Endpoint::Arrow => '<',
            Endpoint::Circle => 'o',
        };
        let right = match self.end_b {
            Endpoint::Tail => '-',
            Endpoint::Arrow => '>',
            Endpoint::Circle => 'o',
        };
        write!(f, "{} {}-{} {}", self.pair.a(), left, right, self.pair.b())
    }
}

/// A graph over a fixed variable set with at most one edge per node pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagGraph {
    nodes: Vec<String>,
    edges: BTreeMap<NodePair, PagEdge>,
}

impl PagGraph {
    pub fn new(nodes: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(nodes.len());
        for n in nodes {
            if !deduped.contains(&n) {
                deduped.push(n);
            }
        }
        Self {
            nodes: deduped,
            edges: BTreeMap::new(),
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n == name)
    }

    /// Insert or replace the edge for its node pair.
    pub fn add_edge(&mut self, edge: PagEdge) {
        self.edges.insert(edge.pair.clone(), edge);
    }

    pub fn remove_edge(&mut self, pair: &NodePair) -> Option<PagEdge> {
        self.edges.remove(pair)
    }

    pub fn edge_between(&self, x: &str, y: &str) -> Option<&PagEdge> {
        self.edges.get(&NodePair::new(x, y))
    }

    /// Whether the graph contains exactly this edge (same marks).
    pub fn contains_edge(&self, edge: &PagEdge) -> bool {
        self.edges.get(&edge.pair) == Some(edge)
    }

    pub fn edges(&self) -> impl Iterator<Item = &PagEdge> {
        self.edges.values()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Plain-text listing: node line followed by a numbered edge list.
    pub fn edge_list_string(&self) -> String {
        let mut out = String::new();
        out.push_str("Graph Nodes:\n");
        out.push_str(&self.nodes.join(";"));
        out.push_str("\n\nGraph Edges:\n");
        for (i, edge) in self.edges.values().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, edge));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_orientation_is_canonical() {
        // W --> A stores the arrow at A, the smaller node.
        let edge = PagEdge::directed("W", "A");
        assert_eq!(edge.pair.a(), "A");
        assert_eq!(edge.end_a, Endpoint::Arrow);
        assert_eq!(edge.end_b, Endpoint::Tail);
        assert_eq!(edge.to_string(), "A <-- W");
    }

    #[test]
    fn display_marks() {
        assert_eq!(PagEdge::directed("A", "B").to_string(), "A --> B");
        assert_eq!(PagEdge::circle_arrow("A", "B").to_string(), "A o-> B");
        assert_eq!(PagEdge::circle_circle("B", "A").to_string(), "A o-o B");
        assert_eq!(PagEdge::bidirected("A", "B").to_string(), "A <-> B");
    }

    #[test]
    fn channels() {
        assert_eq!(
            PagEdge::directed("A", "B").channel(),
            Some(EdgeTypeChannel::TailArrow)
        );
        assert_eq!(
            PagEdge::directed("B", "A").channel(),
            Some(EdgeTypeChannel::TailArrow)
        );
        assert_eq!(
            PagEdge::circle_arrow("A", "B").channel(),
            Some(EdgeTypeChannel::CircleArrow)
        );
        assert_eq!(
            PagEdge::circle_circle("A", "B").channel(),
            Some(EdgeTypeChannel::CircleCircle)
        );
        assert_eq!(
            PagEdge::bidirected("A", "B").channel(),
            Some(EdgeTypeChannel::ArrowArrow)
        );
        assert_eq!(
            PagEdge::new("A", "B", Endpoint::Tail, Endpoint::Tail).channel(),
            None
        );
    }

    #[test]
    fn graph_holds_one_edge_per_pair() {
        let mut graph = PagGraph::new(vec!["A".into(), "B".into(), "C".into()]);
        graph.add_edge(PagEdge::circle_circle("A", "B"));
        graph.add_edge(PagEdge::directed("A", "B"));
        assert_eq!(graph.num_edges(), 1);
        assert!(graph.contains_edge(&PagEdge::directed("A", "B")));
        assert!(!graph.contains_edge(&PagEdge::circle_circle("A", "B")));
    }

    #[test]
    fn exact_containment_distinguishes_direction() {
        let mut graph = PagGraph::new(vec!["A".into(), "B".into()]);
        graph.add_edge(PagEdge::directed("A", "B"));
        assert!(!graph.contains_edge(&PagEdge::directed("B", "A")));
    }

    #[test]
    fn edge_list_format() {
        let mut graph = PagGraph::new(vec!["V".into(), "W".into()]);
        graph.add_edge(PagEdge::directed("V", "W"));
        let listing = graph.edge_list_string();
        assert!(listing.contains("V;W"));
        assert!(listing.contains("1. V --> W"));
    }
}
