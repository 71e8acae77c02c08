//! Self-contained demo pieces: a four-variable Y-structure generator with
//! forward sampling, d-separation over the generating DAG, a chi-squared
//! stand-in for Bayesian constraint inference, and a small skeleton-plus-
//! colliders search. Together they exercise the whole pipeline without any
//! external inference backend.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use causal_graphs::{Endpoint, NodePair, PagEdge, PagGraph};
use independence_oracle::{
    ConstraintInference, DataSet, DsepOracle, ProbabilisticOracle, Variable, VariableKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sampling_engine::{DataSimulator, SearchStrategy, SimulatedData};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// A small DAG over named nodes, with d-separation queries.
#[derive(Debug, Clone)]
pub struct ToyDag {
    nodes: Vec<String>,
    parents: HashMap<String, Vec<String>>,
    children: HashMap<String, Vec<String>>,
}

impl ToyDag {
    pub fn new(nodes: &[&str], edges: &[(&str, &str)]) -> Self {
        let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        let mut parents: HashMap<String, Vec<String>> =
            nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        let mut children: HashMap<String, Vec<String>> =
            nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        for (from, to) in edges {
            if let Some(p) = parents.get_mut(*to) {
                p.push(from.to_string());
            }
            if let Some(c) = children.get_mut(*from) {
                c.push(to.to_string());
            }
        }
        Self {
            nodes,
            parents,
            children,
        }
    }

    /// The Y-structure used throughout: V -> X <- W, X -> Y.
    pub fn y_structure() -> Self {
        Self::new(&["V", "W", "X", "Y"], &[("V", "X"), ("W", "X"), ("X", "Y")])
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// The PAG of the Y-structure: the collider at X is compelled, as is
    /// X -> Y; the roots keep circle marks.
    pub fn y_structure_pag() -> PagGraph {
        let mut pag = PagGraph::new(
            ["V", "W", "X", "Y"].iter().map(|s| s.to_string()).collect(),
        );
        pag.add_edge(PagEdge::circle_arrow("V", "X"));
        pag.add_edge(PagEdge::circle_arrow("W", "X"));
        pag.add_edge(PagEdge::directed("X", "Y"));
        pag
    }
}

/// Ball-passing reachability: two nodes are d-connected given Z iff an
/// active path exists. Visiting states are (node, arrived-from-child).
impl DsepOracle for ToyDag {
    fn is_independent(&self, x: &str, y: &str, z: &[String]) -> bool {
        let conditioned: HashSet<&str> = z.iter().map(String::as_str).collect();
        let mut visited: HashSet<(String, bool)> = HashSet::new();
        let mut queue: VecDeque<(String, bool)> = VecDeque::new();
        queue.push_back((x.to_string(), true));

        while let Some((node, from_child)) = queue.pop_front() {
            if node == y {
                return false;
            }
            if !visited.insert((node.clone(), from_child)) {
                continue;
            }
            let observed = conditioned.contains(node.as_str());
            if from_child {
                // Chain and fork through an unobserved node.
                if !observed {
                    for p in &self.parents[&node] {
                        queue.push_back((p.clone(), true));
                    }
                    for c in &self.children[&node] {
                        queue.push_back((c.clone(), false));
                    }
                }
            } else if observed {
                // Collider opened by conditioning.
                for p in &self.parents[&node] {
                    queue.push_back((p.clone(), true));
                }
            } else {
                for c in &self.children[&node] {
                    queue.push_back((c.clone(), false));
                }
            }
        }
        true
    }
}

/// Forward-samples binary data from the Y-structure.
pub struct DemoSimulator;

impl DataSimulator for DemoSimulator {
    fn simulate(
        &self,
        n_cases: usize,
        _avg_degree: usize,
        seed: u64,
    ) -> anyhow::Result<SimulatedData> {
        let dag = ToyDag::y_structure();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n_cases);
        for _ in 0..n_cases {
            let v = i32::from(rng.gen_bool(0.5));
            let w = i32::from(rng.gen_bool(0.5));
            let p_x = if v == 1 || w == 1 { 0.85 } else { 0.1 };
            let x = i32::from(rng.gen_bool(p_x));
            let p_y = if x == 1 { 0.9 } else { 0.1 };
            let y = i32::from(rng.gen_bool(p_y));
            rows.push(vec![v, w, x, y]);
        }

        let variables = dag
            .nodes()
            .iter()
            .map(|n| Variable::discrete(n.clone(), 2))
            .collect();
        Ok(SimulatedData {
            data_set: DataSet::new(variables, rows)?,
            truth: ToyDag::y_structure_pag(),
            ground_truth: Box::new(dag),
        })
    }
}

/// G-test of conditional independence over smoothed contingency counts,
/// reporting the chi-squared p-value as the probability of independence.
/// A crude stand-in for full Bayesian constraint inference, but it keeps
/// the demo self-contained.
pub struct GTestInference;

impl ConstraintInference for GTestInference {
    fn prob_independent(
        &self,
        data: &DataSet,
        rows: &[usize],
        x: usize,
        y: usize,
        z: &[usize],
        prior_equivalent_sample_size: f64,
    ) -> f64 {
        let card = |column: usize| match data.variables()[column].kind {
            VariableKind::Discrete { categories } => categories,
            VariableKind::Continuous => 0,
        };
        let cx = card(x);
        let cy = card(y);
        let z_cards: Vec<usize> = z.iter().map(|&c| card(c)).collect();
        let z_cells: usize = z_cards.iter().product();
        if cx < 2 || cy < 2 || z_cells == 0 {
            return 0.5;
        }

        let alpha = prior_equivalent_sample_size / (cx * cy * z_cells) as f64;
        let mut counts = vec![vec![vec![alpha; cy]; cx]; z_cells];
        for &r in rows {
            let mut zi = 0usize;
            for (&zc, &cards) in z.iter().zip(&z_cards) {
                zi = zi * cards + data.value(r, zc) as usize;
            }
            let xv = data.value(r, x) as usize;
            let yv = data.value(r, y) as usize;
            counts[zi][xv][yv] += 1.0;
        }

        let mut g = 0.0;
        for cell in &counts {
            let n_z: f64 = cell.iter().flatten().sum();
            for xv in 0..cx {
                let n_xz: f64 = cell[xv].iter().sum();
                for yv in 0..cy {
                    let n_yz: f64 = (0..cx).map(|i| cell[i][yv]).sum();
                    let n_xyz = cell[xv][yv];
                    g += 2.0 * n_xyz * (n_xyz * n_z / (n_xz * n_yz)).ln();
                }
            }
        }

        let dof = ((cx - 1) * (cy - 1) * z_cells) as f64;
        ChiSquared::new(dof)
            .map(|dist| 1.0 - dist.cdf(g.max(0.0)))
            .unwrap_or(0.5)
    }
}

/// Skeleton search up to conditioning depth 1, then collider orientation on
/// unshielded triples. Remaining endpoints stay circles.
pub struct SkeletonSearch;

impl SkeletonSearch {
    fn nodes(data: &DataSet) -> Vec<String> {
        data.variables().iter().map(|v| v.name.clone()).collect()
    }
}

impl SearchStrategy for SkeletonSearch {
    fn search(
        &self,
        oracle: &mut ProbabilisticOracle<'_>,
        data: &DataSet,
    ) -> anyhow::Result<PagGraph> {
        let nodes = Self::nodes(data);
        // Ordered sets keep the query sequence, and with it the oracle's
        // random stream, deterministic per seed.
        let mut adjacent: BTreeSet<NodePair> = BTreeSet::new();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                adjacent.insert(NodePair::new(a.clone(), b.clone()));
            }
        }
        let mut sepsets: BTreeMap<NodePair, Vec<String>> = BTreeMap::new();

        // Depth 0, then depth 1 with every third variable.
        for pair in adjacent.clone() {
            if oracle.query(pair.a(), pair.b(), &[])?.independent {
                adjacent.remove(&pair);
                sepsets.insert(pair, Vec::new());
            }
        }
        for pair in adjacent.clone() {
            for c in &nodes {
                if c == pair.a() || c == pair.b() {
                    continue;
                }
                let z = vec![c.clone()];
                if oracle.query(pair.a(), pair.b(), &z)?.independent {
                    adjacent.remove(&pair);
                    sepsets.insert(pair.clone(), z);
                    break;
                }
            }
        }

        // Endpoint marks per remaining pair, keyed (endpoint at a, at b).
        let mut marks: BTreeMap<NodePair, (Endpoint, Endpoint)> = adjacent
            .iter()
            .map(|p| (p.clone(), (Endpoint::Circle, Endpoint::Circle)))
            .collect();

        // Collider orientation: for an unshielded triple a - b - c whose
        // separating set excludes b, put arrowheads at b.
        for b in &nodes {
            let neighbors: Vec<&String> = nodes
                .iter()
                .filter(|n| *n != b && adjacent.contains(&NodePair::new((*n).clone(), b.clone())))
                .collect();
            for (i, a) in neighbors.iter().enumerate() {
                for c in &neighbors[i + 1..] {
                    let ac = NodePair::new((*a).clone(), (*c).clone());
                    if adjacent.contains(&ac) {
                        continue;
                    }
                    let Some(sepset) = sepsets.get(&ac) else {
                        continue;
                    };
                    if sepset.contains(b) {
                        continue;
                    }
                    for arm in [*a, *c] {
                        let pair = NodePair::new(arm.clone(), b.clone());
                        if let Some(ends) = marks.get_mut(&pair) {
                            if pair.a() == b.as_str() {
                                ends.0 = Endpoint::Arrow;
                            } else {
                                ends.1 = Endpoint::Arrow;
                            }
                        }
                    }
                }
            }
        }

        let mut graph = PagGraph::new(nodes);
        for (pair, (end_a, end_b)) in marks {
            graph.add_edge(PagEdge::new(pair.a(), pair.b(), end_a, end_b));
        }
        Ok(graph)
    }

    /// Permissive check: every edge must carry a representable endpoint
    /// combination (one of the four channels or a plain undirected edge).
    fn is_legal(&self, graph: &PagGraph) -> bool {
        graph.edges().all(|e| {
            e.channel().is_some()
                || (e.end_a == Endpoint::Tail && e.end_b == Endpoint::Tail)
        })
    }
}
