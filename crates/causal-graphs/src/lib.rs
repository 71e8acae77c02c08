//! Partial ancestral graph (PAG) model and sampled-graph aggregation.
//!
//! A PAG edge carries one of three marks at each endpoint (tail, arrow,
//! circle). This crate stores graphs over a shared variable set, collects
//! the accepted graphs of a resampling campaign, reduces them to a single
//! consensus graph with per-edge frequencies, and extracts the per-edge-type
//! prediction channels used for discrimination statistics.

pub mod aggregate;
pub mod graph;

pub use aggregate::{aggregate, channel_values, ConsensusEdge, ConsensusGraph, SampledGraphSet};
pub use graph::{EdgeTypeChannel, Endpoint, NodePair, PagEdge, PagGraph};
