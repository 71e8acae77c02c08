use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A conditional-independence fact: is X independent of Y given Z?
///
/// The fact carries its variables in as-given order. Three derived keys
/// serve different purposes:
/// - [`label`](Self::label) keeps the caller's ordering and is used for
///   sample-recorder deduplication;
/// - [`sorted_label`](Self::sorted_label) normalizes x/y and z ordering and
///   keys the verdict cache, making judgments symmetric;
/// - [`key`](Self::key) is the hashable raw-inference cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndependenceFact {
    pub x: String,
    pub y: String,
    pub z: Vec<String>,
}

impl IndependenceFact {
    pub fn new(x: impl Into<String>, y: impl Into<String>, z: &[String]) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            z: z.to_vec(),
        }
    }

    /// As-given label, e.g. `P(X,Y|Z1,Z2)` or `P(X,Y)`.
    pub fn label(&self) -> String {
        if self.z.is_empty() {
            format!("P({},{})", self.x, self.y)
        } else {
            format!("P({},{}|{})", self.x, self.y, self.z.join(","))
        }
    }

    /// Order-insensitive label: x/y sorted as a set, z sorted as a set.
    /// Queries that differ only in variable ordering share this label.
    pub fn sorted_label(&self) -> String {
        let xy: BTreeSet<&str> = [self.x.as_str(), self.y.as_str()].into_iter().collect();
        let z: BTreeSet<&str> = self.z.iter().map(String::as_str).collect();
        let xy = xy.into_iter().collect::<Vec<_>>().join(",");
        if z.is_empty() {
            format!("P({})", xy)
        } else {
            let z = z.into_iter().collect::<Vec<_>>().join(",");
            format!("P({}|{})", xy, z)
        }
    }

    /// Canonical cache key: unordered {x, y} plus sorted z.
    pub fn key(&self) -> FactKey {
        let (a, b) = if self.x <= self.y {
            (self.x.clone(), self.y.clone())
        } else {
            (self.y.clone(), self.x.clone())
        };
        let mut z: Vec<String> = self.z.clone();
        z.sort();
        z.dedup();
        FactKey { a, b, z }
    }
}

/// Hashable canonical form of a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactKey {
    a: String,
    b: String,
    z: Vec<String>,
}
