//! # Node Distance
//!
//! Hierarchical distance between two dotted node identifiers.
//!
//! Segments are compared position by position from the left. Matching
//! positions contribute nothing; from the first divergence (or the end of the
//! shorter identifier) every remaining segment on either side contributes 1.
//!
//! ```text
//! distance("a.b.c", "a.b.d") == 2
//! distance("a.b",   "a.b.c") == 1
//! distance("x",     "y")     == 2
//! ```

use std::cell::OnceCell;

use crate::entities::NodeId;

/// Distance between two dotted identifiers.
pub fn distance(from: &str, to: &str) -> u32 {
    let from: Vec<&str> = from.split('.').collect();
    let to: Vec<&str> = to.split('.').collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    ((from.len() - common) + (to.len() - common)) as u32
}

/// Order candidate nodes by proximity to `from`, closest first. Ties keep
/// their input order.
pub fn rank_by_distance<I>(from: &NodeId, candidates: I) -> Vec<NodeId>
where
    I: IntoIterator<Item = NodeId>,
{
    let mut ranked: Vec<NodeId> = candidates.into_iter().collect();
    ranked.sort_by_key(|node| distance(from.as_str(), node.as_str()));
    ranked
}

/// A `(from, to)` pair whose distance is computed once and memoized until
/// either endpoint is reassigned.
#[derive(Debug, Clone)]
pub struct NodeDistance {
    from: String,
    to: String,
    cached: OnceCell<u32>,
}

impl NodeDistance {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            cached: OnceCell::new(),
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn set_from(&mut self, from: impl Into<String>) {
        self.from = from.into();
        self.cached = OnceCell::new();
    }

    pub fn set_to(&mut self, to: impl Into<String>) {
        self.to = to.into();
        self.cached = OnceCell::new();
    }

    pub fn distance(&self) -> u32 {
        *self.cached.get_or_init(|| distance(&self.from, &self.to))
    }

    pub fn is_memoized(&self) -> bool {
        self.cached.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_distances() {
        assert_eq!(distance("a.b.c", "a.b.d"), 2);
        assert_eq!(distance("a.b", "a.b.c"), 1);
        assert_eq!(distance("x", "y"), 2);
        assert_eq!(distance("rack1.node3", "rack2.node3"), 4);
    }

    #[test]
    fn test_identity_and_symmetry() {
        let ids = ["a", "a.b", "a.b.c", "a.x.c", "z.y", "rack1.node3"];
        for a in ids {
            assert_eq!(distance(a, a), 0);
            for b in ids {
                assert_eq!(distance(a, b), distance(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_segments_after_divergence_all_count() {
        // "b" differs, so the matching trailing "c" still contributes.
        assert_eq!(distance("a.b.c", "a.x.c"), 4);
    }

    #[test]
    fn test_memoized_until_reassigned() {
        let mut d = NodeDistance::new("a.b", "a.b");
        assert!(!d.is_memoized());
        assert_eq!(d.distance(), 0);
        assert!(d.is_memoized());

        d.set_to("a.c");
        assert!(!d.is_memoized());
        assert_eq!(d.distance(), 2);

        d.set_from("a.c");
        assert_eq!(d.distance(), 0);
    }

    #[test]
    fn test_rank_by_distance() {
        let from = NodeId::from("dc1.rack1.n1");
        let ranked = rank_by_distance(
            &from,
            vec![
                NodeId::from("dc2.rack1.n1"),
                NodeId::from("dc1.rack1.n2"),
                NodeId::from("dc1.rack2.n1"),
            ],
        );
        let names: Vec<&str> = ranked.iter().map(NodeId::as_str).collect();
        assert_eq!(names, vec!["dc1.rack1.n2", "dc1.rack2.n1", "dc2.rack1.n1"]);
    }
}
