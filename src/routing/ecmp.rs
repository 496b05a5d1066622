//! The per-destination ECMP DAG: for every interior node on some shortest path toward a
//! destination, the set of legal next hops. Grounded on
//! `original_source/sim/SimCtrlPathDB.py::build_ecmp_db`.

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::topology::NodeId;

/// `next_hops[node]` is every node that is the immediate successor of `node` on some
/// shortest path toward the DAG's destination.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    next_hops: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Dag {
    pub fn from_paths<'a>(paths: impl Iterator<Item = &'a Vec<NodeId>>) -> Self {
        let mut next_hops: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for path in paths {
            for w in path.windows(2) {
                let hops = next_hops.entry(w[0]).or_default();
                if !hops.contains(&w[1]) {
                    hops.push(w[1]);
                }
            }
        }
        Self { next_hops }
    }

    pub fn next_hops(&self, node: NodeId) -> &[NodeId] {
        self.next_hops.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Walks the DAG from `src` to `dst`, uniformly sampling a next hop at every node,
    /// yielding a uniformly random shortest path.
    pub fn walk(&self, src: NodeId, dst: NodeId, rng: &mut impl Rng) -> Option<Vec<NodeId>> {
        let mut path = vec![src];
        let mut cur = src;
        while cur != dst {
            let hops = self.next_hops(cur);
            if hops.is_empty() {
                return None;
            }
            cur = hops[rng.gen_range(0..hops.len())];
            path.push(cur);
        }
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn walk_uniformity_within_one_percent() {
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        let c = NodeId::new(2);
        let d = NodeId::new(3);
        let paths = vec![vec![a, b, d], vec![a, c, d]];
        let dag = Dag::from_paths(paths.iter());
        let mut rng = StdRng::seed_from_u64(42);
        let mut via_b = 0;
        let n = 10_000;
        for _ in 0..n {
            let path = dag.walk(a, d, &mut rng).unwrap();
            if path[1] == b {
                via_b += 1;
            }
        }
        let frac = via_b as f64 / n as f64;
        assert!((frac - 0.5).abs() < 0.01, "split was {frac}");
    }
}
