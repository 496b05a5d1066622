//! Yen's k-shortest-paths algorithm. Grounded on
//! `original_source/sim/SimCtrlPathDB.py::build_pathdb_kpath_yen`.

use rustc_hash::FxHashSet;

use crate::topology::NodeId;

use super::bfs::{shortest_path, Adjacency};

/// Up to `k` loopless shortest paths from `src` to `dst`, via Yen's algorithm.
///
/// For each already-confirmed path and each spur index along it, this removes every edge
/// that some confirmed path shares with the current prefix (to avoid reproducing a
/// confirmed path) and every internal prefix node (to avoid loops back into the prefix),
/// then searches for the shortest spur from that point to `dst`. The shortest candidate
/// collected across all spurs in a round becomes the next confirmed path. Stops at `k`
/// paths or when no candidate remains.
pub fn k_shortest_paths(adj: &Adjacency, src: NodeId, dst: NodeId, k: usize) -> Vec<Vec<NodeId>> {
    if k == 0 {
        return Vec::new();
    }
    let Some(first) = shortest_path(adj, src, dst, &FxHashSet::default(), &FxHashSet::default())
    else {
        return Vec::new();
    };
    let mut confirmed = vec![first];
    let mut candidates: Vec<Vec<NodeId>> = Vec::new();

    while confirmed.len() < k {
        let prev_path = confirmed.last().unwrap().clone();
        for spur_idx in 0..prev_path.len().saturating_sub(1) {
            let spur_node = prev_path[spur_idx];
            let root_path = &prev_path[..=spur_idx];

            let mut excluded_edges = FxHashSet::default();
            for path in &confirmed {
                if path.len() > spur_idx + 1 && path[..=spur_idx] == *root_path {
                    excluded_edges.insert((path[spur_idx], path[spur_idx + 1]));
                }
            }
            let excluded_nodes: FxHashSet<NodeId> =
                root_path[..spur_idx].iter().copied().collect();

            if let Some(spur_path) =
                shortest_path(adj, spur_node, dst, &excluded_nodes, &excluded_edges)
            {
                let mut total = root_path[..spur_idx].to_vec();
                total.extend(spur_path);
                if !confirmed.contains(&total) && !candidates.contains(&total) {
                    candidates.push(total);
                }
            }
        }
        if candidates.is_empty() {
            break;
        }
        candidates.sort_by_key(|p| p.len());
        confirmed.push(candidates.remove(0));
    }
    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn diamond_yields_exactly_two_paths() {
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        let c = NodeId::new(2);
        let d = NodeId::new(3);
        let adj: Adjacency = FxHashMap::from_iter([
            (a, vec![b, c]),
            (b, vec![a, d]),
            (c, vec![a, d]),
            (d, vec![b, c]),
        ]);
        let paths = k_shortest_paths(&adj, a, d, 3);
        assert_eq!(paths, vec![vec![a, b, d], vec![a, c, d]]);
    }

    #[test]
    fn k_one_matches_single_shortest_path() {
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        let c = NodeId::new(2);
        let d = NodeId::new(3);
        let adj: Adjacency = FxHashMap::from_iter([
            (a, vec![b, c]),
            (b, vec![a, d]),
            (c, vec![a, d]),
            (d, vec![b, c]),
        ]);
        let yen = k_shortest_paths(&adj, a, d, 1);
        let one_shortest =
            shortest_path(&adj, a, d, &FxHashSet::default(), &FxHashSet::default()).unwrap();
        assert_eq!(yen, vec![one_shortest]);
    }
}
