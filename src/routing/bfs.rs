//! Unweighted shortest-path primitives shared by every path-database mode.
//!
//! Grounded on `original_source/sim/SimCtrlPathDB.py`, which builds all of its path sets
//! on top of `networkx`'s unweighted `shortest_path`/`all_shortest_paths`. We work over a
//! plain adjacency map rather than `petgraph` directly so that Yen's algorithm (§4.2) can
//! exclude individual nodes/edges per spur without cloning a graph on every iteration.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::topology::{NodeId, Topology};

pub type Adjacency = FxHashMap<NodeId, Vec<NodeId>>;

/// Builds a plain adjacency map from the topology, with each node's neighbor list sorted
/// by `NodeId` for deterministic traversal order.
pub fn adjacency(topo: &Topology) -> Adjacency {
    let mut adj = Adjacency::default();
    for id in topo.node_ids() {
        let mut neighbors: Vec<NodeId> = topo.neighbors(id).collect();
        neighbors.sort();
        adj.insert(id, neighbors);
    }
    adj
}

/// One shortest path from `src` to `dst`, or `None` if unreachable under the given
/// exclusions. Ties among shortest paths are broken by the adjacency list's (sorted)
/// order, making the result deterministic.
pub fn shortest_path(
    adj: &Adjacency,
    src: NodeId,
    dst: NodeId,
    excluded_nodes: &FxHashSet<NodeId>,
    excluded_edges: &FxHashSet<(NodeId, NodeId)>,
) -> Option<Vec<NodeId>> {
    if src == dst {
        return Some(vec![src]);
    }
    let mut visited = FxHashSet::default();
    let mut prev: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut queue = VecDeque::new();
    visited.insert(src);
    queue.push_back(src);
    while let Some(u) = queue.pop_front() {
        if u == dst {
            return Some(reconstruct(&prev, src, dst));
        }
        for &v in adj.get(&u).into_iter().flatten() {
            if excluded_nodes.contains(&v) && v != dst {
                continue;
            }
            if excluded_edges.contains(&(u, v)) || excluded_edges.contains(&(v, u)) {
                continue;
            }
            if visited.insert(v) {
                prev.insert(v, u);
                queue.push_back(v);
            }
        }
    }
    None
}

fn reconstruct(prev: &FxHashMap<NodeId, NodeId>, src: NodeId, dst: NodeId) -> Vec<NodeId> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        cur = prev[&cur];
        path.push(cur);
    }
    path.reverse();
    path
}

/// Every shortest path from `src` to `dst`, found via a BFS that records all predecessors
/// at the minimal distance (so parallel shortest paths are all discovered) and then
/// enumerated by backtracking.
pub fn all_shortest_paths(adj: &Adjacency, src: NodeId, dst: NodeId) -> Vec<Vec<NodeId>> {
    if src == dst {
        return vec![vec![src]];
    }
    let mut dist: FxHashMap<NodeId, u32> = FxHashMap::default();
    let mut preds: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    dist.insert(src, 0);
    let mut queue = VecDeque::from([src]);
    while let Some(u) = queue.pop_front() {
        let du = dist[&u];
        for &v in adj.get(&u).into_iter().flatten() {
            match dist.get(&v) {
                None => {
                    dist.insert(v, du + 1);
                    preds.entry(v).or_default().push(u);
                    queue.push_back(v);
                }
                Some(&dv) if dv == du + 1 => {
                    preds.entry(v).or_default().push(u);
                }
                _ => {}
            }
        }
    }
    if !dist.contains_key(&dst) {
        return Vec::new();
    }
    let mut paths = Vec::new();
    let mut stack = vec![vec![dst]];
    while let Some(partial) = stack.pop() {
        let head = *partial.first().unwrap();
        if head == src {
            paths.push(partial);
            continue;
        }
        for &p in preds.get(&head).into_iter().flatten() {
            let mut next = Vec::with_capacity(partial.len() + 1);
            next.push(p);
            next.extend(partial.iter().copied());
            stack.push(next);
        }
    }
    paths.sort();
    paths
}

/// Whether every node is reachable from every other, used to validate the topology up
/// front so that path lookup can never fail at request time (SPEC_FULL §4.2, §7).
pub fn fully_connected(adj: &Adjacency) -> bool {
    let Some(&start) = adj.keys().next() else {
        return true;
    };
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([start]);
    visited.insert(start);
    while let Some(u) = queue.pop_front() {
        for &v in adj.get(&u).into_iter().flatten() {
            if visited.insert(v) {
                queue.push_back(v);
            }
        }
    }
    visited.len() == adj.len()
}
