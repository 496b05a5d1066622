//! Source/destination selection models (SPEC_FULL §4.7). Grounded on
//! `original_source/sim/SimFlowGen.py::build_gravity_table`/`pick_src_dst_gravity`/
//! `pick_dst_uniform`.

use std::collections::VecDeque;

use rand::Rng;
use rustc_hash::FxHashSet;

use crate::topology::{HostIp, Node, NodeId, Topology};

/// How a new flow's source and destination host are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrcDstModel {
    /// Any host pair not co-located on the same edge switch.
    Uniform,
    /// Weighted toward node pairs with many hosts close together.
    Gravity,
    /// Weighted toward node pairs with few hosts far apart.
    Antigravity,
}

/// Hop count between `src` and `dst`, via plain BFS over the topology graph. The
/// topology is validated fully connected at construction, so this always terminates.
fn hop_distance(topo: &Topology, src: NodeId, dst: NodeId) -> u32 {
    if src == dst {
        return 0;
    }
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([(src, 0u32)]);
    visited.insert(src);
    while let Some((u, d)) = queue.pop_front() {
        for v in topo.neighbors(u) {
            if v == dst {
                return d + 1;
            }
            if visited.insert(v) {
                queue.push_back((v, d + 1));
            }
        }
    }
    unreachable!("topology connectivity is validated at construction (TopologyError::Disconnected)")
}

/// Precomputed gravity weights for every ordered pair of edge switches. Ported
/// field-for-field from `build_gravity_table`, including its unusual accumulation
/// scheme: `total_weight` runs across the *entire* flattened `(src, dst)` iteration
/// rather than resetting per source row, so a row's thresholds are a slice of one long
/// cumulative sequence, not an independent distribution. `pick` relies on exactly that
/// shape, so this is preserved rather than "fixed".
#[derive(Debug, Clone)]
pub struct GravityTable {
    nodes: Vec<NodeId>,
    row_cumulative: Vec<Vec<f64>>,
    src_cumulative: Vec<f64>,
}

impl GravityTable {
    pub fn build(topo: &Topology, model: SrcDstModel) -> Self {
        let mut nodes: Vec<NodeId> = topo.nodes().filter(|n| n.is_edge()).map(|n| n.id).collect();
        nodes.sort();

        let mut total = 0.0f64;
        let mut row_cumulative = Vec::with_capacity(nodes.len());
        let mut src_cumulative = Vec::with_capacity(nodes.len());
        for &src in &nodes {
            let mut row = Vec::with_capacity(nodes.len());
            for &dst in &nodes {
                if src == dst {
                    row.push(total);
                    continue;
                }
                let dist = hop_distance(topo, src, dst) as f64;
                let n1 = topo.node(src).n_hosts as f64;
                let n2 = topo.node(dst).n_hosts as f64;
                let weight = match model {
                    SrcDstModel::Gravity => n1 * n2 / (dist * dist),
                    SrcDstModel::Antigravity => (dist * dist) / (n1 * n2),
                    SrcDstModel::Uniform => unreachable!("GravityTable is only built for gravity/antigravity"),
                };
                total += weight;
                row.push(total);
            }
            row_cumulative.push(row);
            src_cumulative.push(total);
        }
        for row in &mut row_cumulative {
            for v in row.iter_mut() {
                *v /= total;
            }
        }
        for v in &mut src_cumulative {
            *v /= total;
        }

        Self { nodes, row_cumulative, src_cumulative }
    }

    /// Given a single uniform draw in `[0,1)`, returns the `(src_node, dst_node)` pair
    /// whose cumulative-weight bucket contains it. Falls back to index 0 if rounding
    /// ever leaves every threshold below `rand_num`, matching the Python's default.
    fn pick(&self, rand_num: f64) -> (NodeId, NodeId) {
        let src_idx = self
            .src_cumulative
            .iter()
            .position(|&t| rand_num <= t)
            .unwrap_or(0);
        let dst_idx = self.row_cumulative[src_idx]
            .iter()
            .position(|&t| rand_num <= t)
            .unwrap_or(0);
        (self.nodes[src_idx], self.nodes[dst_idx])
    }
}

fn random_host_ip(rng: &mut impl Rng, node: &Node) -> HostIp {
    debug_assert!(node.n_hosts > 0, "gravity table only selects edge switches");
    let base = node.base_ip.into_usize();
    HostIp::new(base + rng.gen_range(0..node.n_hosts as usize))
}

/// Draws a `(src_ip, dst_ip)` pair from the gravity table, rejecting pairs already in
/// use by an active flow.
pub fn pick_src_dst_gravity(
    table: &GravityTable,
    rng: &mut impl Rng,
    topo: &Topology,
    active: &FxHashSet<(HostIp, HostIp)>,
) -> (HostIp, HostIp) {
    loop {
        let rand_num = rng.gen_range(0.0..1.0);
        let (src_node, dst_node) = table.pick(rand_num);
        let src_ip = random_host_ip(rng, topo.node(src_node));
        let dst_ip = random_host_ip(rng, topo.node(dst_node));
        if !active.contains(&(src_ip, dst_ip)) {
            return (src_ip, dst_ip);
        }
    }
}

/// Picks a uniformly random host not on `src_ip`'s edge switch.
pub fn pick_dst_uniform(
    hosts: &[HostIp],
    rng: &mut impl Rng,
    topo: &Topology,
    src_ip: HostIp,
) -> HostIp {
    let src_switch = topo.edge_switch_of(src_ip);
    loop {
        let candidate = hosts[rng.gen_range(0..hosts.len())];
        if topo.edge_switch_of(candidate) != src_switch {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkSpec, NodeSpec, TopologyOverrides};
    use crate::units::BytesPerSec;
    use rand::{rngs::StdRng, SeedableRng};

    fn line_topo() -> Topology {
        let nodes = vec![
            NodeSpec::new("A".into(), 10, 4),
            NodeSpec::new("B".into(), 10, 1),
        ];
        let links = vec![LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(10))];
        Topology::new(&nodes, &links, TopologyOverrides::default()).unwrap()
    }

    #[test]
    fn gravity_weights_favor_the_larger_host_count_pair() {
        let topo = line_topo();
        let table = GravityTable::build(&topo, SrcDstModel::Gravity);
        let mut rng = StdRng::seed_from_u64(3);
        let mut active = FxHashSet::default();
        for _ in 0..50 {
            let (src, dst) = pick_src_dst_gravity(&table, &mut rng, &topo, &active);
            assert_ne!(src, dst);
            active.clear(); // only dedupe within a single draw, not across draws
        }
    }

    #[test]
    fn pick_dst_uniform_never_shares_src_edge_switch() {
        let topo = line_topo();
        let a = topo.node_by_name("A").unwrap();
        let hosts: Vec<HostIp> = (0..a.n_hosts as usize)
            .map(|i| HostIp::new(a.base_ip.into_usize() + i))
            .chain((0..1).map(|i| {
                let b = topo.node_by_name("B").unwrap();
                HostIp::new(b.base_ip.into_usize() + i)
            }))
            .collect();
        let src_ip = hosts[0];
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let dst = pick_dst_uniform(&hosts, &mut rng, &topo, src_ip);
            assert_ne!(topo.edge_switch_of(dst), topo.edge_switch_of(src_ip));
        }
    }
}
