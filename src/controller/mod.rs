//! The SDN controller: admission feasibility, path selection, flow-entry bookkeeping, and
//! the elephant rerouter. Grounded on `original_source/sim/SimCtrl.py`.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::allocator::{canonical_link, max_min_fair, FlowInput, LinkKey};
use crate::flow::{Flow, FlowId};
use crate::routing::RouteDb;
use crate::topology::{HostIp, NodeId, Topology};
use crate::units::{Bytes, BytesPerSec};

/// How the controller picks a path for a new flow (SPEC_FULL §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Spf,
    Ecmp,
    Random,
    Fe,
    /// Historical alias for `Random`, used together with `pathdb_mode = kpath_yen`.
    KPath,
    /// Historical alias for `Fe`, used together with `pathdb_mode = kpath_yen`.
    KPathFe,
}

impl RoutingMode {
    /// Resolves the historical `kpath`/`kpath_fe` aliases to the policy they select.
    pub fn resolved(self) -> Self {
        match self {
            RoutingMode::KPath => RoutingMode::Random,
            RoutingMode::KPathFe => RoutingMode::Fe,
            other => other,
        }
    }
}

/// How the elephant rerouter scores candidate paths (SPEC_FULL §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerouteAlgo {
    Oab,
    Greedy,
}

/// Bounded retries for the ECMP DAG walk before giving up on a feasible path, matching a
/// random-restart on congestion rather than an exhaustive search of the DAG.
const ECMP_FEASIBILITY_RETRIES: usize = 8;

/// The controller's view of per-node flow tables and elephant-flow management state. Kept
/// separate from `Flow`/`Topology` because the controller's bookkeeping (SPEC_FULL's
/// "states kept at controller may not be strictly synchronized with the core") is
/// logically its own mutable store, even though in this synchronous single-threaded engine
/// it is in fact always in sync.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    tables: FxHashMap<NodeId, FxHashSet<(HostIp, HostIp)>>,
    old_eleph: FxHashMap<FlowId, BytesPerSec>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_usage(&self, node: NodeId) -> usize {
        self.tables.get(&node).map_or(0, FxHashSet::len)
    }

    /// A path is feasible iff every node on it has strictly fewer than its table size
    /// worth of entries at the instant of the check (SPEC_FULL §4.3).
    pub fn is_feasible(&self, path: &[NodeId], topo: &Topology) -> bool {
        path.iter()
            .all(|&n| self.table_usage(n) < topo.node(n).table_size as usize)
    }

    fn fe_penalty(&self, path: &[NodeId], topo: &Topology) -> f64 {
        path.iter()
            .map(|&n| {
                let size = topo.node(n).table_size as f64;
                let usage = self.table_usage(n) as f64;
                size / (size - usage)
            })
            .sum()
    }

    /// Selects a path for `(src, dst)` under `mode`, returning `None` when no feasible
    /// path exists (the `PacketIn` handler rejects on `None`).
    pub fn select_path(
        &self,
        mode: RoutingMode,
        route_db: &RouteDb,
        topo: &Topology,
        src: NodeId,
        dst: NodeId,
        rng: &mut impl Rng,
    ) -> Option<Vec<NodeId>> {
        match mode.resolved() {
            RoutingMode::Spf => route_db
                .paths(src, dst)
                .first()
                .filter(|p| self.is_feasible(p, topo))
                .cloned(),
            RoutingMode::Ecmp => {
                let dag = route_db.ecmp_dag(src, dst)?;
                for _ in 0..ECMP_FEASIBILITY_RETRIES {
                    if let Some(path) = dag.walk(src, dst, rng) {
                        if self.is_feasible(&path, topo) {
                            return Some(path);
                        }
                    }
                }
                None
            }
            RoutingMode::Random => route_db
                .paths(src, dst)
                .iter()
                .filter(|p| self.is_feasible(p, topo))
                .collect::<Vec<_>>()
                .choose(rng)
                .map(|p| p.to_vec()),
            RoutingMode::Fe => {
                let feasible: Vec<&Vec<NodeId>> = route_db
                    .paths(src, dst)
                    .iter()
                    .filter(|p| self.is_feasible(p, topo))
                    .collect();
                if feasible.len() <= 1 {
                    return feasible.first().map(|p| p.to_vec());
                }
                feasible
                    .into_iter()
                    .min_by(|a, b| {
                        self.fe_penalty(a, topo)
                            .partial_cmp(&self.fe_penalty(b, topo))
                            .unwrap()
                    })
                    .cloned()
            }
            RoutingMode::KPath | RoutingMode::KPathFe => {
                unreachable!("resolved() maps these away")
            }
        }
    }

    /// Installs `(src_ip, dst_ip)` into every node's table along the flow's path.
    pub fn install_flow_entry(&mut self, flow: &Flow) {
        let key = flow.key();
        for &n in &flow.path {
            self.tables.entry(n).or_default().insert(key);
        }
    }

    /// Evicts the flow's entry from every node on its (current) path, and drops it from
    /// elephant management. The sole path by which an entry is ever removed (SPEC_FULL §9,
    /// resolved open question 2) — no handler reaches into `tables` directly.
    pub fn remove_flow_entry(&mut self, flow: &Flow) {
        let key = flow.key();
        for &n in &flow.path {
            if let Some(t) = self.tables.get_mut(&n) {
                t.remove(&key);
            }
        }
        self.old_eleph.remove(&flow.id);
    }

    /// Moves an already-installed flow to `new_path`, relinking its table entries.
    fn reinstall(&mut self, flow: &mut Flow, new_path: Vec<NodeId>) {
        let key = flow.key();
        for &n in &flow.path {
            if let Some(t) = self.tables.get_mut(&n) {
                t.remove(&key);
            }
        }
        for &n in &new_path {
            self.tables.entry(n).or_default().insert(key);
        }
        flow.path = new_path;
        flow.links = flow.path.windows(2).map(|w| (w[0], w[1])).collect();
        flow.reroute += 1;
    }

    /// Samples and resets every active flow's byte counter, returning the pre-reset
    /// values. Used both by the periodic `CollectCnt` event and as the first step of
    /// [`Controller::reroute`] (SPEC_FULL §4.6 step 1).
    pub fn collect_counters(&self, flows: &mut FxHashMap<FlowId, Flow>) -> FxHashMap<FlowId, Bytes> {
        let mut snapshot = FxHashMap::default();
        for flow in flows.values_mut() {
            if flow.is_active() {
                snapshot.insert(flow.id, flow.cnt);
                flow.cnt = Bytes::ZERO;
            }
        }
        snapshot
    }

    /// Recomputes max-min fair shares considering only flows already under elephant
    /// management (SPEC_FULL §4.6 step 4's `comB`) — a restriction of the allocator core
    /// to a flow subset, with no source-rate caps applied.
    fn comb(&self, flows: &FxHashMap<FlowId, Flow>, topo: &Topology) -> FxHashMap<FlowId, BytesPerSec> {
        let link_caps: FxHashMap<LinkKey, BytesPerSec> = topo
            .links()
            .map(|(a, b, cap)| (canonical_link(a, b), cap))
            .collect();
        let inputs: Vec<FlowInput> = self
            .old_eleph
            .keys()
            .filter_map(|id| {
                let f = flows.get(id)?;
                Some(FlowInput {
                    id: *id,
                    cap: BytesPerSec::MAX,
                    links: f.links.iter().map(|&(a, b)| canonical_link(a, b)).collect(),
                })
            })
            .collect();
        max_min_fair(&inputs, &link_caps)
    }

    fn oab_on_link(
        &self,
        link: LinkKey,
        flows: &FxHashMap<FlowId, Flow>,
        shares: &FxHashMap<FlowId, BytesPerSec>,
        cap: BytesPerSec,
    ) -> f64 {
        let mut on_link: Vec<FlowId> = self
            .old_eleph
            .keys()
            .copied()
            .filter(|id| {
                flows
                    .get(id)
                    .is_some_and(|f| f.links.iter().any(|&(a, b)| canonical_link(a, b) == link))
            })
            .collect();
        on_link.sort_by(|a, b| shares[b].into_u64().cmp(&shares[a].into_u64()));

        let n_old_eleph = self.old_eleph.len();
        let mut tilda: FxHashSet<FlowId> = FxHashSet::default();
        for i in 0..on_link.len().saturating_sub(1) {
            let fl = on_link[i];
            let bw = shares[&fl].into_f64();
            let mut hat_bw = 0.0;
            let mut hat_num = 0usize;
            for &x in &on_link[i + 1..] {
                let bw_x = shares[&x].into_f64();
                if bw_x < bw {
                    hat_bw += bw_x;
                    hat_num += 1;
                }
            }
            let denom = (n_old_eleph - hat_num + 1) as f64;
            if bw >= (cap.into_f64() - hat_bw) / denom {
                tilda.insert(fl);
            }
        }
        let sub_sum: f64 = on_link
            .iter()
            .filter(|fl| !tilda.contains(fl))
            .map(|fl| shares[fl].into_f64())
            .sum();
        (cap.into_f64() - sub_sum) / (tilda.len() + 1) as f64
    }

    fn greedy_on_link(&self, n_flows_on_link: usize, cap: BytesPerSec) -> f64 {
        cap.into_f64() / (n_flows_on_link + 1) as f64
    }

    /// The elephant rerouter. Disabled entirely in `spf` mode or `k_path == 1`, both
    /// degenerate since there is exactly one path to choose from (SPEC_FULL §4.6).
    #[allow(clippy::too_many_arguments)]
    pub fn reroute(
        &mut self,
        flows: &mut FxHashMap<FlowId, Flow>,
        topo: &Topology,
        route_db: &RouteDb,
        routing_mode: RoutingMode,
        k_path: usize,
        n_eleph: usize,
        algo: RerouteAlgo,
        reset_elephant: bool,
    ) -> Vec<FlowId> {
        if routing_mode.resolved() == RoutingMode::Spf || k_path <= 1 {
            return Vec::new();
        }

        let counts = self.collect_counters(flows);
        let mut by_count: Vec<FlowId> = counts.keys().copied().collect();
        by_count.sort_by(|a, b| {
            counts[b]
                .into_u64()
                .cmp(&counts[a].into_u64())
                .then_with(|| a.into_usize().cmp(&b.into_usize()))
        });
        by_count.truncate(n_eleph);

        if reset_elephant {
            self.old_eleph.clear();
        }

        let mut new_eleph: std::collections::VecDeque<FlowId> = by_count
            .into_iter()
            .filter(|id| !self.old_eleph.contains_key(id))
            .collect();

        let mut rerouted = Vec::new();
        while let Some(fid) = new_eleph.pop_front() {
            let shares = self.comb(flows, topo);

            let link_caps: FxHashMap<LinkKey, BytesPerSec> = topo
                .links()
                .map(|(a, b, cap)| (canonical_link(a, b), cap))
                .collect();
            let mut flows_on_link: FxHashMap<LinkKey, usize> = FxHashMap::default();
            for (id, f) in flows.iter() {
                if self.old_eleph.contains_key(id) {
                    for &(a, b) in &f.links {
                        *flows_on_link.entry(canonical_link(a, b)).or_insert(0) += 1;
                    }
                }
            }

            let (src, dst) = {
                let Some(f) = flows.get(&fid) else { continue };
                (f.src_node, f.dst_node)
            };
            let candidates = route_db.paths(src, dst);
            if candidates.is_empty() {
                self.old_eleph.insert(fid, BytesPerSec::ZERO);
                continue;
            }

            let ctrl_ref: &Controller = self;
            let flows_ref: &FxHashMap<FlowId, Flow> = flows;
            let score_path = |path: &[NodeId]| -> f64 {
                let mut best = f64::INFINITY;
                for w in path.windows(2) {
                    let l = canonical_link(w[0], w[1]);
                    let Some(&cap) = link_caps.get(&l) else { continue };
                    let score = match algo {
                        RerouteAlgo::Oab => ctrl_ref.oab_on_link(l, flows_ref, &shares, cap),
                        RerouteAlgo::Greedy => {
                            ctrl_ref.greedy_on_link(*flows_on_link.get(&l).unwrap_or(&0), cap)
                        }
                    };
                    best = best.min(score);
                }
                best
            };

            let mut best_path = &candidates[0];
            let mut best_score = score_path(best_path);
            for path in &candidates[1..] {
                let score = score_path(path);
                if score > best_score {
                    best_path = path;
                    best_score = score;
                }
            }
            let best_path: Vec<NodeId> = best_path.to_vec();

            if let Some(flow) = flows.get_mut(&fid) {
                if flow.path != best_path {
                    self.reinstall(flow, best_path);
                    rerouted.push(fid);
                }
            }
            self.old_eleph.insert(fid, BytesPerSec::ZERO);
        }
        rerouted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::PathDbMode;
    use crate::time::Time;
    use crate::topology::{LinkSpec, NodeSpec, TopologyOverrides};

    fn line_topo() -> Topology {
        let nodes = vec![
            NodeSpec::new("A".into(), 1, 1),
            NodeSpec::new("B".into(), 1, 0),
            NodeSpec::new("C".into(), 1, 1),
        ];
        let links = vec![
            LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(100)),
            LinkSpec::new("B".into(), "C".into(), BytesPerSec::new(100)),
        ];
        Topology::new(&nodes, &links, TopologyOverrides::default()).unwrap()
    }

    #[test]
    fn feasibility_respects_table_size() {
        let topo = line_topo();
        let mut ctrl = Controller::new();
        let a = topo.node_by_name("A").unwrap().id;
        let b = topo.node_by_name("B").unwrap().id;
        let path = vec![a, b];
        assert!(ctrl.is_feasible(&path, &topo));

        let mut flow = Flow::new(
            crate::flow::FlowDesc::builder()
                .id(FlowId::new(0))
                .src_ip(topo.node(a).base_ip)
                .dst_ip(topo.node(topo.node_by_name("C").unwrap().id).base_ip)
                .flow_size(Bytes::new(100))
                .flow_rate(None)
                .arrive_time(Time::ZERO)
                .build(),
            a,
            topo.node_by_name("C").unwrap().id,
        );
        flow.path = path.clone();
        ctrl.install_flow_entry(&flow);
        // A's table_size is 1 and now holds one entry, so any path through A is infeasible.
        assert!(!ctrl.is_feasible(&path, &topo));
    }

    #[test]
    fn remove_then_reinstall_restores_table_counts() {
        let topo = line_topo();
        let mut ctrl = Controller::new();
        let a = topo.node_by_name("A").unwrap().id;
        let b = topo.node_by_name("B").unwrap().id;
        let c = topo.node_by_name("C").unwrap().id;

        let mut flow = Flow::new(
            crate::flow::FlowDesc::builder()
                .id(FlowId::new(0))
                .src_ip(topo.node(a).base_ip)
                .dst_ip(topo.node(c).base_ip)
                .flow_size(Bytes::new(100))
                .flow_rate(None)
                .arrive_time(Time::ZERO)
                .build(),
            a,
            c,
        );
        flow.path = vec![a, b, c];
        ctrl.install_flow_entry(&flow);
        assert_eq!(ctrl.table_usage(a), 1);
        ctrl.remove_flow_entry(&flow);
        assert_eq!(ctrl.table_usage(a), 0);
        assert_eq!(ctrl.table_usage(b), 0);
        assert_eq!(ctrl.table_usage(c), 0);
    }

    #[test]
    fn comb_floors_fractional_shares_instead_of_overcommitting() {
        // A single 11-capacity link with three old elephants: 11/3 = 3.667 must floor to
        // 3 per flow, not round to 4 (which would sum to 12 > 11).
        let nodes = vec![NodeSpec::new("A".into(), 10, 1), NodeSpec::new("B".into(), 10, 1)];
        let links = vec![LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(11))];
        let topo = Topology::new(&nodes, &links, TopologyOverrides::default()).unwrap();
        let a = topo.node_by_name("A").unwrap().id;
        let b = topo.node_by_name("B").unwrap().id;

        let mut ctrl = Controller::new();
        let mut flows = FxHashMap::default();
        for i in 0..3u8 {
            let mut flow = Flow::new(
                crate::flow::FlowDesc::builder()
                    .id(FlowId::new(i as usize))
                    .src_ip(topo.node(a).base_ip)
                    .dst_ip(topo.node(b).base_ip)
                    .flow_size(Bytes::new(1_000))
                    .flow_rate(None)
                    .arrive_time(Time::ZERO)
                    .build(),
                a,
                b,
            );
            flow.path = vec![a, b];
            flow.links = vec![(a, b)];
            flows.insert(flow.id, flow);
            ctrl.old_eleph.insert(FlowId::new(i as usize), BytesPerSec::ZERO);
        }

        let shares = ctrl.comb(&flows, &topo);
        let total: u64 = shares.values().map(|s| s.into_u64()).sum();
        assert!(total <= 11, "comb allocated {total} over an 11-capacity link");
        for share in shares.values() {
            assert_eq!(*share, BytesPerSec::new(3));
        }
    }

    #[test]
    fn spf_mode_disables_rerouting() {
        let topo = line_topo();
        let db = RouteDb::build(&topo, PathDbMode::OneShortest, 1, false);
        let mut ctrl = Controller::new();
        let mut flows = FxHashMap::default();
        let out = ctrl.reroute(
            &mut flows,
            &topo,
            &db,
            RoutingMode::Spf,
            1,
            4,
            RerouteAlgo::Oab,
            false,
        );
        assert!(out.is_empty());
    }
}
