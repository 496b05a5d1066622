//! The route database: precomputed path sets between every ordered pair of switches,
//! built once at startup (SPEC_FULL §4.2). Grounded on
//! `original_source/sim/SimCtrlPathDB.py::setup_path_db`.

mod bfs;
mod ecmp;
mod yen;

pub use ecmp::Dag;

use rustc_hash::FxHashMap;

use crate::topology::{NodeId, Topology};

/// How the path set for each `(src, dst)` pair is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDbMode {
    OneShortest,
    AllShortest,
    KPathYen,
}

/// Precomputed paths between every ordered pair of distinct nodes, plus (when the
/// routing mode needs it) the ECMP DAG derived from the same path sets.
#[derive(Debug, Clone)]
pub struct RouteDb {
    paths: FxHashMap<(NodeId, NodeId), Vec<Vec<NodeId>>>,
    ecmp_dags: Option<FxHashMap<(NodeId, NodeId), Dag>>,
}

impl RouteDb {
    /// Builds the database for every ordered pair of distinct nodes. `need_ecmp_dag`
    /// should be `true` when `routing_mode` is `ecmp` (SPEC_FULL §4.3).
    pub fn build(topo: &Topology, mode: PathDbMode, k_path: usize, need_ecmp_dag: bool) -> Self {
        let adj = bfs::adjacency(topo);
        let ids: Vec<NodeId> = topo.node_ids().collect();

        let mut paths = FxHashMap::default();
        for &src in &ids {
            for &dst in &ids {
                if src == dst {
                    continue;
                }
                let path_set = match mode {
                    PathDbMode::OneShortest => bfs::shortest_path(
                        &adj,
                        src,
                        dst,
                        &Default::default(),
                        &Default::default(),
                    )
                    .into_iter()
                    .collect(),
                    PathDbMode::AllShortest => bfs::all_shortest_paths(&adj, src, dst),
                    PathDbMode::KPathYen => yen::k_shortest_paths(&adj, src, dst, k_path),
                };
                paths.insert((src, dst), path_set);
            }
        }

        let ecmp_dags = need_ecmp_dag.then(|| {
            paths
                .iter()
                .map(|(&pair, path_set)| (pair, Dag::from_paths(path_set.iter())))
                .collect()
        });

        Self { paths, ecmp_dags }
    }

    pub fn paths(&self, src: NodeId, dst: NodeId) -> &[Vec<NodeId>] {
        self.paths.get(&(src, dst)).map_or(&[], Vec::as_slice)
    }

    pub fn ecmp_dag(&self, src: NodeId, dst: NodeId) -> Option<&Dag> {
        self.ecmp_dags.as_ref()?.get(&(src, dst))
    }
}

/// Whether the topology is fully connected, checked once up front so path lookup can
/// never fail at request time (SPEC_FULL §4.2, §7).
pub fn is_fully_connected(topo: &Topology) -> bool {
    bfs::fully_connected(&bfs::adjacency(topo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkSpec, NodeSpec, TopologyOverrides};
    use crate::units::BytesPerSec;

    fn diamond() -> Topology {
        let nodes = vec![
            NodeSpec::new("A".into(), 10, 1),
            NodeSpec::new("B".into(), 10, 0),
            NodeSpec::new("C".into(), 10, 0),
            NodeSpec::new("D".into(), 10, 1),
        ];
        let links = vec![
            LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(10)),
            LinkSpec::new("A".into(), "C".into(), BytesPerSec::new(10)),
            LinkSpec::new("B".into(), "D".into(), BytesPerSec::new(10)),
            LinkSpec::new("C".into(), "D".into(), BytesPerSec::new(10)),
        ];
        Topology::new(&nodes, &links, TopologyOverrides::default()).unwrap()
    }

    #[test]
    fn yen_k_path_finds_both_diamond_paths_and_stops() {
        let topo = diamond();
        let db = RouteDb::build(&topo, PathDbMode::KPathYen, 3, false);
        let a = topo.node_by_name("A").unwrap().id;
        let d = topo.node_by_name("D").unwrap().id;
        assert_eq!(db.paths(a, d).len(), 2);
    }

    #[test]
    fn k_path_one_matches_one_shortest() {
        let topo = diamond();
        let yen = RouteDb::build(&topo, PathDbMode::KPathYen, 1, false);
        let one = RouteDb::build(&topo, PathDbMode::OneShortest, 1, false);
        let a = topo.node_by_name("A").unwrap().id;
        let d = topo.node_by_name("D").unwrap().id;
        assert_eq!(yen.paths(a, d), one.paths(a, d));
    }

    #[test]
    fn ecmp_dag_has_two_next_hops_at_source() {
        let topo = diamond();
        let db = RouteDb::build(&topo, PathDbMode::AllShortest, 1, true);
        let a = topo.node_by_name("A").unwrap().id;
        let d = topo.node_by_name("D").unwrap().id;
        let dag = db.ecmp_dag(a, d).unwrap();
        assert_eq!(dag.next_hops(a).len(), 2);
    }
}
