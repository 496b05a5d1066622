//! The switch/link graph: validated once at startup, immutable for the life of a run.

mod node;

pub use node::{block_size, HostIp, Link, LinkSpec, Node, NodeId, NodeSpec};

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use rustc_hash::FxHashMap;

use crate::units::BytesPerSec;

/// The IP a host block allocation starts from: `10.0.0.1`.
const BASE_IP: usize = 0x0A_00_00_01;

/// Global overrides applied to every node/link record at topology-build time, mirroring
/// `override_table_size`/`table_size_per_switch`/`override_n_hosts`/`n_hosts_per_switch`/
/// `override_cap`/`cap_per_link` in `Config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyOverrides {
    pub table_size: Option<u32>,
    pub n_hosts: Option<u32>,
    pub cap: Option<BytesPerSec>,
}

/// A validated, immutable network topology.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<Node, Link>,
    id2idx: FxHashMap<NodeId, NodeIndex>,
    name2id: FxHashMap<String, NodeId>,
    host2node: FxHashMap<HostIp, NodeId>,
}

impl Topology {
    /// Validates and builds a topology from caller-supplied node/link records.
    ///
    /// Correctness properties (SPEC_FULL §7, §2):
    /// - every node has a unique name
    /// - no link is a self-loop
    /// - every link references only declared nodes
    /// - no two links share the same endpoint pair
    /// - every link has a positive capacity
    /// - the node set is fully connected (no pair is unreachable from another)
    pub fn new(
        nodes: &[NodeSpec],
        links: &[LinkSpec],
        overrides: TopologyOverrides,
    ) -> Result<Self, TopologyError> {
        let mut graph = UnGraph::new_undirected();
        let mut id2idx = FxHashMap::default();
        let mut name2id = FxHashMap::default();

        let mut base_ip = BASE_IP;
        for (i, spec) in nodes.iter().enumerate() {
            if name2id.contains_key(&spec.name) {
                return Err(TopologyError::DuplicateNode(spec.name.clone()));
            }
            let id = NodeId::new(i);
            let n_hosts = overrides.n_hosts.unwrap_or(spec.n_hosts);
            let table_size = overrides.table_size.unwrap_or(spec.table_size);
            let size = block_size(n_hosts) as usize;
            let node = Node {
                id,
                name: spec.name.clone(),
                table_size,
                n_hosts,
                base_ip: HostIp::new(base_ip),
                end_ip: HostIp::new(base_ip + size - 1),
            };
            base_ip += size;
            let idx = graph.add_node(node);
            id2idx.insert(id, idx);
            name2id.insert(spec.name.clone(), id);
        }

        let idx_of = |name: &str| -> Result<NodeIndex, TopologyError> {
            let id = name2id
                .get(name)
                .ok_or_else(|| TopologyError::UndeclaredNode(name.to_string()))?;
            Ok(id2idx[id])
        };

        for spec in links {
            if spec.node1 == spec.node2 {
                return Err(TopologyError::SelfLoop(spec.node1.clone()));
            }
            let a = idx_of(&spec.node1)?;
            let b = idx_of(&spec.node2)?;
            if graph.find_edge(a, b).is_some() {
                return Err(TopologyError::DuplicateLink(
                    spec.node1.clone(),
                    spec.node2.clone(),
                ));
            }
            let cap = overrides.cap.unwrap_or(spec.cap);
            if cap == BytesPerSec::ZERO {
                return Err(TopologyError::NonPositiveCapacity(
                    spec.node1.clone(),
                    spec.node2.clone(),
                ));
            }
            graph.add_edge(a, b, Link { cap });
        }

        if nodes.len() > 1 && connected_components(&graph) != 1 {
            return Err(TopologyError::Disconnected);
        }

        let mut host2node = FxHashMap::default();
        for node in graph.node_weights() {
            let mut ip = node.base_ip;
            while ip <= node.end_ip {
                host2node.insert(ip, node.id);
                ip = HostIp::new(ip.into_usize() + 1);
            }
        }

        Ok(Self {
            graph,
            id2idx,
            name2id,
            host2node,
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[self.id2idx[&id]]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.name2id.get(name).map(|id| self.node(*id))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn edge_switch_of(&self, ip: HostIp) -> Option<NodeId> {
        self.host2node.get(&ip).copied()
    }

    /// The capacity of the link between `a` and `b`, if one exists (order-independent).
    pub fn link_cap(&self, a: NodeId, b: NodeId) -> Option<BytesPerSec> {
        let (ia, ib) = (self.id2idx[&a], self.id2idx[&b]);
        let e = self.graph.find_edge(ia, ib)?;
        Some(self.graph[e].cap)
    }

    /// Neighbors of `a` in no particular order.
    pub fn neighbors(&self, a: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors(self.id2idx[&a])
    }

    pub(crate) fn graph(&self) -> &UnGraph<Node, Link> {
        &self.graph
    }

    pub(crate) fn idx_of(&self, id: NodeId) -> NodeIndex {
        self.id2idx[&id]
    }

    /// All links as `(a, b, cap)` triples, each undirected pair reported once.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId, BytesPerSec)> + '_ {
        self.graph.edge_indices().map(move |e| {
            let (ia, ib) = self.graph.edge_endpoints(e).unwrap();
            (self.graph[ia].id, self.graph[ib].id, self.graph[e].cap)
        })
    }
}

/// Reasons a topology specification is invalid, each fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("duplicate node name {0:?}")]
    DuplicateNode(String),

    #[error("link from {0:?} to itself")]
    SelfLoop(String),

    #[error("link references undeclared node {0:?}")]
    UndeclaredNode(String),

    #[error("duplicate link between {0:?} and {1:?}")]
    DuplicateLink(String, String),

    #[error("link between {0:?} and {1:?} has non-positive capacity")]
    NonPositiveCapacity(String, String),

    #[error("topology is disconnected")]
    Disconnected,
}
