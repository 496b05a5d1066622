use crate::units::BytesPerSec;

identifier!(NodeId);
identifier!(HostIp);

/// A switch, as supplied by the topology's external caller: one record per row of the
/// `nodes` table.
#[derive(Debug, Clone, derive_new::new)]
pub struct NodeSpec {
    pub name: String,
    pub table_size: u32,
    pub n_hosts: u32,
}

/// A switch in the topology, after validation and host-IP allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub table_size: u32,
    pub n_hosts: u32,
    pub base_ip: HostIp,
    pub end_ip: HostIp,
}

impl Node {
    /// Whether this switch has any attached hosts (i.e. is an edge switch).
    pub fn is_edge(&self) -> bool {
        self.n_hosts > 0
    }

    pub fn owns_ip(&self, ip: HostIp) -> bool {
        ip >= self.base_ip && ip <= self.end_ip
    }
}

/// A link, as supplied by the topology's external caller: one record per row of the
/// `links` table.
#[derive(Debug, Clone, derive_new::new)]
pub struct LinkSpec {
    pub node1: String,
    pub node2: String,
    pub cap: BytesPerSec,
}

/// The edge weight of a link in the topology graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub cap: BytesPerSec,
}

/// Next power of two at or above `n_hosts`, per the host-block sizing rule; zero hosts
/// still reserve a block of size one so no two edge switches' blocks overlap.
pub fn block_size(n_hosts: u32) -> u32 {
    n_hosts.max(1).next_power_of_two()
}
