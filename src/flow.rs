//! The flow record and its lifecycle state machine. Grounded on
//! `original_source/sim/SimFlow.py`: no congestion control, no packets, just the
//! accounting and status fields the controller and allocator operate on.

use crate::time::Time;
use crate::topology::{HostIp, NodeId};
use crate::units::{Bytes, BytesPerSec, Nanosecs};

identifier!(FlowId);

/// The phase of a flow's lifetime, per SPEC_FULL §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derivative::Derivative, serde::Serialize)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    #[derivative(Default)]
    Requesting,
    Active,
    Finished,
    Removed,
}

/// A flow-arrival descriptor, as handed to the simulator by the flow generator.
#[derive(Debug, Clone, Copy, typed_builder::TypedBuilder)]
pub struct FlowDesc {
    pub id: FlowId,
    pub src_ip: HostIp,
    pub dst_ip: HostIp,
    pub flow_size: Bytes,
    /// Source-side rate cap; `None` means unlimited (`flow_rate = +inf`).
    pub flow_rate: Option<BytesPerSec>,
    pub arrive_time: Time,
}

/// Per-flow state and accounting, mirroring the controller's and allocator's view of the
/// flow over its lifetime.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub src_ip: HostIp,
    pub dst_ip: HostIp,
    pub src_node: NodeId,
    pub dst_node: NodeId,

    pub flow_size: Bytes,
    pub flow_rate: Option<BytesPerSec>,
    pub curr_rate: BytesPerSec,
    pub avg_rate: BytesPerSec,

    pub bytes_sent: Bytes,
    pub bytes_left: Bytes,

    pub status: FlowStatus,
    pub arrive_time: Time,
    pub install_time: Option<Time>,
    pub end_time: Option<Time>,
    pub remove_time: Option<Time>,
    pub update_time: Time,
    pub duration: Option<Nanosecs>,

    pub path: Vec<NodeId>,
    pub links: Vec<(NodeId, NodeId)>,

    pub resend: u32,
    pub reroute: u32,

    /// Byte counter since the last controller collection, used by the elephant rerouter.
    pub cnt: Bytes,
    /// Whether this flow has already triggered a zero-rate warning (SPEC_FULL §7).
    pub warned_zero_rate: bool,
}

impl Flow {
    pub fn new(desc: FlowDesc, src_node: NodeId, dst_node: NodeId) -> Self {
        Self {
            id: desc.id,
            src_ip: desc.src_ip,
            dst_ip: desc.dst_ip,
            src_node,
            dst_node,
            flow_size: desc.flow_size,
            flow_rate: desc.flow_rate,
            curr_rate: BytesPerSec::ZERO,
            avg_rate: BytesPerSec::ZERO,
            bytes_sent: Bytes::ZERO,
            bytes_left: desc.flow_size,
            status: FlowStatus::Requesting,
            arrive_time: desc.arrive_time,
            install_time: None,
            end_time: None,
            remove_time: None,
            update_time: desc.arrive_time,
            duration: None,
            path: Vec::new(),
            links: Vec::new(),
            resend: 0,
            reroute: 0,
            cnt: Bytes::ZERO,
            warned_zero_rate: false,
        }
    }

    pub fn key(&self) -> (HostIp, HostIp) {
        (self.src_ip, self.dst_ip)
    }

    pub fn is_active(&self) -> bool {
        self.status == FlowStatus::Active
    }

    /// Advances byte accounting to `now`, given the rate that has applied since
    /// `update_time`. Called by the dispatcher before every handler runs (SPEC_FULL §4.1).
    pub fn advance(&mut self, now: Time) {
        if !self.is_active() || now <= self.update_time {
            return;
        }
        let delta = now - self.update_time;
        let sent = self.curr_rate.width(delta.into_ns());
        let sent = sent.min(self.bytes_left);
        self.bytes_sent = self.bytes_sent.saturating_add(sent);
        self.bytes_left = self.bytes_left.saturating_sub(sent);
        self.cnt = self.cnt.saturating_add(sent);
        self.update_time = now;
    }

    /// Projected completion time at the current rate, or `None` if the flow makes no
    /// progress (`curr_rate == 0`).
    pub fn projected_end(&self, now: Time) -> Option<Time> {
        if !self.is_active() || self.curr_rate == BytesPerSec::ZERO {
            return None;
        }
        Some(now + self.curr_rate.length(self.bytes_left).into_delta())
    }

    pub fn mark_active(&mut self, path: Vec<NodeId>, now: Time) {
        self.path = path;
        self.links = self.path.windows(2).map(|w| (w[0], w[1])).collect();
        self.status = FlowStatus::Active;
        self.install_time = Some(now);
        self.update_time = now;
    }

    pub fn mark_finished(&mut self, now: Time) {
        self.advance(now);
        self.status = FlowStatus::Finished;
        self.bytes_sent = self.flow_size;
        self.bytes_left = Bytes::ZERO;
        self.curr_rate = BytesPerSec::ZERO;
        self.end_time = Some(now);
        let since = self.install_time.unwrap_or(self.arrive_time);
        let dur = now.saturating_sub(since).into_ns();
        self.duration = Some(dur);
        if dur != Nanosecs::ZERO {
            self.avg_rate = BytesPerSec::new(
                (self.flow_size.into_f64() * 1e9 / dur.into_f64()).round() as u64,
            );
        }
    }

    pub fn mark_removed(&mut self, now: Time) {
        self.status = FlowStatus::Removed;
        self.remove_time = Some(now);
    }
}
