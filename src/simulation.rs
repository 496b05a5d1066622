//! The event-driven core: dispatch loop, flow lifecycle handlers, and periodic
//! logging/reroute/collection events. Grounded on
//! `original_source/sim/SimCore.py::main_course` for sequencing.

pub(crate) mod event;
mod schedule;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::allocator::{canonical_link, recompute, LinkKey};
use crate::config::ValidatedConfig;
use crate::controller::{Controller, RerouteAlgo, RoutingMode};
use crate::flow::{Flow, FlowDesc, FlowId};
use crate::flowgen::{FlowArrival, FlowGenerator};
use crate::routing::RouteDb;
use crate::stats::{
    average_flow_stats, average_link_flows, average_link_util, average_table_util, stats5,
    FlowStatsRow, LinkFlowsRow, LinkUtilRow, Report, Summary, TableUtilRow,
};
use crate::time::Time;
use crate::topology::{HostIp, NodeId, Topology};
use crate::units::{Bytes, BytesPerSec};

use self::{event::Event, schedule::Schedule};

/// A fresh flow request, not yet assigned a [`FlowId`]. Carries exactly what
/// [`FlowGenerator`] produces; `arrive_time` is always the event's own dispatch time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowArrivalCmd {
    src_ip: HostIp,
    dst_ip: HostIp,
    flow_size: Bytes,
    flow_rate: Option<BytesPerSec>,
}

impl From<FlowArrival> for FlowArrivalCmd {
    fn from(a: FlowArrival) -> Self {
        Self { src_ip: a.src_ip, dst_ip: a.dst_ip, flow_size: a.flow_size, flow_rate: a.flow_rate }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Command {
    FlowArrival(FlowArrivalCmd),
    PacketIn(FlowId),
    FlowInstall { flow_id: FlowId, path: Vec<NodeId> },
    FlowEnd(FlowId),
    IdleTimeout(FlowId),
    CollectCnt,
    Reroute,
    LogLinkUtil,
    LogTableUtil,
    Test,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    n_flow_arrival: u64,
    n_packet_in: u64,
    n_reject: u64,
    n_flow_end: u64,
    n_idle_timeout: u64,
}

#[derive(Debug, typed_builder::TypedBuilder)]
pub(crate) struct Simulation {
    topo: Topology,
    route_db: RouteDb,
    #[builder(default)]
    controller: Controller,
    flowgen: FlowGenerator,
    rng: StdRng,
    cfg: ValidatedConfig,

    #[builder(default, setter(skip))]
    cur_time: Time,
    #[builder(default, setter(skip))]
    schedule: Schedule,
    #[builder(default, setter(skip))]
    flows: FxHashMap<FlowId, Flow>,
    #[builder(default, setter(skip))]
    next_flow_id: usize,
    #[builder(default, setter(skip))]
    occupied: FxHashSet<(HostIp, HostIp)>,
    /// The dual-clock side channel: the earliest projected flow completion across every
    /// `Active` flow, refreshed by [`Simulation::recompute_allocator`] (SPEC_FULL §9).
    #[builder(default, setter(skip))]
    next_end: Option<(FlowId, Time)>,
    #[builder(default, setter(skip))]
    counters: Counters,

    #[builder(default, setter(skip))]
    flow_stats: Vec<FlowStatsRow>,
    #[builder(default, setter(skip))]
    link_util_rows: Vec<LinkUtilRow>,
    #[builder(default, setter(skip))]
    link_flows_rows: Vec<LinkFlowsRow>,
    #[builder(default, setter(skip))]
    table_util_rows: Vec<TableUtilRow>,
}

impl Simulation {
    pub(crate) fn run(mut self) -> Report {
        self.seed_initial_flows();
        self.schedule_periodic_events();

        let horizon = self.cfg.sim_time.into_time();
        while let Some(t) = self.peek_next_time() {
            if t > horizon {
                break;
            }
            self.step();
        }

        self.finish(horizon)
    }

    fn seed_initial_flows(&mut self) {
        let seeded = self.flowgen.initial_flows(&mut self.rng, &self.topo);
        for (time, arrival) in seeded {
            self.schedule.push(Event::new(time, Command::FlowArrival(arrival.into())));
        }
    }

    fn schedule_periodic_events(&mut self) {
        if (self.cfg.log_link_util || self.cfg.log_link_flows) && self.cfg.period_logging != crate::units::Nanosecs::ZERO {
            self.schedule.push(Event::new(self.cfg.period_logging.into_time(), Command::LogLinkUtil));
        }
        if self.cfg.log_table_util && self.cfg.period_logging != crate::units::Nanosecs::ZERO {
            self.schedule.push(Event::new(self.cfg.period_logging.into_time(), Command::LogTableUtil));
        }
        if self.cfg.period_collect != crate::units::Nanosecs::ZERO {
            self.schedule.push(Event::new(self.cfg.period_collect.into_time(), Command::CollectCnt));
        }
        if self.cfg.do_reroute && self.cfg.period_reroute != crate::units::Nanosecs::ZERO {
            self.schedule.push(Event::new(self.cfg.period_reroute.into_time(), Command::Reroute));
        }
    }

    /// The time of whichever of (heap head, `next_end` side channel) would be dispatched
    /// next, without consuming either. `None` only when both are empty, which cannot
    /// happen mid-run (SPEC_FULL §4.1) but does happen once the run is fully drained.
    fn peek_next_time(&self) -> Option<Time> {
        let heap_t = self.schedule.peek().map(Event::time);
        let end_t = self.next_end.map(|(_, t)| t);
        match (heap_t, end_t) {
            (Some(h), Some(e)) => Some(h.min(e)),
            (Some(h), None) => Some(h),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    fn step(&mut self) {
        let (time, cmd) = self.next_dispatch();
        assert!(self.cur_time <= time);
        self.cur_time = time;
        self.advance_active_flows(time);
        self.apply(cmd);
    }

    /// Chooses between the heap's head and a synthesized `FlowEnd` per SPEC_FULL §4.1: the
    /// side channel wins on a tie, since it represents a completion that has already
    /// happened at exactly this instant.
    fn next_dispatch(&mut self) -> (Time, Command) {
        let heap_t = self.schedule.peek().map(Event::time);
        match (heap_t, self.next_end) {
            (Some(h), Some((fid, e))) if e <= h => (e, Command::FlowEnd(fid)),
            (None, Some((fid, e))) => (e, Command::FlowEnd(fid)),
            _ => {
                let ev = self.schedule.pop().expect("no pending event and no projected completion");
                (ev.time(), ev.cmd)
            }
        }
    }

    fn advance_active_flows(&mut self, now: Time) {
        for flow in self.flows.values_mut() {
            flow.advance(now);
        }
    }

    fn recompute_allocator(&mut self) {
        self.next_end = recompute(&mut self.flows, &self.topo, self.cfg.src_limited, self.cur_time);
    }

    fn next_flow_id(&mut self) -> FlowId {
        let id = FlowId::new(self.next_flow_id);
        self.next_flow_id += 1;
        id
    }
}

// Command handlers (SPEC_FULL §4.4)
impl Simulation {
    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::FlowArrival(cmd) => self.apply_flow_arrival(cmd),
            Command::PacketIn(flow_id) => self.apply_packet_in(flow_id),
            Command::FlowInstall { flow_id, path } => self.apply_flow_install(flow_id, path),
            Command::FlowEnd(flow_id) => self.apply_flow_end(flow_id),
            Command::IdleTimeout(flow_id) => self.apply_idle_timeout(flow_id),
            Command::CollectCnt => self.apply_collect_cnt(),
            Command::Reroute => self.apply_reroute(),
            Command::LogLinkUtil => self.apply_log_link_util(),
            Command::LogTableUtil => self.apply_log_table_util(),
            Command::Test => unreachable!(),
        }
    }

    fn apply_flow_arrival(&mut self, cmd: FlowArrivalCmd) {
        let Some(src_node) = self.topo.edge_switch_of(cmd.src_ip) else { return };
        let Some(dst_node) = self.topo.edge_switch_of(cmd.dst_ip) else { return };

        let id = self.next_flow_id();
        let desc = FlowDesc::builder()
            .id(id)
            .src_ip(cmd.src_ip)
            .dst_ip(cmd.dst_ip)
            .flow_size(cmd.flow_size)
            .flow_rate(cmd.flow_rate)
            .arrive_time(self.cur_time)
            .build();
        let flow = Flow::new(desc, src_node, dst_node);
        self.occupied.insert(flow.key());
        self.flows.insert(id, flow);
        self.counters.n_flow_arrival += 1;

        self.schedule.push(Event::new(
            self.cur_time + self.cfg.sw_ctrl_delay.into_delta(),
            Command::PacketIn(id),
        ));

        if !self.flowgen.is_saturate() {
            let (time, arrival) =
                self.flowgen.next_non_saturate_arrival(&mut self.rng, &self.topo, &self.occupied, self.cur_time);
            self.schedule.push(Event::new(time, Command::FlowArrival(arrival.into())));
        }
    }

    fn apply_packet_in(&mut self, flow_id: FlowId) {
        let Some(flow) = self.flows.get(&flow_id) else { return };
        let (src, dst) = (flow.src_node, flow.dst_node);
        self.counters.n_packet_in += 1;

        let path = self.controller.select_path(
            self.cfg.routing_mode,
            &self.route_db,
            &self.topo,
            src,
            dst,
            &mut self.rng,
        );
        match path {
            Some(path) => {
                self.schedule.push(Event::new(
                    self.cur_time + self.cfg.ctrl_sw_delay.into_delta(),
                    Command::FlowInstall { flow_id, path },
                ));
            }
            None => self.reject(flow_id),
        }
    }

    /// Table overflow and no-feasible-path both reject the same way (SPEC_FULL §4.3, §7).
    fn reject(&mut self, flow_id: FlowId) {
        self.counters.n_reject += 1;
        if let Some(flow) = self.flows.get_mut(&flow_id) {
            flow.resend += 1;
            log::debug!("flow {} rejected, resend={}", flow_id, flow.resend);
        }
        let delay = self.cfg.reject_timeout.into_delta() + self.cfg.sw_ctrl_delay.into_delta();
        self.schedule.push(Event::new(self.cur_time + delay, Command::PacketIn(flow_id)));
    }

    fn apply_flow_install(&mut self, flow_id: FlowId, path: Vec<NodeId>) {
        if !self.controller.is_feasible(&path, &self.topo) {
            self.reject(flow_id);
            return;
        }
        if let Some(flow) = self.flows.get_mut(&flow_id) {
            flow.mark_active(path, self.cur_time);
        }
        if let Some(flow) = self.flows.get(&flow_id) {
            self.controller.install_flow_entry(flow);
        }
        self.recompute_allocator();
    }

    fn apply_flow_end(&mut self, flow_id: FlowId) {
        let Some(flow) = self.flows.get_mut(&flow_id) else { return };
        flow.mark_finished(self.cur_time);
        let src_ip = flow.src_ip;
        self.counters.n_flow_end += 1;

        self.schedule.push(Event::new(
            self.cur_time + self.cfg.idle_timeout.into_delta(),
            Command::IdleTimeout(flow_id),
        ));
        self.recompute_allocator();

        if self.flowgen.is_saturate() {
            let (time, arrival) = self.flowgen.next_saturate_arrival(
                &mut self.rng,
                &self.topo,
                &self.occupied,
                self.cur_time,
                src_ip,
            );
            self.schedule.push(Event::new(time, Command::FlowArrival(arrival.into())));
        }
    }

    fn apply_idle_timeout(&mut self, flow_id: FlowId) {
        let Some(mut flow) = self.flows.remove(&flow_id) else { return };
        flow.mark_removed(self.cur_time);
        self.controller.remove_flow_entry(&flow);
        self.occupied.remove(&flow.key());
        self.counters.n_idle_timeout += 1;
        self.flow_stats.push(FlowStatsRow::from_flow(&flow));
    }

    fn apply_collect_cnt(&mut self) {
        self.controller.collect_counters(&mut self.flows);
        self.schedule.push(Event::new(
            self.cur_time + self.cfg.period_collect.into_delta(),
            Command::CollectCnt,
        ));
    }

    fn apply_reroute(&mut self) {
        let rerouted = self.controller.reroute(
            &mut self.flows,
            &self.topo,
            &self.route_db,
            self.cfg.routing_mode,
            self.cfg.k_path,
            self.cfg.n_eleph_flows,
            self.cfg.reroute_algo,
            self.cfg.reset_elephant,
        );
        if !rerouted.is_empty() {
            self.recompute_allocator();
        }
        self.schedule.push(Event::new(
            self.cur_time + self.cfg.period_reroute.into_delta(),
            Command::Reroute,
        ));
    }

    /// Snapshot of every active flow's current rate, grouped by canonical link, used by
    /// both logging handlers below.
    fn link_usage(&self) -> FxHashMap<LinkKey, (u64, u32)> {
        let mut usage: FxHashMap<LinkKey, (u64, u32)> = FxHashMap::default();
        for flow in self.flows.values().filter(|f| f.is_active()) {
            for &(a, b) in &flow.links {
                let entry = usage.entry(canonical_link(a, b)).or_insert((0, 0));
                entry.0 += flow.curr_rate.into_u64();
                entry.1 += 1;
            }
        }
        usage
    }

    fn link_label(&self, link: LinkKey) -> String {
        format!("{}-{}", self.topo.node(link.0).name, self.topo.node(link.1).name)
    }

    fn apply_log_link_util(&mut self) {
        let usage = self.link_usage();
        let mut utils = Vec::new();
        let mut per_link_util: BTreeMap<String, f64> = BTreeMap::new();
        let mut per_link_flows: BTreeMap<String, u32> = BTreeMap::new();
        let mut total_rate = 0u64;

        for (a, b, cap) in self.topo.links() {
            let link = canonical_link(a, b);
            let (rate, count) = usage.get(&link).copied().unwrap_or((0, 0));
            let frac = rate as f64 / cap.into_f64();
            utils.push(frac);
            total_rate += rate;
            let label = self.link_label(link);
            per_link_util.insert(label.clone(), frac);
            per_link_flows.insert(label, count);
        }

        if self.cfg.log_link_util {
            let total_cap: f64 = self.topo.links().map(|(_, _, c)| c.into_f64()).sum();
            let throughput = if total_cap > 0.0 { total_rate as f64 / total_cap } else { 0.0 };
            self.link_util_rows.push(LinkUtilRow {
                time: self.cur_time,
                stats: stats5(&utils),
                throughput,
                per_link: per_link_util,
            });
        }
        if self.cfg.log_link_flows {
            let counts: Vec<f64> = per_link_flows.values().map(|&c| c as f64).collect();
            self.link_flows_rows.push(LinkFlowsRow {
                time: self.cur_time,
                stats: stats5(&counts),
                per_link: per_link_flows,
            });
        }

        self.schedule.push(Event::new(
            self.cur_time + self.cfg.period_logging.into_delta(),
            Command::LogLinkUtil,
        ));
    }

    fn apply_log_table_util(&mut self) {
        if self.cfg.log_table_util {
            let mut fracs = Vec::new();
            let mut per_node = BTreeMap::new();
            for node in self.topo.nodes() {
                let frac = self.controller.table_usage(node.id) as f64 / node.table_size as f64;
                fracs.push(frac);
                per_node.insert(node.name.clone(), frac);
            }
            self.table_util_rows.push(TableUtilRow {
                time: self.cur_time,
                stats: stats5(&fracs),
                per_node,
            });
        }
        self.schedule.push(Event::new(
            self.cur_time + self.cfg.period_logging.into_delta(),
            Command::LogTableUtil,
        ));
    }

    /// Advances every remaining flow to `horizon`, emits its record, and assembles the
    /// final `Report` (SPEC_FULL §4.1's "final pass", §6).
    fn finish(mut self, horizon: Time) -> Report {
        let remaining: Vec<FlowId> = self.flows.keys().copied().collect();
        for id in remaining {
            if let Some(flow) = self.flows.get_mut(&id) {
                flow.advance(horizon);
            }
        }
        let mut flow_stats = std::mem::take(&mut self.flow_stats);
        flow_stats.extend(self.flows.values().map(FlowStatsRow::from_flow));
        flow_stats.sort_by_key(|r| r.arrive_time);
        let flow_stats_average = average_flow_stats(&flow_stats, self.cfg.ignore_head);

        let mut link_util = self.link_util_rows;
        if let Some(avg) = average_link_util(&link_util, self.cfg.ignore_head) {
            link_util.push(avg);
        }
        let mut link_flows = self.link_flows_rows;
        if let Some(avg) = average_link_flows(&link_flows, self.cfg.ignore_head) {
            link_flows.push(avg);
        }
        let mut table_util = self.table_util_rows;
        if let Some(avg) = average_table_util(&table_util, self.cfg.ignore_head) {
            table_util.push(avg);
        }

        Report {
            link_util,
            link_flows,
            table_util,
            flow_stats,
            flow_stats_average,
            summary: Summary {
                routing_mode: self.cfg.routing_mode,
                k_path: self.cfg.k_path,
                do_reroute: self.cfg.do_reroute,
                reroute_algo: self.cfg.reroute_algo,
                n_flow_arrival: self.counters.n_flow_arrival,
                n_packet_in: self.counters.n_packet_in,
                n_reject: self.counters.n_reject,
                n_flow_end: self.counters.n_flow_end,
                n_idle_timeout: self.counters.n_idle_timeout,
                exec_time_secs: 0.0,
            },
        }
    }
}
