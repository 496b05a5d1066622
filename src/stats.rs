//! Output artifacts (SPEC_FULL §6). Column schemas transcribed from
//! `original_source/sim/SimCoreLogging.py` (`col_link_util`, `col_link_flows`,
//! `col_table_util`, `col_flow_stats`).
//!
//! A caller gets the conventional CSV files simply by handing each `Vec` here to a
//! `csv::Writer`; this crate never does that I/O itself.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::controller::{RerouteAlgo, RoutingMode};
use crate::flow::FlowStatus;
use crate::time::Time;
use crate::topology::{HostIp, NodeId};
use crate::units::{Bytes, BytesPerSec, Nanosecs};

/// The five-number summary plus mean/stdev that every periodic row carries, in the
/// column order `col_link_util`/`col_table_util` declare.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Stats5 {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub median: f64,
}

/// Computes [`Stats5`] over `values`. Returns all-zero if `values` is empty (a
/// link-less or node-less topology is rejected at construction, so this only happens
/// for a degenerate single-node run with no links to average).
pub fn stats5(values: &[f64]) -> Stats5 {
    if values.is_empty() {
        return Stats5 { mean: 0.0, stdev: 0.0, min: 0.0, max: 0.0, q1: 0.0, q3: 0.0, median: 0.0 };
    }
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let stdev = variance.sqrt();
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Stats5 {
        mean,
        stdev,
        min: sorted[0],
        max: sorted[n - 1],
        q1: percentile(&sorted, 25.0),
        q3: percentile(&sorted, 75.0),
        median: percentile(&sorted, 50.0),
    }
}

/// Linear-interpolation percentile over an already-sorted slice, matching
/// `numpy.percentile`'s default behavior.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}

/// One `link_util.csv` row: `time, mean, stdev, min, max, q1, q3, median, throughput,
/// <link_id>*`.
#[derive(Debug, Clone, Serialize)]
pub struct LinkUtilRow {
    pub time: Time,
    #[serde(flatten)]
    pub stats: Stats5,
    pub throughput: f64,
    #[serde(flatten)]
    pub per_link: BTreeMap<String, f64>,
}

/// One `link_flows.csv` row: same shape as [`LinkUtilRow`] minus `throughput`, values
/// are active-flow counts per link.
#[derive(Debug, Clone, Serialize)]
pub struct LinkFlowsRow {
    pub time: Time,
    #[serde(flatten)]
    pub stats: Stats5,
    #[serde(flatten)]
    pub per_link: BTreeMap<String, u32>,
}

/// One `table_util.csv` row, per switch per logging tick.
#[derive(Debug, Clone, Serialize)]
pub struct TableUtilRow {
    pub time: Time,
    #[serde(flatten)]
    pub stats: Stats5,
    #[serde(flatten)]
    pub per_node: BTreeMap<String, f64>,
}

/// One `flow_stats.csv` row, per flow. Field order mirrors `col_flow_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct FlowStatsRow {
    pub src_ip: HostIp,
    pub dst_ip: HostIp,
    pub src_node: NodeId,
    pub dst_node: NodeId,
    pub flow_size: Bytes,
    pub bytes_sent: Bytes,
    pub bytes_left: Bytes,
    pub avg_rate: BytesPerSec,
    pub curr_rate: BytesPerSec,
    pub arrive_time: Time,
    pub install_time: Option<Time>,
    pub end_time: Option<Time>,
    pub remove_time: Option<Time>,
    pub update_time: Time,
    pub duration: Option<Nanosecs>,
    pub status: FlowStatus,
    pub resend: u32,
    pub reroute: u32,
}

impl FlowStatsRow {
    pub fn from_flow(flow: &crate::flow::Flow) -> Self {
        Self {
            src_ip: flow.src_ip,
            dst_ip: flow.dst_ip,
            src_node: flow.src_node,
            dst_node: flow.dst_node,
            flow_size: flow.flow_size,
            bytes_sent: flow.bytes_sent,
            bytes_left: flow.bytes_left,
            avg_rate: flow.avg_rate,
            curr_rate: flow.curr_rate,
            arrive_time: flow.arrive_time,
            install_time: flow.install_time,
            end_time: flow.end_time,
            remove_time: flow.remove_time,
            update_time: flow.update_time,
            duration: flow.duration,
            status: flow.status,
            resend: flow.resend,
            reroute: flow.reroute,
        }
    }
}

/// `summary.csv`: one row for the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub routing_mode: RoutingMode,
    pub k_path: usize,
    pub do_reroute: bool,
    pub reroute_algo: RerouteAlgo,
    pub n_flow_arrival: u64,
    pub n_packet_in: u64,
    pub n_reject: u64,
    pub n_flow_end: u64,
    pub n_idle_timeout: u64,
    pub exec_time_secs: f64,
}

/// Everything [`crate::driver::run`] hands back on success.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub link_util: Vec<LinkUtilRow>,
    pub link_flows: Vec<LinkFlowsRow>,
    pub table_util: Vec<TableUtilRow>,
    pub flow_stats: Vec<FlowStatsRow>,
    /// `col_avg_flow_stats`'s trailing row. Kept separate from `flow_stats` rather than
    /// appended to it, since its columns (means, not per-flow values) don't fit the same
    /// row type; a caller who wants one `flow_stats.csv` with a trailing average line
    /// appends it after serializing `flow_stats`.
    pub flow_stats_average: Option<FlowStatsAverage>,
    pub summary: Summary,
}

/// Number of leading rows to drop before averaging, per SPEC_FULL §9 open question 3:
/// `floor(ignore_head * n)`.
pub fn ignore_head_count(ignore_head: f64, n: usize) -> usize {
    (ignore_head * n as f64).floor() as usize
}

/// Appends a trailing "average" [`LinkUtilRow`] computed over `rows[ignore_head_count..]`.
/// `time` on the average row is the last sample's time, tagging the aggregate row with the
/// run's terminal timestamp.
pub fn average_link_util(rows: &[LinkUtilRow], ignore_head: f64) -> Option<LinkUtilRow> {
    let skip = ignore_head_count(ignore_head, rows.len());
    let kept = rows.get(skip..)?;
    if kept.is_empty() {
        return None;
    }
    let time = kept.last()?.time;
    let throughput = kept.iter().map(|r| r.throughput).sum::<f64>() / kept.len() as f64;
    let mut per_link: BTreeMap<String, f64> = BTreeMap::new();
    for key in kept[0].per_link.keys() {
        let avg = kept.iter().filter_map(|r| r.per_link.get(key)).sum::<f64>() / kept.len() as f64;
        per_link.insert(key.clone(), avg);
    }
    let stats = stats5(&kept.iter().map(|r| r.stats.mean).collect::<Vec<_>>());
    Some(LinkUtilRow { time, stats, throughput, per_link })
}

/// Same as [`average_link_util`] but for [`LinkFlowsRow`]'s active-flow-count columns.
pub fn average_link_flows(rows: &[LinkFlowsRow], ignore_head: f64) -> Option<LinkFlowsRow> {
    let skip = ignore_head_count(ignore_head, rows.len());
    let kept = rows.get(skip..)?;
    if kept.is_empty() {
        return None;
    }
    let time = kept.last()?.time;
    let mut per_link: BTreeMap<String, u32> = BTreeMap::new();
    for key in kept[0].per_link.keys() {
        let avg = kept.iter().filter_map(|r| r.per_link.get(key)).sum::<u32>() / kept.len() as u32;
        per_link.insert(key.clone(), avg);
    }
    let stats = stats5(&kept.iter().map(|r| r.stats.mean).collect::<Vec<_>>());
    Some(LinkFlowsRow { time, stats, per_link })
}

/// Same as [`average_link_util`] but for [`TableUtilRow`]'s per-node columns.
pub fn average_table_util(rows: &[TableUtilRow], ignore_head: f64) -> Option<TableUtilRow> {
    let skip = ignore_head_count(ignore_head, rows.len());
    let kept = rows.get(skip..)?;
    if kept.is_empty() {
        return None;
    }
    let time = kept.last()?.time;
    let mut per_node: BTreeMap<String, f64> = BTreeMap::new();
    for key in kept[0].per_node.keys() {
        let avg = kept.iter().filter_map(|r| r.per_node.get(key)).sum::<f64>() / kept.len() as f64;
        per_node.insert(key.clone(), avg);
    }
    let stats = stats5(&kept.iter().map(|r| r.stats.mean).collect::<Vec<_>>());
    Some(TableUtilRow { time, stats, per_node })
}

/// Appends a trailing "average" [`FlowStatsRow`]-shaped summary over
/// `rows[ignore_head_count..]` for `flow_size, avg_rate, resend, reroute, duration`
/// (`col_avg_flow_stats`).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FlowStatsAverage {
    pub flow_size: f64,
    pub avg_rate: f64,
    pub resend: f64,
    pub reroute: f64,
    pub duration: f64,
}

pub fn average_flow_stats(rows: &[FlowStatsRow], ignore_head: f64) -> Option<FlowStatsAverage> {
    let skip = ignore_head_count(ignore_head, rows.len());
    let kept = rows.get(skip..)?;
    if kept.is_empty() {
        return None;
    }
    let n = kept.len() as f64;
    let avg = |f: fn(&FlowStatsRow) -> f64| kept.iter().map(f).sum::<f64>() / n;
    Some(FlowStatsAverage {
        flow_size: avg(|r| r.flow_size.into_f64()),
        avg_rate: avg(|r| r.avg_rate.into_f64()),
        resend: avg(|r| r.resend as f64),
        reroute: avg(|r| r.reroute as f64),
        duration: avg(|r| r.duration.map_or(0.0, |d| d.into_f64())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats5_matches_known_values() {
        let s = stats5(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn ignore_head_floors() {
        assert_eq!(ignore_head_count(0.25, 10), 2);
        assert_eq!(ignore_head_count(0.29, 10), 2);
        assert_eq!(ignore_head_count(0.0, 10), 0);
        assert_eq!(ignore_head_count(1.0, 10), 10);
    }

    #[test]
    fn average_link_util_skips_the_ignored_head() {
        let rows: Vec<LinkUtilRow> = (0..4)
            .map(|i| LinkUtilRow {
                time: Time::new(i as u128),
                stats: stats5(&[i as f64]),
                throughput: i as f64,
                per_link: BTreeMap::from([("A-B".to_string(), i as f64)]),
            })
            .collect();
        let avg = average_link_util(&rows, 0.5).unwrap();
        // rows 2,3 kept: throughput avg = 2.5
        assert_eq!(avg.throughput, 2.5);
        assert_eq!(avg.per_link["A-B"], 2.5);
    }
}
