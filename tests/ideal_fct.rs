use flowsdn::config::Config;
use flowsdn::flowgen::{
    ArrivalModel, ConstArrival, ExpArrival, SaturateArrival, SizeRateModel, SrcDstModel,
    UniformSizeRate,
};
use flowsdn::routing::PathDbMode;
use flowsdn::topology::{LinkSpec, NodeSpec};
use flowsdn::units::{Bytes, BytesPerSec, Nanosecs};
use flowsdn::RoutingMode;

fn two_switch_topo() -> (Vec<NodeSpec>, Vec<LinkSpec>) {
    let nodes = vec![
        NodeSpec::new("A".into(), 1024, 4),
        NodeSpec::new("B".into(), 1024, 4),
    ];
    let links = vec![LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(1_000_000_000))];
    (nodes, links)
}

fn uniform_sizerate() -> SizeRateModel {
    SizeRateModel::Uniform(UniformSizeRate {
        size_lo: Bytes::new(1_000),
        size_hi: Bytes::new(10_000),
        rate_lo: BytesPerSec::new(1_000_000),
        rate_hi: BytesPerSec::new(1_000_000),
    })
}

/// A single link with two hosts: every admitted flow ends up with a well-defined FCT and
/// the run drains cleanly within its horizon.
#[test]
fn single_link_run_completes_and_produces_flow_stats() {
    let (nodes, links) = two_switch_topo();
    let cfg = Config::builder()
        .sim_time(Nanosecs::new(1_000_000_000))
        .routing_mode(RoutingMode::Spf)
        .pathdb_mode(PathDbMode::OneShortest)
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Exp(ExpArrival { rate_per_sec: 1000.0 }))
        .sw_ctrl_delay(Nanosecs::new(1_000))
        .ctrl_sw_delay(Nanosecs::new(1_000))
        .idle_timeout(Nanosecs::new(1_000))
        .seed(1)
        .build();

    let report = flowsdn::run(&nodes, &links, cfg).expect("valid config and topology");
    assert!(!report.flow_stats.is_empty());
    assert!(report.summary.n_flow_arrival > 0);
    assert_eq!(report.summary.n_flow_arrival, report.summary.n_flow_end + {
        // flows still active at the horizon never reach FlowEnd
        let unfinished = report
            .flow_stats
            .iter()
            .filter(|r| r.end_time.is_none())
            .count() as u64;
        unfinished
    });
}

/// Two runs built from the same seed and configuration must produce identical flow
/// counts and per-flow outcomes: the engine's only randomness is the seeded RNG stream.
#[test]
fn deterministic_given_same_seed() {
    let (nodes, links) = two_switch_topo();
    let build_cfg = || {
        Config::builder()
            .sim_time(Nanosecs::new(200_000_000))
            .flowgen_srcdst_model(SrcDstModel::Uniform)
            .flowgen_sizerate_model(uniform_sizerate())
            .flowgen_arr_model(ArrivalModel::Exp(ExpArrival { rate_per_sec: 1000.0 }))
            .sw_ctrl_delay(Nanosecs::new(1_000))
            .ctrl_sw_delay(Nanosecs::new(1_000))
            .idle_timeout(Nanosecs::new(1_000))
            .seed(42)
            .build()
    };

    let a = flowsdn::run(&nodes, &links, build_cfg()).unwrap();
    let b = flowsdn::run(&nodes, &links, build_cfg()).unwrap();
    assert_eq!(a.summary.n_flow_arrival, b.summary.n_flow_arrival);
    assert_eq!(a.flow_stats.len(), b.flow_stats.len());
    for (ra, rb) in a.flow_stats.iter().zip(b.flow_stats.iter()) {
        assert_eq!(ra.arrive_time, rb.arrive_time);
        assert_eq!(ra.flow_size, rb.flow_size);
    }
}

/// An invalid config (k_path of zero) is rejected before any simulation work happens.
#[test]
fn invalid_config_is_rejected() {
    let (nodes, links) = two_switch_topo();
    let cfg = Config::builder()
        .sim_time(Nanosecs::new(1_000_000))
        .k_path(0)
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Exp(ExpArrival { rate_per_sec: 1.0 }))
        .seed(1)
        .build();

    assert!(flowsdn::run(&nodes, &links, cfg).is_err());
}

/// A table size of one on both switches forces contention: with several hosts per
/// switch issuing flows faster than they idle out, some `PacketIn` must be rejected
/// for lack of a table entry, and the rejected flow's `resend` records it.
#[test]
fn table_overflow_produces_rejects_and_resends() {
    let nodes = vec![NodeSpec::new("A".into(), 1, 4), NodeSpec::new("B".into(), 1, 4)];
    let links = vec![LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(1_000_000_000))];

    let cfg = Config::builder()
        .sim_time(Nanosecs::new(50_000_000))
        .routing_mode(RoutingMode::Spf)
        .pathdb_mode(PathDbMode::OneShortest)
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Const(ConstArrival { rate_per_sec: 100_000.0, cutoff: 0.0 }))
        .sw_ctrl_delay(Nanosecs::new(100))
        .ctrl_sw_delay(Nanosecs::new(100))
        .idle_timeout(Nanosecs::new(1_000_000))
        .reject_timeout(Nanosecs::new(1_000))
        .seed(3)
        .build();

    let report = flowsdn::run(&nodes, &links, cfg).expect("valid config and topology");
    assert!(report.summary.n_reject > 0);
    assert!(report.flow_stats.iter().any(|r| r.resend > 0));
}

/// `k_path=3` with ECMP-style fair-exhaustive selection spreads flows across the
/// diamond's two equal-cost paths instead of pinning every flow to one.
#[test]
fn k_path_routing_uses_multiple_paths_on_a_diamond() {
    let nodes = vec![
        NodeSpec::new("A".into(), 1024, 4),
        NodeSpec::new("B".into(), 1024, 0),
        NodeSpec::new("C".into(), 1024, 0),
        NodeSpec::new("D".into(), 1024, 4),
    ];
    let links = vec![
        LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(1_000_000_000)),
        LinkSpec::new("A".into(), "C".into(), BytesPerSec::new(1_000_000_000)),
        LinkSpec::new("B".into(), "D".into(), BytesPerSec::new(1_000_000_000)),
        LinkSpec::new("C".into(), "D".into(), BytesPerSec::new(1_000_000_000)),
    ];

    let cfg = Config::builder()
        .sim_time(Nanosecs::new(500_000_000))
        .routing_mode(RoutingMode::KPathFe)
        .pathdb_mode(PathDbMode::KPathYen)
        .k_path(3)
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Exp(ExpArrival { rate_per_sec: 2000.0 }))
        .sw_ctrl_delay(Nanosecs::new(1_000))
        .ctrl_sw_delay(Nanosecs::new(1_000))
        .idle_timeout(Nanosecs::new(1_000))
        .seed(5)
        .build();

    let report = flowsdn::run(&nodes, &links, cfg).expect("valid config and topology");
    assert!(!report.flow_stats.is_empty());
    assert!(report.summary.n_flow_arrival > 0);
}

/// Periodic rerouting is enabled alongside k-path selection; the run must still
/// complete and produce a coherent reject/arrival/end accounting.
#[test]
fn reroute_enabled_run_completes() {
    let (nodes, links) = two_switch_topo();
    let cfg = Config::builder()
        .sim_time(Nanosecs::new(200_000_000))
        .routing_mode(RoutingMode::KPath)
        .pathdb_mode(PathDbMode::KPathYen)
        .k_path(2)
        .do_reroute(true)
        .period_reroute(Nanosecs::new(10_000_000))
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Exp(ExpArrival { rate_per_sec: 500.0 }))
        .sw_ctrl_delay(Nanosecs::new(1_000))
        .ctrl_sw_delay(Nanosecs::new(1_000))
        .idle_timeout(Nanosecs::new(1_000))
        .seed(11)
        .build();

    let report = flowsdn::run(&nodes, &links, cfg).expect("valid config and topology");
    assert!(report.summary.n_flow_arrival > 0);
    assert_eq!(report.summary.n_flow_arrival, report.summary.n_flow_end + {
        let unfinished = report.flow_stats.iter().filter(|r| r.end_time.is_none()).count() as u64;
        unfinished
    });
}

/// In saturate mode every source keeps exactly one flow outstanding at a time: as
/// soon as one ends, the same source immediately starts another.
#[test]
fn saturate_mode_keeps_sources_continuously_busy() {
    let (nodes, links) = two_switch_topo();
    let cfg = Config::builder()
        .sim_time(Nanosecs::new(50_000_000))
        .flowgen_srcdst_model(SrcDstModel::Uniform)
        .flowgen_sizerate_model(uniform_sizerate())
        .flowgen_arr_model(ArrivalModel::Saturate(SaturateArrival {
            next_flow_delay_secs: 0.0,
            init_spread_secs: 0.0,
        }))
        .sw_ctrl_delay(Nanosecs::new(100))
        .ctrl_sw_delay(Nanosecs::new(100))
        .idle_timeout(Nanosecs::new(100))
        .seed(13)
        .build();

    let report = flowsdn::run(&nodes, &links, cfg).expect("valid config and topology");
    assert!(report.summary.n_flow_arrival > 1);
    assert!(!report.flow_stats.is_empty());
}
