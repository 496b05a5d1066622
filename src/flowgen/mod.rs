//! The flow generator (SPEC_FULL §4.7): source/destination models, size/rate models,
//! and arrival regimes, all drawn from the single RNG stream the top-level `Simulation`
//! owns. Grounded on `original_source/sim/SimFlowGen.py`.

mod gravity;
mod sizerate;

pub use gravity::SrcDstModel;
pub use sizerate::{BimodalSizeRate, LognormalSizeRate, SizeRateModel, UniformSizeRate};

use rand::Rng;
use rustc_hash::FxHashSet;

use crate::time::{Delta, Time};
use crate::topology::{HostIp, Topology};
use crate::units::{Bytes, BytesPerSec, Nanosecs};
use gravity::GravityTable;

/// A freshly generated flow, not yet known to the controller or allocator.
#[derive(Debug, Clone, Copy)]
pub struct FlowArrival {
    pub src_ip: HostIp,
    pub dst_ip: HostIp,
    pub flow_size: Bytes,
    pub flow_rate: Option<BytesPerSec>,
}

#[derive(Debug, Clone, Copy)]
pub struct SaturateArrival {
    pub next_flow_delay_secs: f64,
    pub init_spread_secs: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ConstArrival {
    pub rate_per_sec: f64,
    pub cutoff: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpArrival {
    pub rate_per_sec: f64,
}

/// How successive flow arrivals are spaced in time.
#[derive(Debug, Clone, Copy)]
pub enum ArrivalModel {
    Saturate(SaturateArrival),
    Const(ConstArrival),
    Exp(ExpArrival),
}

fn secs_to_delta(secs: f64) -> Delta {
    Nanosecs::new((secs * 1e9).round().max(0.0) as u64).into_delta()
}

/// Owns the models but none of the RNG state: every draw takes `&mut impl Rng` so the
/// whole run shares one deterministic stream (SPEC_FULL §4.7, §5).
#[derive(Debug, Clone)]
pub struct FlowGenerator {
    srcdst_model: SrcDstModel,
    sizerate_model: SizeRateModel,
    arrival_model: ArrivalModel,
    /// Every real host IP in the topology (excludes power-of-two block padding),
    /// sorted for deterministic iteration order.
    hosts: Vec<HostIp>,
    gravity: Option<GravityTable>,
}

impl FlowGenerator {
    pub fn new(
        topo: &Topology,
        srcdst_model: SrcDstModel,
        sizerate_model: SizeRateModel,
        arrival_model: ArrivalModel,
    ) -> Self {
        let mut hosts: Vec<HostIp> = topo
            .nodes()
            .filter(|n| n.is_edge())
            .flat_map(|n| {
                let base = n.base_ip.into_usize();
                (0..n.n_hosts as usize).map(move |i| HostIp::new(base + i))
            })
            .collect();
        hosts.sort();

        let gravity = matches!(srcdst_model, SrcDstModel::Gravity | SrcDstModel::Antigravity)
            .then(|| GravityTable::build(topo, srcdst_model));

        Self {
            srcdst_model,
            sizerate_model,
            arrival_model,
            hosts,
            gravity,
        }
    }

    pub fn hosts(&self) -> &[HostIp] {
        &self.hosts
    }

    /// Whether this generator's arrival model is `saturate` (the simulation's
    /// `FlowEnd` handler, not `FlowArrival`, is responsible for the next arrival).
    pub fn is_saturate(&self) -> bool {
        matches!(self.arrival_model, ArrivalModel::Saturate(_))
    }

    /// Dispatches to whichever of [`Self::next_const_arrival`]/[`Self::next_exp_arrival`]
    /// matches the configured model. Panics on `saturate`, which needs a fixed source host
    /// and goes through [`Self::next_saturate_arrival`] instead.
    pub fn next_non_saturate_arrival(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
        now: Time,
    ) -> (Time, FlowArrival) {
        match &self.arrival_model {
            ArrivalModel::Const(_) => self.next_const_arrival(rng, topo, active, now),
            ArrivalModel::Exp(_) => self.next_exp_arrival(rng, topo, active, now),
            ArrivalModel::Saturate(_) => {
                panic!("next_non_saturate_arrival called with a saturate arrival model")
            }
        }
    }

    fn gen_flow_size_rate(&self, rng: &mut impl Rng) -> (Bytes, BytesPerSec) {
        self.sizerate_model.sample(rng)
    }

    /// Fixed source host, destination chosen by the uniform model (`gen_new_flow_with_src`).
    fn gen_new_flow_with_src(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
        src_ip: HostIp,
    ) -> FlowArrival {
        let dst_ip = loop {
            let candidate = gravity::pick_dst_uniform(&self.hosts, rng, topo, src_ip);
            if !active.contains(&(src_ip, candidate)) {
                break candidate;
            }
        };
        let (flow_size, rate) = self.gen_flow_size_rate(rng);
        FlowArrival { src_ip, dst_ip, flow_size, flow_rate: Some(rate) }
    }

    /// Source and destination both fixed, e.g. already chosen by the gravity model.
    fn gen_new_flow_with_src_dst(
        &self,
        rng: &mut impl Rng,
        src_ip: HostIp,
        dst_ip: HostIp,
    ) -> FlowArrival {
        let (flow_size, rate) = self.gen_flow_size_rate(rng);
        FlowArrival { src_ip, dst_ip, flow_size, flow_rate: Some(rate) }
    }

    /// Picks a brand-new `(src, dst)` pair per the configured src/dst model, with no
    /// src host fixed in advance (used by `const`/`exp` arrivals and gravity-model
    /// saturate arrivals).
    fn gen_new_flow(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
    ) -> FlowArrival {
        match self.srcdst_model {
            SrcDstModel::Uniform => {
                let src_ip = self.hosts[rng.gen_range(0..self.hosts.len())];
                self.gen_new_flow_with_src(rng, topo, active, src_ip)
            }
            SrcDstModel::Gravity | SrcDstModel::Antigravity => {
                let table = self.gravity.as_ref().expect("gravity model always builds a table");
                let (src_ip, dst_ip) = gravity::pick_src_dst_gravity(table, rng, topo, active);
                self.gen_new_flow_with_src_dst(rng, src_ip, dst_ip)
            }
        }
    }

    /// Next arrival after a flow ending at `src_ip` frees it up (saturate mode keeps
    /// exactly one live flow per source host). Grounded on `gen_new_flow_arr_saturate`.
    pub fn next_saturate_arrival(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
        now: Time,
        src_ip: HostIp,
    ) -> (Time, FlowArrival) {
        let ArrivalModel::Saturate(params) = &self.arrival_model else {
            panic!("next_saturate_arrival called with a non-saturate arrival model");
        };
        let new_time = now + secs_to_delta(params.next_flow_delay_secs);
        let arrival = match self.srcdst_model {
            SrcDstModel::Uniform => self.gen_new_flow_with_src(rng, topo, active, src_ip),
            SrcDstModel::Gravity | SrcDstModel::Antigravity => {
                self.gen_new_flow(rng, topo, active)
            }
        };
        (new_time, arrival)
    }

    /// Next arrival under the `const` model: inter-arrival uniform in `(1±cutoff)/λ`.
    /// Grounded on `gen_new_flow_arr_const`.
    pub fn next_const_arrival(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
        now: Time,
    ) -> (Time, FlowArrival) {
        let ArrivalModel::Const(params) = &self.arrival_model else {
            panic!("next_const_arrival called with a non-const arrival model");
        };
        let hi = (1.0 + params.cutoff) / params.rate_per_sec;
        let lo = (1.0 - params.cutoff) / params.rate_per_sec;
        let dt = rng.gen_range(lo..hi);
        let new_time = now + secs_to_delta(dt);
        (new_time, self.gen_new_flow(rng, topo, active))
    }

    /// Next arrival under the `exp` model: exponential inter-arrivals at rate λ.
    /// Grounded on `gen_new_flow_arr_exp`.
    pub fn next_exp_arrival(
        &self,
        rng: &mut impl Rng,
        topo: &Topology,
        active: &FxHashSet<(HostIp, HostIp)>,
        now: Time,
    ) -> (Time, FlowArrival) {
        let ArrivalModel::Exp(params) = &self.arrival_model else {
            panic!("next_exp_arrival called with a non-exp arrival model");
        };
        // Inverse-CDF sampling: -ln(1-U)/λ, U uniform in [0,1).
        let u: f64 = rng.gen_range(0.0..1.0);
        let dt = -(1.0 - u).ln() / params.rate_per_sec;
        let new_time = now + secs_to_delta(dt);
        (new_time, self.gen_new_flow(rng, topo, active))
    }

    /// Seeds the initial flow set at simulation start (SPEC_FULL §4.7). Saturate mode
    /// spreads one flow per source host over `[0, spread]`; `const`/`exp` seed a single
    /// flow at `t=0`. Grounded on `gen_init_flows`.
    pub fn initial_flows(&self, rng: &mut impl Rng, topo: &Topology) -> Vec<(Time, FlowArrival)> {
        let active = FxHashSet::default();
        match &self.arrival_model {
            ArrivalModel::Saturate(params) => self
                .hosts
                .iter()
                .map(|&src_ip| {
                    let spread = rng.gen_range(0.0..=params.init_spread_secs.max(0.0));
                    let ev_time = Time::ZERO + secs_to_delta(spread);
                    let arrival = self.gen_new_flow_with_src(rng, topo, &active, src_ip);
                    (ev_time, arrival)
                })
                .collect(),
            ArrivalModel::Const(_) | ArrivalModel::Exp(_) => {
                vec![(Time::ZERO, self.gen_new_flow(rng, topo, &active))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkSpec, NodeSpec, TopologyOverrides};
    use rand::{rngs::StdRng, SeedableRng};

    fn two_host_topo() -> Topology {
        let nodes = vec![
            NodeSpec::new("A".into(), 10, 2),
            NodeSpec::new("B".into(), 10, 2),
        ];
        let links = vec![LinkSpec::new("A".into(), "B".into(), BytesPerSec::new(10))];
        Topology::new(&nodes, &links, TopologyOverrides::default()).unwrap()
    }

    fn sizerate() -> SizeRateModel {
        SizeRateModel::Uniform(UniformSizeRate {
            size_lo: Bytes::new(1_000),
            size_hi: Bytes::new(2_000),
            rate_lo: BytesPerSec::new(10),
            rate_hi: BytesPerSec::new(20),
        })
    }

    #[test]
    fn uniform_model_never_picks_same_edge_switch() {
        let topo = two_host_topo();
        let gen = FlowGenerator::new(
            &topo,
            SrcDstModel::Uniform,
            sizerate(),
            ArrivalModel::Const(ConstArrival { rate_per_sec: 1.0, cutoff: 0.1 }),
        );
        let mut rng = StdRng::seed_from_u64(5);
        let active = FxHashSet::default();
        for _ in 0..50 {
            let arrival = gen.gen_new_flow(&mut rng, &topo, &active);
            assert_ne!(
                topo.edge_switch_of(arrival.src_ip),
                topo.edge_switch_of(arrival.dst_ip)
            );
        }
    }

    #[test]
    fn saturate_seeds_exactly_one_flow_per_host() {
        let topo = two_host_topo();
        let gen = FlowGenerator::new(
            &topo,
            SrcDstModel::Uniform,
            sizerate(),
            ArrivalModel::Saturate(SaturateArrival {
                next_flow_delay_secs: 0.001,
                init_spread_secs: 0.5,
            }),
        );
        let mut rng = StdRng::seed_from_u64(9);
        let seeded = gen.initial_flows(&mut rng, &topo);
        assert_eq!(seeded.len(), gen.hosts().len());
        for (_, arrival) in &seeded {
            assert!(gen.hosts().contains(&arrival.src_ip));
        }
    }

    #[test]
    fn const_and_exp_seed_a_single_flow_at_zero() {
        let topo = two_host_topo();
        let gen = FlowGenerator::new(
            &topo,
            SrcDstModel::Uniform,
            sizerate(),
            ArrivalModel::Exp(ExpArrival { rate_per_sec: 2.0 }),
        );
        let mut rng = StdRng::seed_from_u64(13);
        let seeded = gen.initial_flows(&mut rng, &topo);
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].0, Time::ZERO);
    }

    #[test]
    fn exp_arrivals_advance_time_forward() {
        let topo = two_host_topo();
        let gen = FlowGenerator::new(
            &topo,
            SrcDstModel::Uniform,
            sizerate(),
            ArrivalModel::Exp(ExpArrival { rate_per_sec: 100.0 }),
        );
        let mut rng = StdRng::seed_from_u64(21);
        let active = FxHashSet::default();
        let now = Time::ZERO;
        let (next, _) = gen.next_exp_arrival(&mut rng, &topo, &active, now);
        assert!(next > now);
    }
}
