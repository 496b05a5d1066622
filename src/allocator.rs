//! The max-min fair bandwidth allocator (SPEC_FULL §4.5), the central algorithm. Grounded
//! on `original_source/sim/SimCoreCalculation.py::calc_flow_rates_src_limited` /
//! `calc_flow_rates_src_unlimited`.
//!
//! [`max_min_fair`] is the reusable bottleneck-iteration core; it is also what the
//! elephant rerouter's `comB` (SPEC_FULL §4.6) calls, restricted to a subset of flows, so
//! the two algorithms can never drift apart.

use rustc_hash::FxHashMap;

use crate::flow::{Flow, FlowId};
use crate::time::Time;
use crate::topology::{NodeId, Topology};
use crate::units::BytesPerSec;

pub type LinkKey = (NodeId, NodeId);

pub fn canonical_link(a: NodeId, b: NodeId) -> LinkKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One flow's allocator-relevant inputs: its source-rate cap (already resolved to
/// `BytesPerSec::MAX` if the flow or the run is unlimited) and the canonical links on its
/// path.
#[derive(Debug, Clone)]
pub struct FlowInput {
    pub id: FlowId,
    pub cap: BytesPerSec,
    pub links: Vec<LinkKey>,
}

/// The bottleneck-iteration max-min fair allocator (SPEC_FULL §4.5, steps 1-6).
///
/// Returns the rate assigned to every flow in `flows`. Flows that share no link with
/// anything receive their own cap; flows on a saturated link all receive an equal share
/// of whatever residual capacity iteration leaves for them.
pub fn max_min_fair(
    flows: &[FlowInput],
    link_caps: &FxHashMap<LinkKey, BytesPerSec>,
) -> FxHashMap<FlowId, BytesPerSec> {
    let cap_max = link_caps.values().map(|c| c.into_f64()).fold(0.0, f64::max);
    let eps = 1e-12 * cap_max;

    let mut unassigned_bw: FxHashMap<LinkKey, f64> = link_caps
        .iter()
        .map(|(&l, &c)| (l, c.into_f64()))
        .collect();
    let mut n_unassigned: FxHashMap<LinkKey, usize> = FxHashMap::default();
    let mut flows_on_link: FxHashMap<LinkKey, Vec<FlowId>> = FxHashMap::default();
    for f in flows {
        for &l in &f.links {
            *n_unassigned.entry(l).or_insert(0) += 1;
            flows_on_link.entry(l).or_default().push(f.id);
        }
    }

    let mut sorted: Vec<&FlowInput> = flows.iter().collect();
    sorted.sort_by_key(|f| (f.cap.into_u64(), f.id.into_usize()));

    let mut assigned: FxHashMap<FlowId, BytesPerSec> = FxHashMap::default();
    let mut next = 0usize;

    loop {
        // Global bottleneck: the still-unsaturated link with the smallest fair share,
        // ties broken lexicographically by link id (SPEC_FULL §4.5, ties/degeneracies).
        let bottleneck = n_unassigned
            .iter()
            .filter(|&(_, &n)| n > 0)
            .map(|(&l, &n)| (l, unassigned_bw[&l] / n as f64))
            .min_by(|(l1, b1), (l2, b2)| {
                b1.partial_cmp(b2)
                    .unwrap()
                    .then_with(|| l1.cmp(l2))
            });
        let Some((l_star, b_star)) = bottleneck else {
            break;
        };

        while next < sorted.len() && assigned.contains_key(&sorted[next].id) {
            next += 1;
        }
        let Some(f) = sorted.get(next) else { break };
        let cap_f = f.cap.into_f64();

        if cap_f < b_star - eps {
            // Source-limited: this flow caps out below the fair share.
            let f = sorted[next];
            assigned.insert(f.id, f.cap);
            next += 1;
            for &l in &f.links {
                *n_unassigned.get_mut(&l).unwrap() -= 1;
                let bw = unassigned_bw.get_mut(&l).unwrap();
                *bw = (*bw - cap_f).max(0.0);
            }
        } else {
            // Fair-share-limited: every unassigned flow on the bottleneck link gets B*,
            // floored so `n_unassigned_L* * share` never exceeds the link's actual
            // remaining capacity (rounding to nearest can oversubscribe by up to 1 unit).
            let share = BytesPerSec::new(b_star.floor() as u64);
            let on_link = flows_on_link.get(&l_star).cloned().unwrap_or_default();
            for fid in on_link {
                if assigned.contains_key(&fid) {
                    continue;
                }
                assigned.insert(fid, share);
                let f = flows.iter().find(|f| f.id == fid).unwrap();
                for &l in &f.links {
                    *n_unassigned.get_mut(&l).unwrap() -= 1;
                    let bw = unassigned_bw.get_mut(&l).unwrap();
                    *bw = (*bw - b_star).max(0.0);
                }
            }
        }
    }

    // Any flow left unassigned (should only happen for flows with no links) gets its cap.
    for f in flows {
        assigned.entry(f.id).or_insert(f.cap);
    }
    assigned
}

fn effective_cap(flow: &Flow, src_limited: bool) -> BytesPerSec {
    if src_limited {
        flow.flow_rate.unwrap_or(BytesPerSec::MAX)
    } else {
        BytesPerSec::MAX
    }
}

/// Recomputes the allocation over every `Active` flow and refreshes the side channel:
/// the earliest projected completion across all active flows (SPEC_FULL §4.1, §9).
pub fn recompute(
    flows: &mut FxHashMap<FlowId, Flow>,
    topo: &Topology,
    src_limited: bool,
    now: Time,
) -> Option<(FlowId, Time)> {
    let link_caps: FxHashMap<LinkKey, BytesPerSec> = topo
        .links()
        .map(|(a, b, cap)| (canonical_link(a, b), cap))
        .collect();

    let inputs: Vec<FlowInput> = flows
        .values()
        .filter(|f| f.is_active())
        .map(|f| FlowInput {
            id: f.id,
            cap: effective_cap(f, src_limited),
            links: f
                .links
                .iter()
                .map(|&(a, b)| canonical_link(a, b))
                .collect(),
        })
        .collect();

    let rates = max_min_fair(&inputs, &link_caps);

    let mut next_end: Option<(FlowId, Time)> = None;
    for (id, rate) in &rates {
        let flow = flows.get_mut(id).unwrap();
        flow.curr_rate = *rate;
        if *rate == BytesPerSec::ZERO && !flow.warned_zero_rate {
            log::warn!("flow {} received a zero-rate allocation", id.into_usize());
            flow.warned_zero_rate = true;
        }
    }
    for flow in flows.values() {
        if let Some(end) = flow.projected_end(now) {
            next_end = Some(match next_end {
                Some((best_id, best_end)) if (best_end, best_id.into_usize()) <= (end, flow.id.into_usize()) => {
                    (best_id, best_end)
                }
                _ => (flow.id, end),
            });
        }
    }
    next_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(a: usize, b: usize) -> LinkKey {
        canonical_link(NodeId::new(a), NodeId::new(b))
    }

    #[test]
    fn single_link_splits_evenly_without_source_caps() {
        let l = link(0, 1);
        let caps = FxHashMap::from_iter([(l, BytesPerSec::new(10))]);
        let flows = vec![
            FlowInput { id: FlowId::new(0), cap: BytesPerSec::MAX, links: vec![l] },
            FlowInput { id: FlowId::new(1), cap: BytesPerSec::MAX, links: vec![l] },
        ];
        let rates = max_min_fair(&flows, &caps);
        assert_eq!(rates[&FlowId::new(0)], BytesPerSec::new(5));
        assert_eq!(rates[&FlowId::new(1)], BytesPerSec::new(5));
    }

    #[test]
    fn source_cap_below_fair_share_is_honored() {
        let l = link(0, 1);
        let caps = FxHashMap::from_iter([(l, BytesPerSec::new(10))]);
        let flows = vec![
            FlowInput { id: FlowId::new(0), cap: BytesPerSec::new(3), links: vec![l] },
            FlowInput { id: FlowId::new(1), cap: BytesPerSec::MAX, links: vec![l] },
        ];
        let rates = max_min_fair(&flows, &caps);
        assert_eq!(rates[&FlowId::new(0)], BytesPerSec::new(3));
        assert_eq!(rates[&FlowId::new(1)], BytesPerSec::new(7));
    }

    #[test]
    fn y_topology_bottlenecks_on_the_shared_link() {
        // A-B cap 10, B-C cap 4, three flows A->C.
        let ab = link(0, 1);
        let bc = link(1, 2);
        let caps = FxHashMap::from_iter([(ab, BytesPerSec::new(10)), (bc, BytesPerSec::new(4))]);
        let flows: Vec<_> = (0..3)
            .map(|i| FlowInput {
                id: FlowId::new(i),
                cap: BytesPerSec::MAX,
                links: vec![ab, bc],
            })
            .collect();
        let rates = max_min_fair(&flows, &caps);
        for i in 0..3 {
            assert_eq!(rates[&FlowId::new(i)], BytesPerSec::new(1)); // 4/3 floors to 1 in integer bytes/sec
        }
    }

    #[test]
    fn uneven_share_floors_instead_of_rounding() {
        // cap 11 split three ways: 11/3 = 3.667, which must floor to 3, not round to 4 —
        // rounding up would assign 3*4=12 > 11 and violate the link's capacity.
        let l = link(0, 1);
        let caps = FxHashMap::from_iter([(l, BytesPerSec::new(11))]);
        let flows: Vec<_> = (0..3)
            .map(|i| FlowInput { id: FlowId::new(i), cap: BytesPerSec::MAX, links: vec![l] })
            .collect();
        let rates = max_min_fair(&flows, &caps);
        let total: u64 = (0..3).map(|i| rates[&FlowId::new(i)].into_u64()).sum();
        assert!(total <= 11, "allocated {total} over an 11-capacity link");
        for i in 0..3 {
            assert_eq!(rates[&FlowId::new(i)], BytesPerSec::new(3));
        }
    }
}
