//! Flow size/rate models (SPEC_FULL §4.7). Grounded on
//! `original_source/sim/SimFlowGen.py::gen_flow_size_rate_{uniform,bimodal,lognormal}`.

use rand::Rng;
use rand_distr::{Distribution, LogNormal};

use crate::units::{Bytes, BytesPerSec};

#[derive(Debug, Clone, Copy)]
pub struct UniformSizeRate {
    pub size_lo: Bytes,
    pub size_hi: Bytes,
    pub rate_lo: BytesPerSec,
    pub rate_hi: BytesPerSec,
}

#[derive(Debug, Clone, Copy)]
pub struct BimodalSizeRate {
    pub prob_large: f64,
    pub size_large_lo: Bytes,
    pub size_large_hi: Bytes,
    pub rate_large_lo: BytesPerSec,
    pub rate_large_hi: BytesPerSec,
    pub size_small_lo: Bytes,
    pub size_small_hi: Bytes,
    pub rate_small_lo: BytesPerSec,
    pub rate_small_hi: BytesPerSec,
}

#[derive(Debug, Clone, Copy)]
pub struct LognormalSizeRate {
    pub size_mu: f64,
    pub size_sigma: f64,
    pub rate_lo: BytesPerSec,
    pub rate_hi: BytesPerSec,
}

/// How a generated flow's size and source-rate cap are drawn.
#[derive(Debug, Clone, Copy)]
pub enum SizeRateModel {
    Uniform(UniformSizeRate),
    Bimodal(BimodalSizeRate),
    Lognormal(LognormalSizeRate),
}

fn uniform_bytes(rng: &mut impl Rng, lo: Bytes, hi: Bytes) -> Bytes {
    let v = rng.gen_range(lo.into_f64()..=hi.into_f64());
    Bytes::new(v.round() as u64)
}

fn uniform_rate(rng: &mut impl Rng, lo: BytesPerSec, hi: BytesPerSec) -> BytesPerSec {
    let v = rng.gen_range(lo.into_f64()..=hi.into_f64());
    BytesPerSec::new(v.round() as u64)
}

impl SizeRateModel {
    /// Draws one `(flow_size, flow_rate)` pair.
    pub fn sample(&self, rng: &mut impl Rng) -> (Bytes, BytesPerSec) {
        match self {
            SizeRateModel::Uniform(p) => (
                uniform_bytes(rng, p.size_lo, p.size_hi),
                uniform_rate(rng, p.rate_lo, p.rate_hi),
            ),
            SizeRateModel::Bimodal(p) => {
                if rng.gen_range(0.0..1.0) < p.prob_large {
                    (
                        uniform_bytes(rng, p.size_large_lo, p.size_large_hi),
                        uniform_rate(rng, p.rate_large_lo, p.rate_large_hi),
                    )
                } else {
                    (
                        uniform_bytes(rng, p.size_small_lo, p.size_small_hi),
                        uniform_rate(rng, p.rate_small_lo, p.rate_small_hi),
                    )
                }
            }
            SizeRateModel::Lognormal(p) => {
                let dist = LogNormal::new(p.size_mu, p.size_sigma)
                    .expect("config validation rejects a non-positive sigma");
                let size = dist.sample(rng).round().max(0.0) as u64;
                (Bytes::new(size), uniform_rate(rng, p.rate_lo, p.rate_hi))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn uniform_sample_stays_within_range() {
        let model = SizeRateModel::Uniform(UniformSizeRate {
            size_lo: Bytes::new(100),
            size_hi: Bytes::new(200),
            rate_lo: BytesPerSec::new(10),
            rate_hi: BytesPerSec::new(20),
        });
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let (size, rate) = model.sample(&mut rng);
            assert!(size >= Bytes::new(100) && size <= Bytes::new(200));
            assert!(rate >= BytesPerSec::new(10) && rate <= BytesPerSec::new(20));
        }
    }

    #[test]
    fn bimodal_sample_picks_one_of_the_two_intervals() {
        let model = SizeRateModel::Bimodal(BimodalSizeRate {
            prob_large: 0.5,
            size_large_lo: Bytes::new(1_000_000),
            size_large_hi: Bytes::new(2_000_000),
            rate_large_lo: BytesPerSec::new(100),
            rate_large_hi: BytesPerSec::new(200),
            size_small_lo: Bytes::new(100),
            size_small_hi: Bytes::new(200),
            rate_small_lo: BytesPerSec::new(1),
            rate_small_hi: BytesPerSec::new(2),
        });
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let (size, _) = model.sample(&mut rng);
            let in_small = size >= Bytes::new(100) && size <= Bytes::new(200);
            let in_large = size >= Bytes::new(1_000_000) && size <= Bytes::new(2_000_000);
            assert!(in_small || in_large, "size {size:?} fell between the two intervals");
        }
    }
}
