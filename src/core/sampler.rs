//! Random duration sampling for three-point estimates.
//!
//! The default model is Beta-PERT with shape parameter lambda = 4: the
//! estimate `(O, M, P)` maps to `Beta(alpha, beta)` with
//! `alpha = 1 + lambda (M - O) / (P - O)` and
//! `beta = 1 + lambda (P - M) / (P - O)`, scaled back onto `[O, P]`.
//! The Beta variate is formed from two independent Gamma variates,
//! `x = G(alpha) / (G(alpha) + G(beta))`, which stays well-behaved when
//! either shape is close to 1. Samples are clamped onto the closed
//! estimate interval and are never NaN.
//!
//! Randomness is fully deterministic: a SplitMix64 generator seeded per
//! trial from the master seed, so results are a pure function of
//! `(master_seed, trial_index)` regardless of worker scheduling.

use crate::core::task::Estimate;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// PERT shape parameter (standard choice).
pub const PERT_LAMBDA: f64 = 4.0;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Distribution family used to sample task durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EstimateModel {
    /// Scaled Beta-PERT with lambda = 4 (the default).
    #[default]
    BetaPert,
    /// Uniform on `[O, P]`; ignores the most likely value.
    Uniform,
    /// Triangular on `[O, P]` with mode `M`.
    Triangular,
}

impl std::fmt::Display for EstimateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimateModel::BetaPert => write!(f, "beta_pert"),
            EstimateModel::Uniform => write!(f, "uniform"),
            EstimateModel::Triangular => write!(f, "triangular"),
        }
    }
}

/// SplitMix64: a minimal counter-based PRNG.
///
/// Not crypto; chosen for stable, scheduler-independent streams. The
/// state advances by a fixed increment and each output is a finalizer
/// over the state, so seeding is cheap and distinct seeds give
/// independent-looking streams.
#[derive(Debug, Clone, Copy)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Create a generator from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        mix(self.state)
    }
}

fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl RngCore for SplitMix64 {
    fn next_u32(&mut self) -> u32 {
        (self.next() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for SplitMix64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }
}

/// Derive the sub-seed for a given stream (trial index) from the master
/// seed. A pure function of `(master, stream)`, so the trial set is
/// identical for any partitioning of trials across workers.
pub fn derive_seed(master: u64, stream: u64) -> u64 {
    mix(master.wrapping_add(stream.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA)))
}

/// Sample a duration for the estimate under the given model.
///
/// The result always lies on the closed interval `[O, P]`.
pub fn sample_duration<R: Rng + ?Sized>(
    model: EstimateModel,
    estimate: &Estimate,
    rng: &mut R,
) -> f64 {
    let o = estimate.optimistic;
    let p = estimate.pessimistic;
    let range = estimate.range();
    if range <= 0.0 {
        // Degenerate point estimate.
        return o;
    }

    let value = match model {
        EstimateModel::BetaPert => {
            let m = estimate.most_likely;
            let alpha = 1.0 + PERT_LAMBDA * (m - o) / range;
            let beta = 1.0 + PERT_LAMBDA * (p - m) / range;
            o + beta_sample(rng, alpha, beta) * range
        }
        EstimateModel::Uniform => o + rng.random::<f64>() * range,
        EstimateModel::Triangular => o + triangular_sample(rng, estimate.most_likely - o, range),
    };

    value.clamp(o, p)
}

/// Beta variate from two independent Gamma variates.
fn beta_sample<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    let x = gamma_sample(rng, alpha);
    let y = gamma_sample(rng, beta);
    let sum = x + y;
    if sum > 0.0 {
        x / sum
    } else {
        0.5
    }
}

/// Gamma variate with the given shape (scale 1), Marsaglia-Tsang method.
///
/// Shapes below 1 use the boost `G(a) = G(a + 1) * U^(1/a)`. PERT shapes
/// are always >= 1, so the boost only serves non-PERT callers.
fn gamma_sample<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    if shape < 1.0 {
        let u = uniform_open01(rng);
        return gamma_sample(rng, shape + 1.0) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = normal_sample(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = uniform_open01(rng);
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Standard normal variate via the Box-Muller transform.
fn normal_sample<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = uniform_open01(rng);
    let u2: f64 = rng.random();
    (-2.0_f64 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Triangular variate on `[0, range]` with mode at `mode`, by inverse
/// transform.
fn triangular_sample<R: Rng + ?Sized>(rng: &mut R, mode: f64, range: f64) -> f64 {
    let u: f64 = rng.random();
    let fc = mode / range;
    if u < fc {
        (u * range * mode).sqrt()
    } else {
        range - ((1.0 - u) * range * (range - mode)).sqrt()
    }
}

/// Uniform in the open interval (0, 1); never returns 0 so logs are safe.
fn uniform_open01<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u: f64 = rng.random();
        if u > 0.0 {
            return u;
        }
    }
}
