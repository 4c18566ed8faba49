//! Bid sampling and per-round generators.
//!
//! Turns a [`BidPolicy`] into a distribution over non-negative bids.

use adauction_core::{BidPolicy, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal, Uniform};

/// Generator for one round of a seeded run.
///
/// Seed and round occupy separate bytes of the generator seed, so distinct
/// `(seed, round)` pairs never share a stream.
pub fn round_rng(seed: u64, round: u64) -> StdRng {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..16].copy_from_slice(&round.to_le_bytes());
    StdRng::from_seed(bytes)
}

/// Convert mean and standard deviation to log-normal parameters.
///
/// For LogNormal(μ, σ):
/// - E[X] = exp(μ + σ²/2)
/// - Var[X] = (exp(σ²) - 1) * exp(2μ + σ²)
///
/// so σ = sqrt(ln(1 + s²/m²)) and μ = ln(m) - σ²/2.
pub fn lognormal_params(mean: f64, stddev: f64) -> (f64, f64) {
    let sigma_squared = (1.0 + (stddev * stddev) / (mean * mean)).ln();
    (mean.ln() - sigma_squared / 2.0, sigma_squared.sqrt())
}

/// Log-normal distribution with the given mean and standard deviation.
pub fn lognormal(mean: f64, stddev: f64) -> Result<LogNormal<f64>> {
    if !(mean > 0.0 && stddev >= 0.0) {
        return Err(Error::invalid_configuration(format!(
            "log-normal needs mean > 0 and stddev >= 0, got {mean}, {stddev}"
        )));
    }
    let (mu, sigma) = lognormal_params(mean, stddev);
    LogNormal::new(mu, sigma).map_err(|e| Error::invalid_configuration(e.to_string()))
}

/// Bid distribution built from a [`BidPolicy`].
#[derive(Debug, Clone, Copy)]
pub enum BidSampler {
    /// Constant bid.
    Fixed(f64),
    /// Uniform over `[low, high)`.
    Uniform(Uniform<f64>),
    /// Log-normal parameterized by mean and standard deviation.
    LogNormal(LogNormal<f64>),
    /// Normal, clamped at zero when sampled.
    Normal(Normal<f64>),
}

impl BidSampler {
    /// Build a sampler, rejecting invalid parameters.
    pub fn new(policy: &BidPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(match *policy {
            BidPolicy::Fixed { value } => BidSampler::Fixed(value),
            BidPolicy::Uniform { low, high } => BidSampler::Uniform(Uniform::new(low, high)),
            BidPolicy::LogNormal { mean, stddev } => BidSampler::LogNormal(lognormal(mean, stddev)?),
            BidPolicy::Normal { mean, stddev } => BidSampler::Normal(
                Normal::new(mean, stddev).map_err(|e| Error::invalid_configuration(e.to_string()))?,
            ),
        })
    }
}

impl Distribution<f64> for BidSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            BidSampler::Fixed(value) => *value,
            BidSampler::Uniform(d) => d.sample(rng),
            BidSampler::LogNormal(d) => d.sample(rng),
            // Clamped: bids are never negative.
            BidSampler::Normal(d) => d.sample(rng).max(0.0),
        }
    }
}
