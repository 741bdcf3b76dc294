// rust/corpus-core/src/split/sampler.rs

//! Right-set sampling.
//!
//! Every item lands in the right (validation) set independently with
//! probability `threshold = min(right_max / n, right_prob)`, so the right set
//! has expected size at most `right_max`.
//!
//! The default strategy never visits the items it skips: it draws the gap to
//! the next selected index from a geometric distribution, which makes its
//! cost proportional to the right set rather than to `n`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SamplingStrategy;
use crate::error::{CorpusError, Result};

/// Deterministic right-set sampler.
///
/// The generator is owned by the sampler, so two samplers built from the
/// same seed and strategy produce the same sets for the same inputs.
#[derive(Debug, Clone)]
pub struct RightSetSampler {
    rng: StdRng,
    strategy: SamplingStrategy,
}

impl RightSetSampler {
    pub fn new(seed: u64, strategy: SamplingStrategy) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            strategy,
        }
    }

    /// Per-item selection probability for a dataset of `n` items.
    pub fn threshold(n: usize, right_prob: f64, right_max: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        (right_max as f64 / n as f64).min(right_prob)
    }

    /// Draws the right set for a dataset of `n` items.
    ///
    /// The result is strictly increasing with every element in `[0, n)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `right_prob` is NaN or above 1.
    pub fn sample(&mut self, n: usize, right_prob: f64, right_max: usize) -> Result<Vec<usize>> {
        if right_prob.is_nan() || right_prob > 1.0 {
            return Err(CorpusError::config(format!(
                "right_prob must be a probability, got {right_prob}"
            )));
        }

        let p = Self::threshold(n, right_prob, right_max);
        if p <= 0.0 {
            return Ok(Vec::new());
        }

        let right = match self.strategy {
            SamplingStrategy::Geometric => self.sample_geometric(n, p),
            SamplingStrategy::Bernoulli => self.sample_bernoulli(n, p),
        };

        tracing::debug!(
            n,
            threshold = p,
            strategy = ?self.strategy,
            selected = right.len(),
            "sampled right set"
        );
        Ok(right)
    }

    fn sample_geometric(&mut self, n: usize, p: f64) -> Vec<usize> {
        let mut right = Vec::with_capacity(expected_len(n, p));
        // Smallest index the next gap may land on.
        let mut next = 0usize;
        // A skip past usize::MAX is past every index.
        while let Some(index) = self.skips(p).and_then(|s| next.checked_add(s)) {
            if index >= n {
                break;
            }
            right.push(index);
            next = index + 1;
        }
        right
    }

    fn sample_bernoulli(&mut self, n: usize, p: f64) -> Vec<usize> {
        let mut right = Vec::with_capacity(expected_len(n, p));
        for i in 0..n {
            if self.rng.random::<f64>() < p {
                right.push(i);
            }
        }
        right
    }

    /// Draws the number of items skipped before the next pick, i.e. a
    /// Geometric(p) gap minus one, by inverse transform.
    ///
    /// `None` when the count does not fit in a `usize`.
    fn skips(&mut self, p: f64) -> Option<usize> {
        if p >= 1.0 {
            return Some(0);
        }
        // Uniform on (0, 1].
        let u = 1.0 - self.rng.random::<f64>();
        let skipped = (u.ln() / (-p).ln_1p()).floor();
        if skipped >= usize::MAX as f64 {
            return None;
        }
        Some(skipped as usize)
    }
}

fn expected_len(n: usize, p: f64) -> usize {
    ((n as f64 * p) as usize).saturating_add(16).min(n)
}

/// Samples the right set with the default geometric strategy.
pub fn sample_right_indices(
    n: usize,
    right_prob: f64,
    right_max: usize,
    seed: u64,
) -> Result<Vec<usize>> {
    RightSetSampler::new(seed, SamplingStrategy::Geometric).sample(n, right_prob, right_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(right: &[usize], n: usize) {
        assert!(right.windows(2).all(|w| w[0] < w[1]), "not strictly increasing");
        assert!(right.iter().all(|&i| i < n), "index out of range");
    }

    #[test]
    fn test_selects_everything_at_threshold_one() {
        let right = sample_right_indices(10, 1.0, 10, 7).unwrap();
        assert_eq!(right, (0..10).collect::<Vec<_>>());

        let mut bernoulli = RightSetSampler::new(7, SamplingStrategy::Bernoulli);
        assert_eq!(bernoulli.sample(10, 1.0, 10).unwrap(), right);
    }

    #[test]
    fn test_zero_probability_selects_nothing() {
        assert!(sample_right_indices(1000, 0.0, 1000, 1).unwrap().is_empty());
        assert!(sample_right_indices(1000, -0.5, 1000, 1).unwrap().is_empty());
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(sample_right_indices(0, 0.5, 10, 1).unwrap().is_empty());
        assert!(sample_right_indices(100, 0.5, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_probability() {
        assert!(matches!(
            sample_right_indices(10, f64::NAN, 10, 1),
            Err(CorpusError::Config { .. })
        ));
        assert!(matches!(
            sample_right_indices(10, 1.5, 10, 1),
            Err(CorpusError::Config { .. })
        ));
    }

    #[test]
    fn test_right_max_caps_expected_size() {
        let right = sample_right_indices(1_000_000, 1e-3, 500, 0x5eed).unwrap();
        assert_well_formed(&right, 1_000_000);
        // Mean 500, standard deviation about 22.
        assert!((390..=610).contains(&right.len()), "got {}", right.len());
    }

    #[test]
    fn test_deterministic_per_seed() {
        let a = sample_right_indices(50_000, 0.01, 1000, 42).unwrap();
        let b = sample_right_indices(50_000, 0.01, 1000, 42).unwrap();
        let c = sample_right_indices(50_000, 0.01, 1000, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mean_size_over_seeds() {
        for strategy in [SamplingStrategy::Geometric, SamplingStrategy::Bernoulli] {
            let total: usize = (0..200)
                .map(|seed| {
                    let right = RightSetSampler::new(seed, strategy)
                        .sample(2000, 0.05, 2000)
                        .unwrap();
                    assert_well_formed(&right, 2000);
                    right.len()
                })
                .sum();
            let mean = total as f64 / 200.0;
            // Expected 100 per run; the mean over 200 runs has sd below 1.
            assert!((95.0..=105.0).contains(&mean), "{strategy:?}: mean {mean}");
        }
    }

    #[test]
    fn test_threshold() {
        assert_eq!(RightSetSampler::threshold(0, 0.5, 10), 0.0);
        assert_eq!(RightSetSampler::threshold(100, 0.5, 10), 0.1);
        assert_eq!(RightSetSampler::threshold(100, 0.01, 10), 0.01);
    }

    #[test]
    fn test_gap_for_tiny_probability_terminates() {
        let right = sample_right_indices(usize::MAX, 1e-300, usize::MAX, 3).unwrap();
        assert_well_formed(&right, usize::MAX);
        // Every skip overflows, so nothing lands near the end of the range.
        assert!(right.is_empty());
    }

    #[test]
    fn test_skip_overflow_stops_sampling() {
        let mut sampler = RightSetSampler::new(11, SamplingStrategy::Geometric);
        let right = sampler.sample(usize::MAX, 1e-30, usize::MAX).unwrap();
        assert!(right.iter().all(|&i| i < usize::MAX - 1));
    }
}
