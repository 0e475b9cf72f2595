use super::autocorrelation::{
    initial_sequence_inefficiency, positive_sequence_inefficiency, variance, window_inefficiency,
};
use super::{Estimate, EstimationError, Estimator, EstimatorStrategy};
use tracing::trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Series shorter than this are reported as uncorrelated without analysis.
const MIN_ANALYSIS_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Criterion {
    MinSquaredStandardError,
    MaxEffectiveSampleSize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    inefficiency: f64,
    ess: f64,
    sse: f64,
}

/// Equilibration detection by scanning truncation points.
///
/// For each candidate equilibration index `t0` the samples before `t0` are
/// discarded and the inefficiency of the rest is computed with the strategy's
/// method. The chosen index either minimizes the squared standard error of the
/// mean, `var * g / (n - t0)`, or maximizes the effective sample size,
/// `(n - t0) / g`. Ties resolve to the earliest index.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinEstimator {
    /// Upper bound on the number of truncation points evaluated.
    pub max_candidates: usize,
    /// Largest fraction of the series that may be discarded as burn-in.
    pub max_truncation_fraction: f64,
}

impl Default for BuiltinEstimator {
    fn default() -> Self {
        Self {
            max_candidates: 50,
            max_truncation_fraction: 0.5,
        }
    }
}

impl BuiltinEstimator {
    fn candidate_indices(&self, n: usize) -> Vec<usize> {
        let fraction = self.max_truncation_fraction.clamp(0.0, 1.0);
        let last = ((n as f64 * fraction).floor() as usize).min(n - MIN_ANALYSIS_LENGTH / 2);
        let count = self.max_candidates.max(1).min(last + 1);
        if count == 1 {
            return vec![0];
        }
        let mut indices: Vec<usize> = (0..count)
            .map(|i| (i as f64 * last as f64 / (count - 1) as f64).round() as usize)
            .collect();
        indices.dedup();
        indices
    }

    fn evaluate_candidate(series: &[f64], index: usize, strategy: EstimatorStrategy) -> Candidate {
        let tail = &series[index..];
        let inefficiency = match strategy {
            EstimatorStrategy::Window => window_inefficiency(tail),
            EstimatorStrategy::InitialSequence => initial_sequence_inefficiency(tail),
            EstimatorStrategy::PositiveSequence => positive_sequence_inefficiency(tail),
        };
        let n = tail.len() as f64;
        Candidate {
            index,
            inefficiency,
            ess: n / inefficiency,
            sse: variance(tail) * inefficiency / n,
        }
    }

    fn criterion(strategy: EstimatorStrategy) -> Criterion {
        match strategy {
            EstimatorStrategy::Window | EstimatorStrategy::InitialSequence => {
                Criterion::MinSquaredStandardError
            }
            EstimatorStrategy::PositiveSequence => Criterion::MaxEffectiveSampleSize,
        }
    }
}

impl Estimator for BuiltinEstimator {
    fn estimate(
        &self,
        series: &[f64],
        strategy: EstimatorStrategy,
    ) -> Result<Estimate, EstimationError> {
        if let Some((index, &value)) = series.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(EstimationError::NonFinite { index, value });
        }
        if series.len() < MIN_ANALYSIS_LENGTH {
            return Ok(Estimate::uncorrelated(series.len()));
        }

        let indices = self.candidate_indices(series.len());

        let iterator = indices.iter();

        #[cfg(feature = "parallel")]
        let iterator = indices.par_iter();

        let candidates: Vec<Candidate> = iterator
            .map(|&index| Self::evaluate_candidate(series, index, strategy))
            .collect();

        let criterion = Self::criterion(strategy);
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            let better = match criterion {
                Criterion::MinSquaredStandardError => candidate.sse < best.sse,
                Criterion::MaxEffectiveSampleSize => candidate.ess > best.ess,
            };
            if better {
                best = *candidate;
            }
        }

        trace!(
            strategy = strategy.name(),
            index = best.index,
            inefficiency = best.inefficiency,
            ess = best.ess,
            "Selected equilibration point"
        );

        Ok(Estimate {
            equilibration_index: best.index,
            statistical_inefficiency: best.inefficiency,
            effective_sample_size: best.ess,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn short_series_are_reported_uncorrelated() {
        let estimate = BuiltinEstimator::default()
            .estimate(&[1.0, 2.0, 3.0], EstimatorStrategy::Window)
            .unwrap();
        assert_eq!(estimate, Estimate::uncorrelated(3));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let result = BuiltinEstimator::default()
            .estimate(&[1.0, f64::NAN, 3.0, 4.0, 5.0], EstimatorStrategy::Window);
        assert!(matches!(result, Err(EstimationError::NonFinite { index: 1, .. })));
    }

    #[test]
    fn constant_series_keeps_every_sample() {
        let series = vec![1.5; 200];
        for strategy in EstimatorStrategy::ALL {
            let estimate = BuiltinEstimator::default().estimate(&series, strategy).unwrap();
            assert_eq!(estimate.equilibration_index, 0);
            assert_eq!(estimate.statistical_inefficiency, 1.0);
            assert_eq!(estimate.effective_sample_size, 200.0);
        }
    }

    #[test]
    fn burn_in_drift_is_discarded() {
        // A strong linear relaxation over the first 300 samples, then noise.
        let mut series: Vec<f64> = (0..300).map(|i| 100.0 - i as f64 / 3.0).collect();
        series.extend(white_noise(700, 3));
        for strategy in EstimatorStrategy::ALL {
            let estimate = BuiltinEstimator::default().estimate(&series, strategy).unwrap();
            assert!(
                estimate.equilibration_index >= 250,
                "{} kept burn-in: index {}",
                strategy.name(),
                estimate.equilibration_index
            );
            assert!(estimate.statistical_inefficiency >= 1.0);
            assert!(estimate.effective_sample_size <= (1000 - estimate.equilibration_index) as f64);
        }
    }

    #[test]
    fn candidate_indices_respect_truncation_limit() {
        let estimator = BuiltinEstimator {
            max_candidates: 10,
            max_truncation_fraction: 0.5,
        };
        let indices = estimator.candidate_indices(100);
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&50));
        assert!(indices.len() <= 10);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }
}
