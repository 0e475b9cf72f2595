use super::config::{ConvergenceConfig, ConvergencePolicy};
use super::error::EngineError;
use crate::core::io::statistics::StatisticsTable;
use crate::core::timeseries::{
    Estimate, EstimationError, Estimator, EstimatorStrategy, ObservableSeries,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyEstimate {
    pub strategy: EstimatorStrategy,
    #[serde(flatten)]
    pub estimate: Estimate,
}

/// The combined judgement of all strategies on one observable series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceVerdict {
    pub observable: String,
    /// Latest equilibration index reported by any strategy.
    pub equilibration_index: usize,
    /// Largest inefficiency reported by any strategy.
    pub statistical_inefficiency: f64,
    /// Smallest effective sample size reported by any strategy.
    pub effective_sample_size: f64,
    pub n_samples: usize,
    /// `(n_samples - equilibration_index) / ceil(statistical_inefficiency)`.
    pub n_evaluator_samples: f64,
    pub converged: bool,
    pub estimates: Vec<StrategyEstimate>,
}

/// Verdicts for every tracked observable of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub converged: bool,
    pub statistical_inefficiency: f64,
    pub n_samples: usize,
    pub observables: Vec<ConvergenceVerdict>,
}

pub struct ConvergenceDetector<S: Estimator> {
    estimator: S,
    config: ConvergenceConfig,
}

impl<S: Estimator> ConvergenceDetector<S> {
    pub fn new(estimator: S, config: ConvergenceConfig) -> Self {
        Self { estimator, config }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    pub fn evaluate(&self, series: &ObservableSeries) -> Result<ConvergenceVerdict, EngineError> {
        let n_samples = series.len();
        if series.is_empty() {
            return Ok(ConvergenceVerdict {
                observable: series.name.clone(),
                equilibration_index: 0,
                statistical_inefficiency: 1.0,
                effective_sample_size: 0.0,
                n_samples: 0,
                n_evaluator_samples: 0.0,
                converged: false,
                estimates: Vec::new(),
            });
        }

        let mut estimates = Vec::with_capacity(self.config.strategies.len());
        for &strategy in &self.config.strategies {
            let estimate = self
                .estimator
                .estimate(&series.samples, strategy)
                .and_then(|e| check_estimate(e, n_samples))
                .map_err(|source| EngineError::Estimation {
                    observable: series.name.clone(),
                    source,
                })?;
            debug!(
                observable = %series.name,
                strategy = strategy.name(),
                index = estimate.equilibration_index,
                inefficiency = estimate.statistical_inefficiency,
                ess = estimate.effective_sample_size,
                "Strategy estimate"
            );
            estimates.push(StrategyEstimate { strategy, estimate });
        }

        let equilibration_index = estimates
            .iter()
            .map(|e| e.estimate.equilibration_index)
            .max()
            .unwrap_or(0);
        let statistical_inefficiency = estimates
            .iter()
            .map(|e| e.estimate.statistical_inefficiency)
            .fold(1.0, f64::max);
        let effective_sample_size = estimates
            .iter()
            .map(|e| e.estimate.effective_sample_size)
            .fold(f64::INFINITY, f64::min);

        let n_evaluator_samples =
            (n_samples - equilibration_index) as f64 / statistical_inefficiency.ceil();
        let converged = match self.config.policy {
            ConvergencePolicy::EffectiveSampleFloor => {
                effective_sample_size >= self.config.required_samples
            }
            ConvergencePolicy::ThroughputNormalized => {
                n_evaluator_samples >= self.config.required_samples
            }
        };

        info!(
            observable = %series.name,
            min_ess = effective_sample_size,
            max_index = equilibration_index,
            max_inefficiency = statistical_inefficiency,
            n_evaluator_samples,
            converged,
            "Evaluated equilibration"
        );

        Ok(ConvergenceVerdict {
            observable: series.name.clone(),
            equilibration_index,
            statistical_inefficiency,
            effective_sample_size,
            n_samples,
            n_evaluator_samples,
            converged,
            estimates,
        })
    }

    /// Evaluates every tracked observable of `table`. The run is converged only
    /// if each observable is.
    pub fn evaluate_table(&self, table: &StatisticsTable) -> Result<RunVerdict, EngineError> {
        let observables = self
            .config
            .observables
            .iter()
            .map(|&o| self.evaluate(&ObservableSeries::new(o.name(), table.series(o))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunVerdict {
            converged: !observables.is_empty() && observables.iter().all(|v| v.converged),
            statistical_inefficiency: observables
                .iter()
                .map(|v| v.statistical_inefficiency)
                .fold(1.0, f64::max),
            n_samples: table.len(),
            observables,
        })
    }
}

fn check_estimate(estimate: Estimate, n_samples: usize) -> Result<Estimate, EstimationError> {
    if estimate.equilibration_index > n_samples {
        return Err(EstimationError::InvalidResult(format!(
            "equilibration index {} beyond series of {} samples",
            estimate.equilibration_index, n_samples
        )));
    }
    let g = estimate.statistical_inefficiency;
    if !g.is_finite() || g < 1.0 {
        return Err(EstimationError::InvalidResult(format!(
            "statistical inefficiency {} is not >= 1",
            g
        )));
    }
    let ess = estimate.effective_sample_size;
    if !ess.is_finite() || ess < 0.0 {
        return Err(EstimationError::InvalidResult(format!(
            "effective sample size {} is not >= 0",
            ess
        )));
    }
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::statistics::{Observable, StatisticsRow};
    use crate::core::timeseries::BuiltinEstimator;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Returns a fixed estimate per strategy regardless of the series.
    struct FixedEstimator;

    impl Estimator for FixedEstimator {
        fn estimate(
            &self,
            series: &[f64],
            strategy: EstimatorStrategy,
        ) -> Result<Estimate, EstimationError> {
            let n = series.len() as f64;
            Ok(match strategy {
                EstimatorStrategy::Window => Estimate {
                    equilibration_index: 10,
                    statistical_inefficiency: 1.5,
                    effective_sample_size: (n - 10.0) / 1.5,
                },
                EstimatorStrategy::InitialSequence => Estimate {
                    equilibration_index: 20,
                    statistical_inefficiency: 2.5,
                    effective_sample_size: (n - 20.0) / 2.5,
                },
                EstimatorStrategy::PositiveSequence => Estimate {
                    equilibration_index: 5,
                    statistical_inefficiency: 2.0,
                    effective_sample_size: (n - 5.0) / 2.0,
                },
            })
        }
    }

    struct BrokenEstimator;

    impl Estimator for BrokenEstimator {
        fn estimate(&self, _: &[f64], _: EstimatorStrategy) -> Result<Estimate, EstimationError> {
            Ok(Estimate {
                equilibration_index: 0,
                statistical_inefficiency: 0.5,
                effective_sample_size: 1.0,
            })
        }
    }

    fn config(policy: ConvergencePolicy, required: f64) -> ConvergenceConfig {
        ConvergenceConfig {
            policy,
            required_samples: required,
            strategies: EstimatorStrategy::ALL.to_vec(),
            observables: vec![Observable::PotentialEnergy, Observable::Density],
        }
    }

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn combines_strategies_conservatively() {
        let detector =
            ConvergenceDetector::new(FixedEstimator, config(ConvergencePolicy::ThroughputNormalized, 100.0));
        let verdict = detector
            .evaluate(&ObservableSeries::new("x", vec![0.0; 320]))
            .unwrap();
        assert_eq!(verdict.equilibration_index, 20);
        assert_eq!(verdict.statistical_inefficiency, 2.5);
        assert_eq!(verdict.effective_sample_size, 120.0);
        // (320 - 20) / ceil(2.5) = 100
        assert_eq!(verdict.n_evaluator_samples, 100.0);
        assert!(verdict.converged);
        assert_eq!(verdict.estimates.len(), 3);
    }

    #[test]
    fn throughput_policy_is_stricter_than_ess_floor() {
        let series = ObservableSeries::new("x", vec![0.0; 300]);
        let floor = ConvergenceDetector::new(
            FixedEstimator,
            config(ConvergencePolicy::EffectiveSampleFloor, 100.0),
        );
        let throughput = ConvergenceDetector::new(
            FixedEstimator,
            config(ConvergencePolicy::ThroughputNormalized, 100.0),
        );
        // min ESS = 280 / 2.5 = 112; n_eval = 280 / 3 = 93.3
        assert!(floor.evaluate(&series).unwrap().converged);
        assert!(!throughput.evaluate(&series).unwrap().converged);
    }

    #[test]
    fn empty_series_is_not_converged() {
        let detector =
            ConvergenceDetector::new(FixedEstimator, config(ConvergencePolicy::EffectiveSampleFloor, 0.0));
        let verdict = detector.evaluate(&ObservableSeries::new("x", vec![])).unwrap();
        assert!(!verdict.converged);
        assert_eq!(verdict.n_samples, 0);
    }

    #[test]
    fn invalid_estimator_output_is_an_error() {
        let detector =
            ConvergenceDetector::new(BrokenEstimator, config(ConvergencePolicy::ThroughputNormalized, 1.0));
        let result = detector.evaluate(&ObservableSeries::new("density", vec![1.0; 10]));
        assert!(matches!(result, Err(EngineError::Estimation { .. })));
    }

    #[test]
    fn run_requires_every_observable_to_converge() {
        let detector = ConvergenceDetector::new(
            BuiltinEstimator::default(),
            config(ConvergencePolicy::ThroughputNormalized, 100.0),
        );
        let potential = noise(1000, 1);
        // Density keeps drifting for the whole run.
        let rows = potential
            .iter()
            .enumerate()
            .map(|(i, &u)| StatisticsRow {
                step: (i as u64 + 1) * 1000,
                potential_energy: u,
                kinetic_energy: 0.0,
                total_energy: u,
                temperature: 298.0,
                volume: 30.0,
                density: i as f64,
                speed: 100.0,
            })
            .collect();
        let verdict = detector
            .evaluate_table(&StatisticsTable::from_rows(rows))
            .unwrap();
        assert!(verdict.observables[0].converged);
        assert!(!verdict.observables[1].converged);
        assert!(!verdict.converged);
        assert!(verdict.statistical_inefficiency >= verdict.observables[1].statistical_inefficiency);
    }

    #[test]
    fn extending_a_converged_series_stays_converged() {
        let detector = ConvergenceDetector::new(
            BuiltinEstimator::default(),
            config(ConvergencePolicy::ThroughputNormalized, 100.0),
        );
        let full = noise(4000, 42);
        let prefix = ObservableSeries::new("u", full[..2000].to_vec());
        let extended = ObservableSeries::new("u", full);
        assert!(detector.evaluate(&prefix).unwrap().converged);
        assert!(detector.evaluate(&extended).unwrap().converged);
    }
}
