use crate::core::io::statistics::Observable;
use crate::core::timeseries::EstimatorStrategy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SOURCE_CALCULATION_ID: &str = "eveq";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// How the combined estimator output is turned into a pass/fail decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergencePolicy {
    /// Converged once the smallest effective sample size reaches the target.
    EffectiveSampleFloor,
    /// Converged once `(n - max_index) / ceil(max_inefficiency)` reaches the
    /// target.
    #[default]
    ThroughputNormalized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceConfig {
    pub policy: ConvergencePolicy,
    pub required_samples: f64,
    pub strategies: Vec<EstimatorStrategy>,
    pub observables: Vec<Observable>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub steps_per_iteration: u64,
    pub timestep_fs: f64,
    pub report_interval: u64,
}

impl SimulationConfig {
    /// Simulated time covered by one iteration, in picoseconds.
    pub fn iteration_length_ps(&self) -> f64 {
        self.steps_per_iteration as f64 * self.timestep_fs / 1000.0
    }

    pub fn samples_per_iteration(&self) -> u64 {
        self.steps_per_iteration / self.report_interval
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquilibrationConfig {
    pub max_iterations: usize,
    pub convergence: ConvergenceConfig,
    pub simulation: SimulationConfig,
    pub source_calculation_id: String,
}

#[derive(Default)]
pub struct EquilibrationConfigBuilder {
    max_iterations: Option<usize>,
    policy: Option<ConvergencePolicy>,
    required_samples: Option<f64>,
    strategies: Option<Vec<EstimatorStrategy>>,
    observables: Option<Vec<Observable>>,
    steps_per_iteration: Option<u64>,
    timestep_fs: Option<f64>,
    report_interval: Option<u64>,
    source_calculation_id: Option<String>,
}

impl EquilibrationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn policy(mut self, policy: ConvergencePolicy) -> Self {
        self.policy = Some(policy);
        self
    }
    pub fn required_samples(mut self, samples: f64) -> Self {
        self.required_samples = Some(samples);
        self
    }
    pub fn strategies(mut self, strategies: Vec<EstimatorStrategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }
    pub fn observables(mut self, observables: Vec<Observable>) -> Self {
        self.observables = Some(observables);
        self
    }
    pub fn steps_per_iteration(mut self, steps: u64) -> Self {
        self.steps_per_iteration = Some(steps);
        self
    }
    pub fn timestep_fs(mut self, timestep: f64) -> Self {
        self.timestep_fs = Some(timestep);
        self
    }
    pub fn report_interval(mut self, interval: u64) -> Self {
        self.report_interval = Some(interval);
        self
    }
    pub fn source_calculation_id(mut self, id: impl Into<String>) -> Self {
        self.source_calculation_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<EquilibrationConfig, ConfigError> {
        let convergence = ConvergenceConfig {
            policy: self.policy.unwrap_or_default(),
            required_samples: self
                .required_samples
                .ok_or(ConfigError::MissingParameter("required_samples"))?,
            strategies: self
                .strategies
                .ok_or(ConfigError::MissingParameter("strategies"))?,
            observables: self
                .observables
                .ok_or(ConfigError::MissingParameter("observables"))?,
        };
        let simulation = SimulationConfig {
            steps_per_iteration: self
                .steps_per_iteration
                .ok_or(ConfigError::MissingParameter("steps_per_iteration"))?,
            timestep_fs: self
                .timestep_fs
                .ok_or(ConfigError::MissingParameter("timestep_fs"))?,
            report_interval: self
                .report_interval
                .ok_or(ConfigError::MissingParameter("report_interval"))?,
        };
        let config = EquilibrationConfig {
            max_iterations: self
                .max_iterations
                .ok_or(ConfigError::MissingParameter("max_iterations"))?,
            convergence,
            simulation,
            source_calculation_id: self
                .source_calculation_id
                .unwrap_or_else(|| DEFAULT_SOURCE_CALCULATION_ID.to_string()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl EquilibrationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.convergence;
        if !c.required_samples.is_finite() || c.required_samples < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "required_samples",
                reason: format!("must be a non-negative number, got {}", c.required_samples),
            });
        }
        if c.strategies.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "strategies",
                reason: "at least one estimator strategy is required".to_string(),
            });
        }
        if c.observables.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "observables",
                reason: "at least one observable must be tracked".to_string(),
            });
        }
        let s = &self.simulation;
        if s.steps_per_iteration == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "steps_per_iteration",
                reason: "must be positive".to_string(),
            });
        }
        if !(s.timestep_fs.is_finite() && s.timestep_fs > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "timestep_fs",
                reason: format!("must be positive, got {}", s.timestep_fs),
            });
        }
        if s.report_interval == 0 || s.report_interval > s.steps_per_iteration {
            return Err(ConfigError::InvalidValue {
                parameter: "report_interval",
                reason: format!(
                    "must be between 1 and steps_per_iteration ({}), got {}",
                    s.steps_per_iteration, s.report_interval
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> EquilibrationConfigBuilder {
        EquilibrationConfigBuilder::new()
            .max_iterations(2000)
            .required_samples(100.0)
            .strategies(EstimatorStrategy::ALL.to_vec())
            .observables(vec![Observable::PotentialEnergy, Observable::Density])
            .steps_per_iteration(100_000)
            .timestep_fs(2.0)
            .report_interval(1000)
    }

    #[test]
    fn build_applies_defaults_for_optional_fields() {
        let config = complete().build().unwrap();
        assert_eq!(config.convergence.policy, ConvergencePolicy::ThroughputNormalized);
        assert_eq!(config.source_calculation_id, "eveq");
        assert_eq!(config.simulation.iteration_length_ps(), 200.0);
        assert_eq!(config.simulation.samples_per_iteration(), 100);
    }

    #[test]
    fn build_reports_missing_parameters() {
        let result = EquilibrationConfigBuilder::new()
            .required_samples(100.0)
            .strategies(EstimatorStrategy::ALL.to_vec())
            .observables(vec![Observable::Density])
            .steps_per_iteration(10)
            .timestep_fs(2.0)
            .report_interval(1)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("max_iterations")));
    }

    #[test]
    fn build_rejects_inconsistent_values() {
        assert!(matches!(
            complete().report_interval(200_000).build(),
            Err(ConfigError::InvalidValue { parameter: "report_interval", .. })
        ));
        assert!(matches!(
            complete().strategies(vec![]).build(),
            Err(ConfigError::InvalidValue { parameter: "strategies", .. })
        ));
    }
}
