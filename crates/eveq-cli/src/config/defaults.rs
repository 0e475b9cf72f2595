use eveq::core::io::statistics::Observable;
use eveq::core::models::property::DEFAULT_BOX_MOLECULES;
use eveq::core::timeseries::EstimatorStrategy;
use eveq::engine::config::{ConvergencePolicy, DEFAULT_SOURCE_CALCULATION_ID};

pub struct DefaultsConfig {
    pub n_molecules: u64,
    pub max_iterations: usize,
    pub steps_per_iteration: u64,
    pub timestep_fs: f64,
    pub report_interval: u64,
    pub policy: ConvergencePolicy,
    pub required_samples: f64,
    pub strategies: Vec<EstimatorStrategy>,
    pub observables: Vec<Observable>,
    pub force_field: String,
    pub source_calculation_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            n_molecules: DEFAULT_BOX_MOLECULES,
            max_iterations: 2000,
            steps_per_iteration: 100_000,
            timestep_fs: 2.0,
            report_interval: 1000,
            policy: ConvergencePolicy::ThroughputNormalized,
            required_samples: 100.0,
            strategies: EstimatorStrategy::ALL.to_vec(),
            observables: vec![Observable::PotentialEnergy, Observable::Density],
            force_field: "openff-2.1.0.offxml".to_string(),
            source_calculation_id: DEFAULT_SOURCE_CALCULATION_ID.to_string(),
        }
    }
}
