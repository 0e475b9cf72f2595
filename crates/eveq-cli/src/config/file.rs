use crate::error::{CliError, Result};
use eveq::core::io::statistics::Observable;
use eveq::core::timeseries::EstimatorStrategy;
use eveq::engine::config::ConvergencePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEquilibrationConfig {
    pub max_iterations: Option<usize>,
    pub source_calculation_id: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSimulationConfig {
    pub steps_per_iteration: Option<u64>,
    pub timestep_fs: Option<f64>,
    pub report_interval: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConvergenceConfig {
    pub policy: Option<ConvergencePolicy>,
    pub required_samples: Option<f64>,
    pub strategies: Option<Vec<EstimatorStrategy>>,
    pub observables: Option<Vec<Observable>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEngineConfig {
    pub program: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub force_field: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub equilibration: Option<FileEquilibrationConfig>,
    pub simulation: Option<FileSimulationConfig>,
    pub convergence: Option<FileConvergenceConfig>,
    pub engine: Option<FileEngineConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_every_section() {
        let config: FileConfig = toml::from_str(
            r#"
            [equilibration]
            max-iterations = 50
            source-calculation-id = "batch-7"

            [simulation]
            steps-per-iteration = 5000
            timestep-fs = 1.0
            report-interval = 50

            [convergence]
            policy = "effective-sample-floor"
            required-samples = 25.0
            strategies = ["window", "positive-sequence"]
            observables = ["potential-energy", "volume"]

            [engine]
            program = "/opt/driver/run"
            args = ["--platform", "CPU"]
            force-field = "custom.offxml"
            "#,
        )
        .unwrap();

        let eq = config.equilibration.unwrap();
        assert_eq!(eq.max_iterations, Some(50));
        assert_eq!(eq.source_calculation_id.as_deref(), Some("batch-7"));
        assert_eq!(config.simulation.unwrap().timestep_fs, Some(1.0));
        let convergence = config.convergence.unwrap();
        assert_eq!(convergence.policy, Some(ConvergencePolicy::EffectiveSampleFloor));
        assert_eq!(
            convergence.strategies,
            Some(vec![EstimatorStrategy::Window, EstimatorStrategy::PositiveSequence])
        );
        assert_eq!(
            convergence.observables,
            Some(vec![Observable::PotentialEnergy, Observable::Volume])
        );
        let engine = config.engine.unwrap();
        assert_eq!(engine.program, Some(PathBuf::from("/opt/driver/run")));
        assert_eq!(engine.force_field.as_deref(), Some("custom.offxml"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str(
            r#"
            [simulation]
            timestep = 2.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_file_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[equilibration\nmax-iterations = 3").unwrap();
        match FileConfig::from_file(&path) {
            Err(CliError::FileParsing { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
