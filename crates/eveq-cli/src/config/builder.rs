use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, EngineSettings};
use crate::cli::EquilibrateArgs;
use crate::error::{CliError, Result};
use eveq::engine::config as core_config;
use serde::de::DeserializeOwned;
use std::str::FromStr;

pub fn build_config(args: &EquilibrateArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let eq_file = file_config.equilibration.take().unwrap_or_default();
    let sim_file = file_config.simulation.take().unwrap_or_default();
    let conv_file = file_config.convergence.take().unwrap_or_default();
    let engine_file = file_config.engine.take().unwrap_or_default();

    let max_iterations = args
        .max_iterations
        .or(eq_file.max_iterations)
        .unwrap_or(defaults.max_iterations);

    let core_config = core_config::EquilibrationConfigBuilder::new()
        .max_iterations(max_iterations)
        .policy(conv_file.policy.unwrap_or(defaults.policy))
        .required_samples(conv_file.required_samples.unwrap_or(defaults.required_samples))
        .strategies(conv_file.strategies.unwrap_or(defaults.strategies))
        .observables(conv_file.observables.unwrap_or(defaults.observables))
        .steps_per_iteration(
            sim_file
                .steps_per_iteration
                .unwrap_or(defaults.steps_per_iteration),
        )
        .timestep_fs(sim_file.timestep_fs.unwrap_or(defaults.timestep_fs))
        .report_interval(sim_file.report_interval.unwrap_or(defaults.report_interval))
        .source_calculation_id(
            eq_file
                .source_calculation_id
                .unwrap_or(defaults.source_calculation_id),
        )
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let program = args.engine.clone().or(engine_file.program).ok_or_else(|| {
        CliError::Config(
            "An engine driver is required either via --engine or `engine.program` in the config file."
                .to_string(),
        )
    })?;
    let engine_args = if args.engine_args.is_empty() {
        engine_file.args.unwrap_or_default()
    } else {
        args.engine_args.clone()
    };

    Ok(AppConfig {
        core_config,
        engine: EngineSettings {
            program,
            args: engine_args,
            force_field: engine_file.force_field.unwrap_or(defaults.force_field),
        },
    })
}

fn parse_scalar<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

/// Parses a comma separated list of kebab-case names, e.g. `window,positive-sequence`.
fn parse_list<T: DeserializeOwned>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            serde_json::from_value(serde_json::Value::String(item.to_string()))
                .map_err(|_| CliError::Config(format!("Invalid entry for {}: {}", key, item)))
        })
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "equilibration.max-iterations" => {
                config
                    .equilibration
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_scalar(key, value_str, "integer")?);
            }
            "equilibration.source-calculation-id" => {
                config
                    .equilibration
                    .get_or_insert_with(Default::default)
                    .source_calculation_id = Some(value_str.to_string());
            }
            "simulation.steps-per-iteration" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .steps_per_iteration = Some(parse_scalar(key, value_str, "integer")?);
            }
            "simulation.timestep-fs" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .timestep_fs = Some(parse_scalar(key, value_str, "float")?);
            }
            "simulation.report-interval" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .report_interval = Some(parse_scalar(key, value_str, "integer")?);
            }
            "convergence.policy" => {
                let mut policy = parse_list::<core_config::ConvergencePolicy>(key, value_str)?;
                if policy.len() != 1 {
                    return Err(CliError::Config(format!(
                        "Expected exactly one policy for {}: {}",
                        key, value_str
                    )));
                }
                config
                    .convergence
                    .get_or_insert_with(Default::default)
                    .policy = policy.pop();
            }
            "convergence.required-samples" => {
                config
                    .convergence
                    .get_or_insert_with(Default::default)
                    .required_samples = Some(parse_scalar(key, value_str, "float")?);
            }
            "convergence.strategies" => {
                config
                    .convergence
                    .get_or_insert_with(Default::default)
                    .strategies = Some(parse_list(key, value_str)?);
            }
            "convergence.observables" => {
                config
                    .convergence
                    .get_or_insert_with(Default::default)
                    .observables = Some(parse_list(key, value_str)?);
            }
            "engine.force-field" => {
                config
                    .engine
                    .get_or_insert_with(Default::default)
                    .force_field = Some(value_str.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
