use eveq::engine::config::EquilibrationConfig;
use std::path::PathBuf;

/// How to reach the external simulation driver.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub force_field: String,
}

pub struct AppConfig {
    pub core_config: EquilibrationConfig,
    pub engine: EngineSettings,
}
