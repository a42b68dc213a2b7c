use std::collections::HashSet;
use std::path::Path;

use crate::error::{OrchestratorError, Result};
use crate::models::LauncherConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ddistro/ddistro.yaml";

/// Load the config at `path`, which must exist.
pub fn load(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        return Err(OrchestratorError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Load an explicitly requested config, or the default location, or the
/// built-in service table when neither exists.
pub fn load_or_default(explicit: Option<&Path>) -> Result<LauncherConfig> {
    if let Some(path) = explicit {
        return load(path);
    }
    match load(Path::new(DEFAULT_CONFIG_PATH)) {
        Ok(config) => Ok(config),
        Err(OrchestratorError::ConfigNotFound(path)) => {
            tracing::debug!(path = %path.display(), "no config file, using built-in services");
            Ok(LauncherConfig::default())
        }
        Err(e) => Err(e),
    }
}

pub fn parse(contents: &str) -> Result<LauncherConfig> {
    let config: LauncherConfig = serde_yaml::from_str(contents)
        .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &LauncherConfig) -> Result<()> {
    if config.probe.max_attempts == 0 {
        return Err(OrchestratorError::InvalidConfig(
            "probe.max_attempts must be at least 1".into(),
        ));
    }
    if let Some(user) = &config.run_as {
        if user.trim().is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "run_as must not be empty".into(),
            ));
        }
    }

    let mut names = HashSet::new();
    let mut ports = HashSet::new();
    for service in &config.services {
        if service.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "service name is required".into(),
            ));
        }
        if service.start_command.trim().is_empty() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "service '{}' has no start_command",
                service.name
            )));
        }
        if service.check_port == 0 {
            return Err(OrchestratorError::InvalidConfig(format!(
                "service '{}' has check_port 0",
                service.name
            )));
        }
        if !names.insert(service.name.as_str()) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "duplicate service name '{}'",
                service.name
            )));
        }
        if !ports.insert(service.check_port) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "port {} is used by more than one service",
                service.check_port
            )));
        }
    }
    Ok(())
}
