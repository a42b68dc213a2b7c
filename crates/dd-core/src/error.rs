use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("system service operation failed: {0}")]
    SystemService(String),

    #[error("host address resolution failed: {0}")]
    AddressResolution(String),

    #[error("state persistence failed: {0}")]
    State(String),

    #[error("process failed: {0}")]
    Process(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
