use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::models::RunReport;

pub const DEFAULT_STATE_DIR: &str = "/var/lib/ddistro";

/// Persists the most recent run report as JSON.
pub struct ReportStore {
    report_path: PathBuf,
}

impl ReportStore {
    pub fn new(state_directory: &Path) -> Self {
        Self {
            report_path: state_directory.join("last-run.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.report_path
    }

    /// The last saved report, or `None` if no run has been recorded.
    pub async fn load(&self) -> Result<Option<RunReport>> {
        if !self.report_path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.report_path)
            .await
            .map_err(|e| OrchestratorError::State(format!("failed to read report file: {e}")))?;
        let report: RunReport = serde_json::from_str(&json)?;
        Ok(Some(report))
    }

    pub async fn save(&self, report: &RunReport) -> Result<()> {
        if let Some(parent) = self.report_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OrchestratorError::State(format!("failed to create state dir: {e}"))
            })?;
        }
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&self.report_path, json)
            .await
            .map_err(|e| OrchestratorError::State(format!("failed to write report file: {e}")))?;
        Ok(())
    }
}
