//! Sequential batch startup.
//!
//! Every service is launched and probed to completion before the next one
//! starts. Individual failures are recorded in the report and never stop the
//! batch; only cancellation does, and even then every remaining service still
//! gets a `cancelled` status so the report covers the whole list.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::models::{RunReport, ServiceSpec, ServiceStatus};

use super::host::{self, ResolveHost};
use super::launcher::Launch;

pub struct Orchestrator<L> {
    launcher: L,
}

impl<L: Launch> Orchestrator<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    /// Launch `specs` in declared order, then resolve the advertised address.
    pub async fn run<R: ResolveHost>(
        &self,
        specs: &[ServiceSpec],
        resolver: &R,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new(Utc::now());

        for spec in specs {
            if cancel.is_cancelled() {
                tracing::info!(service = %spec.name, "batch cancelled, not launching");
                report.push(ServiceStatus::cancelled(spec.clone(), false, 0));
                continue;
            }
            let status = self.launcher.launch(spec, cancel).await;
            tracing::debug!(service = %spec.name, outcome = status.outcome.label(), "service finished");
            report.push(status);
        }

        report.host_address = host::resolve_or_default(resolver).await;
        report.finished_at = Some(Utc::now());
        tracing::info!(
            available = report.available().len(),
            total = report.statuses.len(),
            "startup batch complete"
        );
        report
    }
}
