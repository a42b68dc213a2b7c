use std::future::Future;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{LaunchEvent, LauncherConfig, ServiceSpec, ServiceStatus};

use super::listeners::ListenerProbe;
use super::prober::PortProber;
use super::system;

/// Starts one service and reports how far it got.
pub trait Launch {
    fn launch(
        &self,
        spec: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> impl Future<Output = ServiceStatus>;
}

enum StartFailure {
    Exited {
        code: Option<i32>,
        process_group: Option<i32>,
    },
    Cancelled,
}

/// Runs a service's start command, then waits for its port.
pub struct ServiceLauncher<P> {
    prober: PortProber<P>,
    run_as: Option<String>,
    events: mpsc::UnboundedSender<LaunchEvent>,
}

/// The service user start commands actually run as.
///
/// Launch and shutdown must agree on this: when it is `None` the services run
/// as the current user and shutdown terminates their process groups instead
/// of everything the configured user owns.
pub fn effective_run_as(config: &LauncherConfig) -> Option<String> {
    resolve_run_as(config.run_as.as_deref(), is_root())
}

fn resolve_run_as(configured: Option<&str>, root: bool) -> Option<String> {
    match configured {
        Some(user) if root => Some(user.to_string()),
        Some(user) => {
            // su would prompt for a password
            tracing::warn!(user, "not running as root, start commands run as current user");
            None
        }
        None => None,
    }
}

impl<P: ListenerProbe> ServiceLauncher<P> {
    /// `run_as` is used as given; pass [`effective_run_as`].
    pub fn new(
        prober: PortProber<P>,
        run_as: Option<String>,
        events: mpsc::UnboundedSender<LaunchEvent>,
    ) -> Self {
        Self {
            prober,
            run_as,
            events,
        }
    }

    fn emit(&self, event: LaunchEvent) {
        let _ = self.events.send(event);
    }

    async fn run_start_command(
        &self,
        spec: &ServiceSpec,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<i32>, StartFailure> {
        let (program, args) = build_command(&spec.start_command, self.run_as.as_deref());
        let mut cmd = Command::new(program);
        cmd.args(&args);
        cmd.kill_on_drop(true);
        // daemons left behind by start.sh stay in this group
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(service = %spec.name, error = %e, "failed to spawn start command");
            StartFailure::Exited {
                code: None,
                process_group: None,
            }
        })?;
        let process_group = child.id().and_then(|pid| i32::try_from(pid).ok());

        tokio::select! {
            _ = cancel.cancelled() => {
                if let Some(pgid) = process_group {
                    if let Err(e) = system::kill_process_group(pgid) {
                        tracing::warn!(service = %spec.name, pgid, error = %e, "could not terminate start command group");
                    }
                }
                let _ = child.kill().await;
                Err(StartFailure::Cancelled)
            }
            status = child.wait() => match status {
                Ok(status) if status.success() => Ok(process_group),
                Ok(status) => Err(StartFailure::Exited {
                    code: status.code(),
                    process_group,
                }),
                Err(e) => {
                    tracing::error!(service = %spec.name, error = %e, "failed to wait for start command");
                    Err(StartFailure::Exited {
                        code: None,
                        process_group,
                    })
                }
            },
        }
    }
}

impl<P: ListenerProbe> Launch for ServiceLauncher<P> {
    async fn launch(&self, spec: &ServiceSpec, cancel: &CancellationToken) -> ServiceStatus {
        let spec = spec.clone();
        if spec.locate_start_artifact().is_none() {
            let artifact = spec.start_artifact().unwrap_or_default();
            tracing::info!(service = %spec.name, artifact = %artifact, "start artifact missing, service disabled");
            self.emit(LaunchEvent::ServiceSkipped {
                name: spec.name.clone(),
                artifact,
            });
            return ServiceStatus::disabled(spec);
        }

        tracing::info!(service = %spec.name, port = spec.check_port, "starting service");
        self.emit(LaunchEvent::ServiceStarting {
            name: spec.name.clone(),
            port: spec.check_port,
        });

        let process_group = match self.run_start_command(&spec, cancel).await {
            Ok(process_group) => process_group,
            Err(StartFailure::Cancelled) => {
                self.emit(LaunchEvent::ServiceCancelled {
                    name: spec.name.clone(),
                });
                return ServiceStatus::cancelled(spec, false, 0);
            }
            Err(StartFailure::Exited {
                code: exit_code,
                process_group,
            }) => {
                tracing::error!(service = %spec.name, exit_code = ?exit_code, "start command failed");
                self.emit(LaunchEvent::LaunchFailed {
                    name: spec.name.clone(),
                    exit_code,
                });
                return ServiceStatus::launch_failed(spec, exit_code)
                    .with_process_group(process_group);
            }
        };

        let max_attempts = self.prober.policy().max_attempts;
        let outcome = self
            .prober
            .wait_for_port(spec.check_port, cancel, |attempt| {
                self.emit(LaunchEvent::ProbeAttempt {
                    name: spec.name.clone(),
                    port: spec.check_port,
                    attempt,
                    max_attempts,
                });
            })
            .await;

        if outcome.cancelled {
            self.emit(LaunchEvent::ServiceCancelled {
                name: spec.name.clone(),
            });
            return ServiceStatus::cancelled(spec, true, outcome.attempts)
                .with_process_group(process_group);
        }

        if outcome.reachable {
            tracing::info!(service = %spec.name, port = spec.check_port, attempts = outcome.attempts, "service ready");
            self.emit(LaunchEvent::ServiceReady {
                name: spec.name.clone(),
                port: spec.check_port,
                attempts: outcome.attempts,
            });
        } else {
            tracing::warn!(service = %spec.name, port = spec.check_port, attempts = outcome.attempts, "service did not open its port");
            self.emit(LaunchEvent::ServiceUnreachable {
                name: spec.name.clone(),
                port: spec.check_port,
                attempts: outcome.attempts,
            });
        }
        ServiceStatus::probed(spec, outcome.reachable, outcome.attempts)
            .with_process_group(process_group)
    }
}

/// Program and arguments for a start command, optionally under another user.
pub fn build_command(start_command: &str, run_as: Option<&str>) -> (String, Vec<String>) {
    match run_as {
        Some(user) => (
            "su".to_string(),
            vec![user.to_string(), "-c".to_string(), start_command.to_string()],
        ),
        None => (
            "sh".to_string(),
            vec!["-c".to_string(), start_command.to_string()],
        ),
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
