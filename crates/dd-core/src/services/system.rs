//! OS-level collaborators: init-style system services and the service user's
//! processes. All of these are best effort; failures are logged and returned,
//! never allowed to stop startup or shutdown.

use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::{OrchestratorError, Result};
use crate::models::LaunchEvent;

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| OrchestratorError::SystemService(format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OrchestratorError::SystemService(format!(
            "{program} {} failed (exit {}): {}",
            args.join(" "),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub async fn start_service(name: &str) -> Result<()> {
    run_command("service", &[name, "start"]).await?;
    Ok(())
}

pub async fn stop_service(name: &str) -> Result<()> {
    run_command("service", &[name, "stop"]).await?;
    Ok(())
}

/// Terminate every process owned by `user`.
///
/// `pkill` exits 1 when nothing matched, which is not an error here.
pub async fn kill_user_processes(user: &str) -> Result<()> {
    let status = Command::new("pkill")
        .args(["-u", user])
        .status()
        .await
        .map_err(|e| OrchestratorError::SystemService(format!("failed to run pkill: {e}")))?;
    match status.code() {
        Some(0) | Some(1) => Ok(()),
        code => Err(OrchestratorError::SystemService(format!(
            "pkill -u {user} failed (exit {})",
            code.unwrap_or(-1)
        ))),
    }
}

/// Send SIGTERM to a start command's process group.
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn kill_process_group(pgid: i32) -> Result<()> {
    if pgid <= 1 {
        return Err(OrchestratorError::SystemService(format!(
            "refusing to signal process group {pgid}"
        )));
    }
    // SAFETY: killpg only sends a signal; pgid was checked above.
    if unsafe { libc::killpg(pgid, libc::SIGTERM) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(OrchestratorError::SystemService(format!(
        "killpg {pgid} failed: {err}"
    )))
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: i32) -> Result<()> {
    Ok(())
}

/// Start each named system service in order, reporting progress as events.
///
/// Returns the names of services that failed to start.
pub async fn start_services(
    names: &[String],
    events: &mpsc::UnboundedSender<LaunchEvent>,
) -> Vec<String> {
    let mut failed = Vec::new();
    for name in names {
        match start_service(name).await {
            Ok(()) => {
                tracing::info!(service = %name, "system service started");
                let _ = events.send(LaunchEvent::SystemServiceStarted { name: name.clone() });
            }
            Err(e) => {
                tracing::warn!(service = %name, error = %e, "system service failed to start");
                let _ = events.send(LaunchEvent::SystemServiceFailed {
                    name: name.clone(),
                    error: e.to_string(),
                });
                failed.push(name.clone());
            }
        }
    }
    failed
}

/// Stop system services and terminate what the start commands left running.
///
/// `run_as` must be the user the services actually ran as; its processes are
/// killed with `pkill -u`. The recorded start command process groups are
/// signalled either way. Every step runs even if an earlier one fails; the
/// errors are returned.
pub async fn shutdown(
    system_services: &[String],
    run_as: Option<&str>,
    process_groups: &[i32],
) -> Vec<OrchestratorError> {
    let mut errors = Vec::new();

    for &pgid in process_groups {
        tracing::info!(pgid, "terminating start command process group");
        if let Err(e) = kill_process_group(pgid) {
            tracing::warn!(pgid, error = %e, "could not terminate process group");
            errors.push(e);
        }
    }

    if let Some(user) = run_as {
        tracing::info!(user, "terminating service processes");
        if let Err(e) = kill_user_processes(user).await {
            tracing::warn!(user, error = %e, "could not terminate service processes");
            errors.push(e);
        }
    }

    for name in system_services {
        tracing::info!(service = %name, "stopping system service");
        if let Err(e) = stop_service(name).await {
            tracing::warn!(service = %name, error = %e, "could not stop system service");
            errors.push(e);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_command_captures_stdout() {
        let out = run_command("sh", &["-c", "echo ready"]).await.unwrap();
        assert_eq!(out, "ready");
    }

    #[tokio::test]
    async fn run_command_reports_exit_code() {
        let err = run_command("sh", &["-c", "echo nope >&2; exit 4"])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exit 4"), "{message}");
        assert!(message.contains("nope"), "{message}");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let err = run_command("ddistro-no-such-program", &[]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::SystemService(_)));
    }

    #[tokio::test]
    async fn shutdown_without_work_has_no_errors() {
        assert!(shutdown(&[], None, &[]).await.is_empty());
    }

    fn spawn_in_own_group(script: &str) -> std::process::Child {
        use std::os::unix::process::CommandExt;
        std::process::Command::new("sh")
            .args(["-c", script])
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[test]
    fn killing_a_process_group_terminates_its_members() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = spawn_in_own_group("sleep 30");
        let pgid = child.id() as i32;

        kill_process_group(pgid).unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn vanished_process_group_is_not_an_error() {
        let mut child = spawn_in_own_group("exit 0");
        let pgid = child.id() as i32;
        child.wait().unwrap();

        kill_process_group(pgid).unwrap();
    }

    #[test]
    fn own_or_init_group_is_refused() {
        assert!(kill_process_group(0).is_err());
        assert!(kill_process_group(1).is_err());
    }

    #[tokio::test]
    async fn shutdown_terminates_recorded_groups_without_a_service_user() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = spawn_in_own_group("sleep 30");
        let pgid = child.id() as i32;

        let errors = shutdown(&[], None, &[pgid]).await;

        assert!(errors.is_empty(), "{errors:?}");
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }
}
