use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One launchable unit: a start command and the TCP port that proves it is up.
///
/// Serialized camelCase alongside the run report; the snake_case spellings
/// used in `ddistro.yaml` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub name: String,
    /// Shell command line run through `sh -c`. Its first word (quotes allowed,
    /// e.g. `"/home/dwemer/My Dir/start.sh"`) is the start artifact: an
    /// absolute or relative script path, or a bare program found on `PATH`.
    #[serde(alias = "start_command")]
    pub start_command: String,
    #[serde(alias = "check_port")]
    pub check_port: u16,
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "log_file", skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl ServiceSpec {
    /// The script or program the start command runs: its first word, unquoted.
    pub fn start_artifact(&self) -> Option<String> {
        first_word(&self.start_command)
    }

    /// Where the start artifact lives, or `None` if it is not installed.
    ///
    /// Words containing a `/` are checked as paths; bare names are looked up
    /// on `PATH` like the shell would.
    pub fn locate_start_artifact(&self) -> Option<PathBuf> {
        let artifact = self.start_artifact()?;
        if artifact.contains('/') {
            let path = PathBuf::from(artifact);
            return path.exists().then_some(path);
        }
        let search_path = std::env::var_os("PATH")?;
        std::env::split_paths(&search_path)
            .map(|dir| dir.join(&artifact))
            .find(|candidate| candidate.is_file())
    }
}

fn first_word(command: &str) -> Option<String> {
    let trimmed = command.trim_start();
    let quote = trimmed.chars().next()?;
    if quote == '"' || quote == '\'' {
        let rest = &trimmed[1..];
        let word = match rest.find(quote) {
            Some(end) => &rest[..end],
            None => rest,
        };
        return (!word.is_empty()).then(|| word.to_string());
    }
    trimmed.split_whitespace().next().map(str::to_string)
}

/// Terminal state of one service after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceOutcome {
    Ready,
    /// Start artifact not found; never launched.
    Disabled,
    LaunchFailed {
        #[serde(
            default,
            rename = "exitCode",
            alias = "exit_code",
            skip_serializing_if = "Option::is_none"
        )]
        exit_code: Option<i32>,
    },
    /// Launched, but no listener appeared within the retry budget.
    Unreachable,
    Cancelled,
}

impl ServiceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceOutcome::Ready => "ready",
            ServiceOutcome::Disabled => "disabled",
            ServiceOutcome::LaunchFailed { .. } => "launch failed",
            ServiceOutcome::Unreachable => "unreachable",
            ServiceOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub spec: ServiceSpec,
    pub started: bool,
    pub reachable: bool,
    pub outcome: ServiceOutcome,
    pub probe_attempts: u32,
    /// Process group of the start command, used to terminate what it left
    /// running when no service user is in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_group: Option<i32>,
}

impl ServiceStatus {
    pub fn disabled(spec: ServiceSpec) -> Self {
        Self {
            spec,
            started: false,
            reachable: false,
            outcome: ServiceOutcome::Disabled,
            probe_attempts: 0,
            process_group: None,
        }
    }

    pub fn launch_failed(spec: ServiceSpec, exit_code: Option<i32>) -> Self {
        Self {
            spec,
            started: false,
            reachable: false,
            outcome: ServiceOutcome::LaunchFailed { exit_code },
            probe_attempts: 0,
            process_group: None,
        }
    }

    pub fn cancelled(spec: ServiceSpec, started: bool, probe_attempts: u32) -> Self {
        Self {
            spec,
            started,
            reachable: false,
            outcome: ServiceOutcome::Cancelled,
            probe_attempts,
            process_group: None,
        }
    }

    /// Status of a launched service after probing its port.
    pub fn probed(spec: ServiceSpec, reachable: bool, probe_attempts: u32) -> Self {
        Self {
            spec,
            started: true,
            reachable,
            outcome: if reachable {
                ServiceOutcome::Ready
            } else {
                ServiceOutcome::Unreachable
            },
            probe_attempts,
            process_group: None,
        }
    }

    pub fn with_process_group(mut self, process_group: Option<i32>) -> Self {
        self.process_group = process_group;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str) -> ServiceSpec {
        ServiceSpec {
            name: "xtts".into(),
            start_command: command.into(),
            check_port: 8020,
            required: false,
            log_file: None,
        }
    }

    #[test]
    fn start_artifact_is_first_token() {
        let s = spec("/home/dwemer/xtts-api-server/start.sh --deepspeed");
        assert_eq!(
            s.start_artifact().as_deref(),
            Some("/home/dwemer/xtts-api-server/start.sh")
        );
    }

    #[test]
    fn start_artifact_of_blank_command_is_none() {
        assert!(spec("   ").start_artifact().is_none());
        assert!(spec("\"\" --flag").start_artifact().is_none());
    }

    #[test]
    fn quoted_start_artifact_keeps_embedded_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("My Voices");
        std::fs::create_dir(&install).unwrap();
        let script = install.join("start.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let s = spec(&format!("\"{}\" --port 8020", script.display()));
        assert_eq!(s.start_artifact(), Some(script.display().to_string()));
        assert_eq!(s.locate_start_artifact(), Some(script.clone()));

        let single = spec(&format!("'{}'", script.display()));
        assert_eq!(single.locate_start_artifact(), Some(script));
    }

    #[test]
    fn bare_program_is_found_on_path() {
        // every supported host has a POSIX shell on PATH
        let s = spec("sh -c 'exec /home/dwemer/xtts-api-server/start.sh'");
        assert_eq!(s.start_artifact().as_deref(), Some("sh"));
        let found = s.locate_start_artifact().unwrap();
        assert!(found.ends_with("sh"));
        assert!(found.is_file());
    }

    #[test]
    fn missing_artifact_is_not_located() {
        assert!(spec("/nonexistent/dwemer/start.sh").locate_start_artifact().is_none());
        assert!(spec("no-such-program-ddistro --help").locate_start_artifact().is_none());
    }

    #[test]
    fn spec_reads_snake_case_and_writes_camel_case() {
        let parsed: ServiceSpec = serde_json::from_str(
            r#"{"name":"xtts","start_command":"/a","check_port":8020,"log_file":"/l"}"#,
        )
        .unwrap();
        assert_eq!(parsed.check_port, 8020);
        assert_eq!(parsed.log_file.as_deref(), Some(Path::new("/l")));

        let json = serde_json::to_string(&parsed).unwrap();
        assert!(json.contains(r#""startCommand":"/a""#));
        assert!(json.contains(r#""checkPort":8020"#));
        assert!(json.contains(r#""logFile":"/l""#));
        assert!(!json.contains('_'));
    }

    #[test]
    fn probed_status_maps_reachability_to_outcome() {
        let ready = ServiceStatus::probed(spec("/a"), true, 3);
        assert_eq!(ready.outcome, ServiceOutcome::Ready);
        assert!(ready.started);

        let down = ServiceStatus::probed(spec("/a"), false, 30);
        assert_eq!(down.outcome, ServiceOutcome::Unreachable);
        assert!(down.started);
        assert!(!down.reachable);
    }

    #[test]
    fn outcome_serializes_with_state_tag() {
        let json = serde_json::to_string(&ServiceOutcome::LaunchFailed { exit_code: Some(2) })
            .unwrap();
        assert_eq!(json, r#"{"state":"launch_failed","exitCode":2}"#);
        let json = serde_json::to_string(&ServiceOutcome::Disabled).unwrap();
        assert_eq!(json, r#"{"state":"disabled"}"#);
    }
}
