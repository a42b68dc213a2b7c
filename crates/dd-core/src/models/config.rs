use serde::{Deserialize, Serialize};

use super::service::ServiceSpec;

const DEFAULT_RUN_AS: &str = "dwemer";
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// How the prober decides that a port has a listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    /// Read the kernel's TCP socket table and look for a LISTEN entry.
    #[default]
    SocketTable,
    /// Attempt a TCP connection to the loopback address.
    Connect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
    #[serde(default)]
    pub method: ProbeMethod,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            deadline_secs: None,
            method: ProbeMethod::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Top-level launcher configuration, usually read from `ddistro.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// OS user the start commands run as. `None` runs them as the current user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as: Option<String>,
    /// Fixed advertised address; skips `hostname -I` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_address: Option<String>,
    #[serde(default)]
    pub probe: ProbeSettings,
    /// OS services started before the batch and stopped on shutdown.
    #[serde(default)]
    pub system_services: Vec<String>,
    pub services: Vec<ServiceSpec>,
}

impl LauncherConfig {
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl Default for LauncherConfig {
    /// The stock DwemerDistro service table.
    fn default() -> Self {
        let service = |name: &str, dir: &str, port: u16| ServiceSpec {
            name: name.to_string(),
            start_command: format!("/home/dwemer/{dir}/start.sh"),
            check_port: port,
            required: false,
            log_file: Some(format!("/home/dwemer/{dir}/log.txt").into()),
        };
        Self {
            run_as: Some(DEFAULT_RUN_AS.to_string()),
            host_address: None,
            probe: ProbeSettings::default(),
            system_services: vec!["apache2".into(), "postgresql".into()],
            services: vec![
                service("minime-t5", "minime-t5", 8082),
                service("xtts", "xtts-api-server", 8020),
                service("mimic3", "mimic3", 59125),
                service("melotts", "MeloTTS", 8084),
                service("whisper", "remote-faster-whisper", 9876),
                service("zonos", "Zonos", 7860),
            ],
        }
    }
}
