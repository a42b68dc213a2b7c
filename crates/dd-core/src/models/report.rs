use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service::ServiceStatus;

/// Port the companion client talks to (the HerikaServer web front end).
pub const CLIENT_PORT: u16 = 8081;
/// Request path the companion client polls.
pub const CLIENT_PATH: &str = "/HerikaServer/comm.php";
/// Poll interval, in seconds, the companion client expects.
pub const CLIENT_POLL_INTERVAL: u32 = 1;
/// Configuration UI served next to the client endpoint.
pub const WEB_UI_PATH: &str = "/HerikaServer/ui/index.php";

/// A reachable service and the URL it is advertised under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub name: &'a str,
    pub url: String,
}

/// End-of-batch summary, in launch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub host_address: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub statuses: Vec<ServiceStatus>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            host_address: String::new(),
            started_at,
            finished_at: None,
            statuses: Vec::new(),
        }
    }

    pub fn push(&mut self, status: ServiceStatus) {
        self.statuses.push(status);
    }

    pub fn endpoint_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.host_address)
    }

    /// Services confirmed reachable, with their public URL.
    pub fn available(&self) -> Vec<Endpoint<'_>> {
        self.statuses
            .iter()
            .filter(|s| s.reachable)
            .map(|s| Endpoint {
                name: &s.spec.name,
                url: self.endpoint_url(s.spec.check_port),
            })
            .collect()
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.statuses.iter().filter(|s| !s.reachable)
    }

    /// Required services that did not come up.
    pub fn required_failures(&self) -> Vec<&ServiceStatus> {
        self.statuses
            .iter()
            .filter(|s| s.spec.required && !s.reachable)
            .collect()
    }

    pub fn total_probe_attempts(&self) -> u32 {
        self.statuses.iter().map(|s| s.probe_attempts).sum()
    }

    /// Process groups of every start command that ran, in launch order.
    pub fn process_groups(&self) -> Vec<i32> {
        self.statuses
            .iter()
            .filter_map(|s| s.process_group)
            .collect()
    }

    pub fn web_ui_url(&self) -> String {
        format!("{}{WEB_UI_PATH}", self.endpoint_url(CLIENT_PORT))
    }

    /// `KEY=value` lines the companion client configuration expects verbatim.
    pub fn client_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SERVER", self.host_address.clone()),
            ("PORT", CLIENT_PORT.to_string()),
            ("PATH", CLIENT_PATH.to_string()),
            ("POLINT", CLIENT_POLL_INTERVAL.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceSpec;

    fn spec(name: &str, port: u16, required: bool) -> ServiceSpec {
        ServiceSpec {
            name: name.into(),
            start_command: format!("/opt/{name}/start.sh"),
            check_port: port,
            required,
            log_file: None,
        }
    }

    fn report() -> RunReport {
        let mut report = RunReport::new(Utc::now());
        report.host_address = "172.17.0.2".into();
        report.push(ServiceStatus::probed(spec("xtts", 8020, false), true, 2));
        report.push(ServiceStatus::disabled(spec("mimic3", 59125, false)));
        report.push(ServiceStatus::probed(spec("whisper", 9876, true), false, 30));
        report
    }

    #[test]
    fn available_lists_only_reachable_services() {
        let report = report();
        let available = report.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "xtts");
        assert_eq!(available[0].url, "http://172.17.0.2:8020");
    }

    #[test]
    fn unavailable_keeps_launch_order() {
        let report = report();
        let names: Vec<&str> = report.unavailable().map(|s| s.spec.name.as_str()).collect();
        assert_eq!(names, vec!["mimic3", "whisper"]);
    }

    #[test]
    fn required_failures_ignore_optional_services() {
        let report = report();
        let failures = report.required_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].spec.name, "whisper");
    }

    #[test]
    fn client_settings_use_fixed_constants() {
        let report = report();
        let settings = report.client_settings();
        assert_eq!(settings[0], ("SERVER", "172.17.0.2".to_string()));
        assert_eq!(settings[1], ("PORT", "8081".to_string()));
        assert_eq!(settings[2], ("PATH", "/HerikaServer/comm.php".to_string()));
        assert_eq!(settings[3], ("POLINT", "1".to_string()));
        assert_eq!(
            report.web_ui_url(),
            "http://172.17.0.2:8081/HerikaServer/ui/index.php"
        );
    }

    #[test]
    fn report_uses_camel_case() {
        let json = serde_json::to_string(&report()).unwrap();
        assert!(json.contains("\"hostAddress\""));
        assert!(json.contains("\"startedAt\""));
        assert!(!json.contains("\"host_address\""));
        assert!(!json.contains("\"finishedAt\""));
    }

    fn keys(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, nested) in map {
                    out.push(key.clone());
                    keys(nested, out);
                }
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| keys(v, out)),
            _ => {}
        }
    }

    #[test]
    fn every_nested_key_is_camel_case() {
        let mut report = report();
        report.push(
            ServiceStatus::launch_failed(spec("zonos", 7860, false), Some(2))
                .with_process_group(Some(4242)),
        );
        report.statuses[0].spec.log_file = Some("/home/dwemer/xtts/log.txt".into());
        let value = serde_json::to_value(&report).unwrap();

        let mut all = Vec::new();
        keys(&value, &mut all);
        let snake: Vec<&String> = all.iter().filter(|k| k.contains('_')).collect();
        assert!(snake.is_empty(), "snake_case keys: {snake:?}");
        for expected in ["startCommand", "checkPort", "logFile", "exitCode", "processGroup"] {
            assert!(all.iter().any(|k| k == expected), "missing {expected}");
        }

        let back: RunReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn process_groups_skip_services_that_never_ran() {
        let mut report = report();
        report.statuses[0].process_group = Some(300);
        report.push(
            ServiceStatus::launch_failed(spec("zonos", 7860, false), Some(1))
                .with_process_group(Some(310)),
        );
        assert_eq!(report.process_groups(), vec![300, 310]);
    }
}
