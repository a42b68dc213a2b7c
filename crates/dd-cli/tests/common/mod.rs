// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};

use dd_core::models::{RunReport, ServiceSpec, ServiceStatus};

pub fn make_spec(name: &str, port: u16, required: bool) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        start_command: format!("/home/dwemer/{name}/start.sh"),
        check_port: port,
        required,
        log_file: None,
    }
}

/// Empty report with fixed timestamps for deterministic output.
pub fn make_report(host_address: &str) -> RunReport {
    let started_at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let mut report = RunReport::new(started_at);
    report.host_address = host_address.to_string();
    report.finished_at = Some(Utc.with_ymd_and_hms(2026, 10, 18, 12, 1, 30).unwrap());
    report
}

/// A run over the stock service table with every kind of outcome.
pub fn mixed_report() -> RunReport {
    let mut report = make_report("172.17.0.2");
    report.push(ServiceStatus::probed(make_spec("minime-t5", 8082, false), true, 1));
    report.push(ServiceStatus::probed(make_spec("xtts", 8020, false), true, 4));
    report.push(ServiceStatus::disabled(make_spec("mimic3", 59125, false)));
    report.push(ServiceStatus::probed(make_spec("melotts", 8084, true), false, 30));
    report.push(ServiceStatus::launch_failed(make_spec("whisper", 9876, false), Some(1)));
    report.push(ServiceStatus::probed(make_spec("zonos", 7860, false), true, 2));
    report
}
