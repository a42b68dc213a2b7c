use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use dd_core::models::{RunReport, ServiceOutcome, ServiceStatus};

const RULE: &str = "==================================================";

fn describe(status: &ServiceStatus) -> String {
    match status.outcome {
        ServiceOutcome::Unreachable => format!(
            "unreachable (no listener on port {} after {} checks)",
            status.spec.check_port, status.probe_attempts
        ),
        ServiceOutcome::LaunchFailed {
            exit_code: Some(code),
        } => format!("launch failed (exit code {code})"),
        ServiceOutcome::Disabled => "disabled (not installed)".to_string(),
        other => other.label().to_string(),
    }
}

/// Human-readable end-of-run summary.
///
/// Only reachable services get an endpoint; everything else is listed under
/// "Not available" with the reason.
pub fn render(report: &RunReport) -> String {
    let width = report
        .statuses
        .iter()
        .map(|s| s.spec.name.len())
        .max()
        .unwrap_or(0);

    let mut lines = vec![
        RULE.to_string(),
        " DwemerDistro services".to_string(),
        RULE.to_string(),
        format!("Host address: {}", report.host_address),
        String::new(),
        "Available services:".to_string(),
    ];

    let available = report.available();
    if available.is_empty() {
        lines.push("  (none)".to_string());
    }
    for endpoint in &available {
        lines.push(format!("  {:<width$}  {}", endpoint.name, endpoint.url));
    }

    let unavailable: Vec<&ServiceStatus> = report.unavailable().collect();
    if !unavailable.is_empty() {
        lines.push(String::new());
        lines.push("Not available:".to_string());
        for status in unavailable {
            let marker = if status.spec.required { " [required]" } else { "" };
            lines.push(format!(
                "  {:<width$}  {}{marker}",
                status.spec.name,
                describe(status)
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!("Web UI: {}", report.web_ui_url()));
    lines.push(String::new());
    lines.push("AIAgent.ini connection settings:".to_string());
    for (key, value) in report.client_settings() {
        lines.push(format!("  {key}={value}"));
    }
    lines.push(RULE.to_string());

    lines.join("\n")
}

/// Write the summary, highlighting headings and endpoint URLs when `color` is set.
pub fn write<W: Write>(out: &mut W, report: &RunReport, color: bool) -> io::Result<()> {
    let text = render(report);
    if !color {
        writeln!(out, "{text}")?;
        return out.flush();
    }

    for line in text.lines() {
        if line.starts_with("==") || line.ends_with(':') {
            queue!(
                out,
                SetAttribute(Attribute::Bold),
                Print(line),
                SetAttribute(Attribute::Reset),
                Print("\n")
            )?;
        } else if line.contains("http://") {
            queue!(
                out,
                SetForegroundColor(Color::Green),
                Print(line),
                ResetColor,
                Print("\n")
            )?;
        } else {
            queue!(out, Print(line), Print("\n"))?;
        }
    }
    out.flush()
}
