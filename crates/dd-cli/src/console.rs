//! Operator-facing output: tagged status lines and probe progress dots.
//!
//! This is separate from `tracing`, which goes to stderr or the debug log.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::tty::IsTty;

use dd_core::models::LaunchEvent;
use dd_core::services::log_tailer::LogLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Info,
    Warn,
    Error,
    Success,
}

impl Tag {
    pub fn label(&self) -> &'static str {
        match self {
            Tag::Info => "[INFO]",
            Tag::Warn => "[WARN]",
            Tag::Error => "[ERROR]",
            Tag::Success => "[SUCCESS]",
        }
    }

    fn color(&self) -> Color {
        match self {
            Tag::Info => Color::Blue,
            Tag::Warn => Color::Yellow,
            Tag::Error => Color::Red,
            Tag::Success => Color::Green,
        }
    }
}

/// Colors only when stdout is a terminal and `NO_COLOR` is unset.
pub fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && io::stdout().is_tty()
}

/// Write one `[TAG] message` line.
pub fn write_tagged<W: Write>(out: &mut W, color: bool, tag: Tag, message: &str) -> io::Result<()> {
    if color {
        queue!(
            out,
            SetForegroundColor(tag.color()),
            SetAttribute(Attribute::Bold),
            Print(tag.label()),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print(format!(" {message}\n"))
        )?;
    } else {
        writeln!(out, "{} {message}", tag.label())?;
    }
    out.flush()
}

pub fn print(tag: Tag, message: &str) {
    let _ = write_tagged(&mut io::stdout(), use_color(), tag, message);
}

/// Renders [`LaunchEvent`]s as they arrive.
///
/// Probe attempts become dots on a single "Waiting for ..." line, which is
/// closed before the next tagged line is written.
pub struct EventPrinter<W> {
    out: W,
    color: bool,
    dots_open: bool,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            dots_open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, tag: Tag, message: &str) -> io::Result<()> {
        self.close_dots()?;
        write_tagged(&mut self.out, self.color, tag, message)
    }

    fn close_dots(&mut self) -> io::Result<()> {
        if self.dots_open {
            writeln!(self.out)?;
            self.dots_open = false;
        }
        Ok(())
    }

    pub fn handle(&mut self, event: &LaunchEvent) -> io::Result<()> {
        match event {
            LaunchEvent::SystemServiceStarted { name } => {
                self.line(Tag::Info, &format!("Started system service {name}"))
            }
            LaunchEvent::SystemServiceFailed { name, error } => self.line(
                Tag::Warn,
                &format!("Could not start system service {name}: {error}"),
            ),
            LaunchEvent::ServiceStarting { name, port } => {
                self.line(Tag::Info, &format!("Starting {name} (port {port})"))
            }
            LaunchEvent::ServiceSkipped { name, artifact } => self.line(
                Tag::Info,
                &format!("{name} is not installed ({artifact} not found), skipping"),
            ),
            LaunchEvent::LaunchFailed { name, exit_code } => {
                let detail = match exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "could not run start command".to_string(),
                };
                self.line(Tag::Error, &format!("{name} failed to start ({detail})"))
            }
            LaunchEvent::ProbeAttempt {
                name,
                port,
                attempt,
                ..
            } => {
                if !self.dots_open {
                    write!(self.out, "Waiting for {name} on port {port} ")?;
                    self.dots_open = true;
                }
                tracing::trace!(service = %name, attempt, "probe attempt");
                write!(self.out, ".")?;
                self.out.flush()
            }
            LaunchEvent::ServiceReady {
                name,
                port,
                attempts,
            } => self.line(
                Tag::Success,
                &format!("{name} is listening on port {port} (after {attempts} checks)"),
            ),
            LaunchEvent::ServiceUnreachable {
                name,
                port,
                attempts,
            } => self.line(
                Tag::Warn,
                &format!("{name} did not open port {port} after {attempts} checks"),
            ),
            LaunchEvent::ServiceCancelled { name } => {
                self.line(Tag::Warn, &format!("{name} startup cancelled"))
            }
        }
    }

    /// Echo a followed log line, prefixed with its service.
    pub fn log_line(&mut self, log: &LogLine) -> io::Result<()> {
        self.close_dots()?;
        if self.color {
            queue!(
                self.out,
                SetForegroundColor(Color::DarkGrey),
                Print(format!("[{}]", log.service)),
                ResetColor,
                Print(format!(" {}\n", log.line))
            )?;
        } else {
            writeln!(self.out, "[{}] {}", log.service, log.line)?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(events: &[LaunchEvent]) -> String {
        let mut printer = EventPrinter::new(Vec::new(), false);
        for event in events {
            printer.handle(event).unwrap();
        }
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn plain_tagged_line() {
        let mut out = Vec::new();
        write_tagged(&mut out, false, Tag::Success, "done").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[SUCCESS] done\n");
    }

    #[test]
    fn colored_line_contains_escape_codes() {
        let mut out = Vec::new();
        write_tagged(&mut out, true, Tag::Error, "boom").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\u{1b}["));
        assert!(text.contains("[ERROR]"));
        assert!(text.ends_with(" boom\n"));
    }

    #[test]
    fn probe_attempts_render_as_dots() {
        let probe = |attempt| LaunchEvent::ProbeAttempt {
            name: "xtts".into(),
            port: 8020,
            attempt,
            max_attempts: 30,
        };
        let output = render(&[
            LaunchEvent::ServiceStarting {
                name: "xtts".into(),
                port: 8020,
            },
            probe(1),
            probe(2),
            probe(3),
            LaunchEvent::ServiceReady {
                name: "xtts".into(),
                port: 8020,
                attempts: 3,
            },
        ]);
        assert_eq!(
            output,
            "[INFO] Starting xtts (port 8020)\n\
             Waiting for xtts on port 8020 ...\n\
             [SUCCESS] xtts is listening on port 8020 (after 3 checks)\n"
        );
    }

    #[test]
    fn failures_use_error_and_warn_tags() {
        let output = render(&[
            LaunchEvent::LaunchFailed {
                name: "mimic3".into(),
                exit_code: Some(127),
            },
            LaunchEvent::LaunchFailed {
                name: "melotts".into(),
                exit_code: None,
            },
            LaunchEvent::ServiceSkipped {
                name: "zonos".into(),
                artifact: "/home/dwemer/Zonos/start.sh".into(),
            },
        ]);
        assert_eq!(
            output,
            "[ERROR] mimic3 failed to start (exit code 127)\n\
             [ERROR] melotts failed to start (could not run start command)\n\
             [INFO] zonos is not installed (/home/dwemer/Zonos/start.sh not found), skipping\n"
        );
    }

    #[test]
    fn log_line_closes_open_dots() {
        let mut printer = EventPrinter::new(Vec::new(), false);
        printer
            .handle(&LaunchEvent::ProbeAttempt {
                name: "whisper".into(),
                port: 9876,
                attempt: 1,
                max_attempts: 30,
            })
            .unwrap();
        printer
            .log_line(&LogLine {
                service: "whisper".into(),
                line: "model loaded".into(),
            })
            .unwrap();
        let output = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(
            output,
            "Waiting for whisper on port 9876 .\n[whisper] model loaded\n"
        );
    }
}
