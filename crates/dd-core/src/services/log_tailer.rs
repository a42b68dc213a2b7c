use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

/// A line appended to a service's log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub service: String,
    pub line: String,
}

/// Follow a log file, sending each new line over `tx`.
///
/// Content already in the file when tailing starts is skipped, like
/// `tail -f -n 0`. A file that does not exist yet is waited for and then read
/// from the beginning. Returns a `JoinHandle` that can be aborted to stop.
pub fn start_tailing(
    file_path: PathBuf,
    service: String,
    tx: mpsc::UnboundedSender<LogLine>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_position = std::fs::metadata(&file_path)
            .map(|m| m.len())
            .unwrap_or(0);

        while !file_path.exists() {
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let mut tick = interval(Duration::from_millis(250));
        loop {
            tick.tick().await;

            if let Ok(new_pos) = read_new_content(&file_path, last_position, &service, &tx) {
                last_position = new_pos;
            }

            if tx.is_closed() {
                break;
            }
        }
    })
}

fn read_new_content(
    path: &Path,
    last_position: u64,
    service: &str,
    tx: &mpsc::UnboundedSender<LogLine>,
) -> std::io::Result<u64> {
    let mut file = std::fs::OpenOptions::new().read(true).open(path)?;

    let metadata = file.metadata()?;
    // truncated or rotated: start over
    let last_position = if metadata.len() < last_position {
        0
    } else {
        last_position
    };
    if metadata.len() == last_position {
        return Ok(last_position);
    }

    file.seek(SeekFrom::Start(last_position))?;
    // services write progress bars and raw bytes; never stall on bad UTF-8
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let new_position = file.stream_position()?;
    let content = String::from_utf8_lossy(&bytes);

    for line in content.lines() {
        if !line.is_empty() {
            let _ = tx.send(LogLine {
                service: service.to_string(),
                line: line.to_string(),
            });
        }
    }

    Ok(new_position)
}

/// Read the last N lines of a file. Missing or unreadable files yield "".
pub fn read_tail(file_path: &Path, line_count: usize) -> String {
    match std::fs::read_to_string(file_path) {
        Ok(content) => {
            let lines: Vec<&str> = content.lines().collect();
            let start = lines.len().saturating_sub(line_count);
            lines[start..].join("\n")
        }
        Err(_) => String::new(),
    }
}
