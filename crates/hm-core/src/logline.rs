//! Monitor log line parsing
//!
//! The monitor writes lines of the form `<timestamp> - <message>`. Lines
//! without the separator are not structured output; they still count towards
//! the total line count of a snapshot.

use serde::{Deserialize, Serialize};

/// Separator between timestamp and message
pub const SEPARATOR: &str = " - ";

/// Severity derived from markers in the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Success,
    Error,
    Warning,
    Info,
}

/// Marker groups checked in order; the first group with a hit wins
const MARKERS: &[(&[&str], LogKind)] = &[
    (&["🟢", "ONLINE"], LogKind::Success),
    (&["🔴", "OFFLINE"], LogKind::Error),
    (&["⚠️", "WARN"], LogKind::Warning),
    (&["🛑", "ERROR"], LogKind::Error),
];

/// Classify a message by its markers (case-sensitive)
pub fn classify(message: &str) -> LogKind {
    MARKERS
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| message.contains(m)))
        .map(|(_, kind)| *kind)
        .unwrap_or(LogKind::Info)
}

/// One structured log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub raw: String,
}

/// Parse one line; `None` for blank or malformed lines
pub fn parse_line(line: &str) -> Option<LogEntry> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }
    let (timestamp, message) = raw.split_once(SEPARATOR)?;
    Some(LogEntry {
        timestamp: timestamp.to_string(),
        message: message.to_string(),
        kind: classify(message),
        raw: raw.to_string(),
    })
}

/// The tail of a log file, parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSnapshot {
    pub logs: Vec<LogEntry>,
    /// Lines in the whole file
    pub total_lines: usize,
    /// Entries returned
    pub filtered_lines: usize,
}

impl LogSnapshot {
    /// Take the last `lines` lines of `content`, keep those containing
    /// `filter` (case-insensitive) and parse them
    pub fn from_content(content: &str, lines: usize, filter: Option<&str>) -> Self {
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        let needle = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let logs: Vec<LogEntry> = all[start..]
            .iter()
            .filter(|line| match &needle {
                Some(needle) => line.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter_map(|line| parse_line(line))
            .collect();

        Self {
            filtered_lines: logs.len(),
            total_lines: all.len(),
            logs,
        }
    }
}
