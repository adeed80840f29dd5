//! Host information for the status page

use serde::Serialize;
use sysinfo::System;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Uptime and memory of the host
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    /// `up 2 days, 3 hours, 14 minutes`
    pub uptime: String,
    pub uptime_seconds: u64,
    /// `1.2 GiB / 3.8 GiB`
    pub memory: String,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

impl SystemInfo {
    /// Sample the running host
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let uptime_seconds = System::uptime();
        let used = sys.used_memory();
        let total = sys.total_memory();

        Self {
            uptime: format_uptime(uptime_seconds),
            uptime_seconds,
            memory: format!("{:.1} GiB / {:.1} GiB", used as f64 / GIB, total as f64 / GIB),
            memory_used_bytes: used,
            memory_total_bytes: total,
        }
    }
}

/// Render seconds the way `uptime -p` does
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut parts = Vec::new();
    for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        match value {
            0 => {}
            1 => parts.push(format!("1 {}", unit)),
            n => parts.push(format!("{} {}s", n, unit)),
        }
    }
    if parts.is_empty() {
        parts.push("0 minutes".to_string());
    }
    format!("up {}", parts.join(", "))
}
