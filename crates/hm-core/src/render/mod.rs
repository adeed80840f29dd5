//! Text renderers for artifacts consumed by external programs
//!
//! - [`proxy`]: Hysteria2 server and client YAML configuration
//! - [`unit`]: systemd service descriptors
//!
//! Output is deterministic: the same parameters always render the same bytes.

pub mod proxy;
pub mod unit;

pub use proxy::{render_client_config, render_server_config, Bandwidth, QuicTuning};
pub use unit::UnitSpec;

use std::time::Duration;

/// Render a duration in the binary's literal notation (`10s`, `500ms`)
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        format!("{}ms", millis)
    } else {
        format!("{}s", duration.as_secs())
    }
}
