//! hm-orchestrator: Hysteria2 manager daemon
//!
//! Provisions the local Hysteria2 server and any number of clients as
//! systemd units, reports their health and serves the monitor log, all
//! behind a small HTTP API.

pub mod api;
pub mod health;
pub mod logs;
pub mod manage;
pub mod provision;
pub mod state;
pub mod system;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use state::ManagerState;
