//! Host system integration
//!
//! Everything that shells out goes through [`CommandRunner`]; everything that
//! talks to the service manager goes through [`SystemController`]. Both are
//! trait objects so tests can substitute the fakes in [`crate::testing`].

pub mod controller;
pub mod exec;
pub mod units;

pub use controller::{SystemController, Systemctl};
pub use exec::{CommandRunner, Invocation, TokioRunner, ToolOutput};
pub use units::ServiceUnitManager;
