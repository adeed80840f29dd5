//! hm-core: Core abstractions and configuration for the Hysteria2 manager
//!
//! This crate provides the domain types, the persisted record store, the
//! identifier/port/credential allocators and the renderers that produce the
//! proxy binary's configuration and service descriptors. Nothing in here
//! talks to the service manager or the network.

pub mod alloc;
pub mod config;
pub mod error;
pub mod logline;
pub mod render;
pub mod store;
pub mod types;

pub use error::{AllocError, ManagerError, StoreError, ToolError};
pub use store::{ConfigStore, LoadOrigin, Loaded};
pub use types::{ClientId, ClientMap, ClientRecord, ClientSnapshot, ClientStatus, ServerRecord};
