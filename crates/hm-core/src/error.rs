//! Core error types for the Hysteria2 manager

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ClientId;

/// Top-level error type surfaced by orchestration operations
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Bad input: port out of range, missing required field
    #[error("{0}")]
    Validation(String),

    /// Requested resource is already allocated
    #[error("{0}")]
    Conflict(String),

    /// Identifier or port space is full
    #[error("No free {0} left")]
    Exhausted(&'static str),

    /// Removal of a client that is protected by policy
    #[error("Cannot remove default client {0}")]
    Protected(ClientId),

    /// Unknown client or target
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external tool failed or timed out
    #[error("External tool error: {0}")]
    Tool(#[from] ToolError),

    /// Store could not be written
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// I/O error on a rendered artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManagerError {
    /// Message safe to return to an HTTP caller.
    ///
    /// Tool diagnostics and filesystem details stay in the server log.
    pub fn public_message(&self) -> String {
        match self {
            ManagerError::Tool(e) => format!("{} failed", e.program()),
            ManagerError::Persistence(StoreError::Corrupt { .. }) => {
                "Stored records are unreadable; repair the store file before making changes".to_string()
            }
            ManagerError::Persistence(_) => "Failed to persist state".to_string(),
            ManagerError::Io(_) => "Failed to write configuration".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AllocError> for ManagerError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::Exhausted { kind, .. } => ManagerError::Exhausted(kind),
        }
    }
}

/// Failure of an external program (service manager, openssl, installer)
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("{program} exited with {status}: {diagnostic}")]
    Failed {
        program: String,
        status: String,
        diagnostic: String,
    },

    /// The program exceeded its time budget and was killed
    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },
}

impl ToolError {
    /// Name of the program that failed
    pub fn program(&self) -> &str {
        match self {
            ToolError::Spawn { program, .. }
            | ToolError::Failed { program, .. }
            | ToolError::TimedOut { program, .. } => program,
        }
    }
}

/// Persisted store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// File exists but could not be read
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File contents are not a valid collection
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization of the in-memory value failed
    #[error("failed to serialize {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing or renaming the file failed
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mutation was refused because the file on disk is unreadable
    #[error("refusing to overwrite unreadable {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Allocator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Every candidate in the allocation range is taken.
    ///
    /// `fallback` is the value older deployments handed out anyway.
    #[error("{kind} space exhausted (legacy fallback {fallback})")]
    Exhausted { kind: &'static str, fallback: String },
}
