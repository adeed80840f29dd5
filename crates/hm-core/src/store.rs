//! Persisted client and server records
//!
//! Both collections live in pretty-printed JSON files that operators are
//! expected to read and occasionally edit by hand.
//!
//! # Load policy
//!
//! - Missing file: the default collection is returned
//!   ([`LoadOrigin::Seeded`]). Plain loads never write; the defaults are
//!   written by [`ConfigStore::initialize`] at startup or by the first save.
//! - Unreadable or unparseable file: a warning is logged and an empty
//!   collection is returned ([`LoadOrigin::Recovered`]) so read paths keep
//!   working. The `*_for_update` loads refuse such a file instead, so a
//!   mutation can never overwrite records it could not read.
//!
//! # Write policy
//!
//! Every save writes `<file>.tmp`, fsyncs it and renames it over the target,
//! so a crash never leaves a half-written collection behind. Load-modify-save
//! cycles must hold [`ConfigStore::exclusive`] for their whole duration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::types::{ClientMap, ServerRecord};

/// Where a loaded value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Parsed from the file on disk
    File,
    /// File was absent; the default was used and persisted
    Seeded,
    /// File could not be read or parsed; an empty default was used
    Recovered { reason: String },
}

/// A loaded collection together with its origin
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub origin: LoadOrigin,
}

impl<T> Loaded<T> {
    /// Whether the value reflects a corrupt or unreadable file
    pub fn is_recovered(&self) -> bool {
        matches!(self.origin, LoadOrigin::Recovered { .. })
    }

    /// The value, unless it stands in for a file that could not be read
    fn writable(self, path: &Path) -> Result<T, StoreError> {
        match self.origin {
            LoadOrigin::Recovered { reason } => Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason,
            }),
            _ => Ok(self.value),
        }
    }
}

/// File-backed store for client and server records
pub struct ConfigStore {
    clients_path: PathBuf,
    server_path: PathBuf,
    seed_clients: ClientMap,
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Create a store over the two files, seeding clients with `seed_clients`
    pub fn new(clients_path: PathBuf, server_path: PathBuf, seed_clients: ClientMap) -> Self {
        Self {
            clients_path,
            server_path,
            seed_clients,
            writer: Mutex::new(()),
        }
    }

    /// Acquire the single writer lock.
    ///
    /// Hold the guard across the whole load-modify-save cycle.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Path of the clients collection
    pub fn clients_path(&self) -> &Path {
        &self.clients_path
    }

    /// Path of the server record
    pub fn server_path(&self) -> &Path {
        &self.server_path
    }

    /// Write the default collections for whichever files are missing.
    ///
    /// Runs under the writer lock. Returns the clients as loaded.
    pub async fn initialize(&self) -> Loaded<ClientMap> {
        let _guard = self.exclusive().await;

        let server = self.load_server();
        if server.origin == LoadOrigin::Seeded {
            if let Err(e) = self.save_server(&server.value) {
                tracing::warn!("Failed to persist default server record: {}", e);
            }
        }

        let clients = self.load_clients();
        if clients.origin == LoadOrigin::Seeded {
            if let Err(e) = self.save_clients(&clients.value) {
                tracing::warn!("Failed to persist default clients: {}", e);
            }
        }
        clients
    }

    /// Load all clients
    pub fn load_clients(&self) -> Loaded<ClientMap> {
        load_or_default(&self.clients_path, || self.seed_clients.clone(), ClientMap::new)
    }

    /// Load all clients for a load-modify-save cycle.
    ///
    /// Fails with [`StoreError::Corrupt`] instead of handing out the empty
    /// stand-in for an unreadable file. Hold [`Self::exclusive`] while calling.
    pub fn clients_for_update(&self) -> Result<ClientMap, StoreError> {
        self.load_clients().writable(&self.clients_path)
    }

    /// Persist all clients
    pub fn save_clients(&self, clients: &ClientMap) -> Result<(), StoreError> {
        write_json(&self.clients_path, clients)
    }

    /// Load the server record
    pub fn load_server(&self) -> Loaded<ServerRecord> {
        load_or_default(&self.server_path, ServerRecord::default, ServerRecord::default)
    }

    /// Load the server record before replacing it; see [`Self::clients_for_update`]
    pub fn server_for_update(&self) -> Result<ServerRecord, StoreError> {
        self.load_server().writable(&self.server_path)
    }

    /// Persist the server record
    pub fn save_server(&self, record: &ServerRecord) -> Result<(), StoreError> {
        write_json(&self.server_path, record)
    }
}

fn load_or_default<T, S, E>(path: &Path, seed: S, empty: E) -> Loaded<T>
where
    T: DeserializeOwned,
    S: FnOnce() -> T,
    E: FnOnce() -> T,
{
    match read_json::<T>(path) {
        Ok(Some(value)) => Loaded {
            value,
            origin: LoadOrigin::File,
        },
        Ok(None) => Loaded {
            value: seed(),
            origin: LoadOrigin::Seeded,
        },
        Err(e) => {
            tracing::warn!("Falling back to an empty collection: {}", e);
            Loaded {
                value: empty(),
                origin: LoadOrigin::Recovered {
                    reason: e.to_string(),
                },
            }
        }
    }
}

/// Read and parse `path`; `Ok(None)` if it does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` and atomically replace `path` with it
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    content.push('\n');

    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
    file.write_all(content.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}
