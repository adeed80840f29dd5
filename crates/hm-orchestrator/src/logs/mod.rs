//! Monitor log snapshots and live tailing
//!
//! # Rotation
//!
//! A live tail re-checks the file whenever it runs out of data. If the file
//! shrank below the read offset (truncated in place) or the path now points
//! at a different inode (rotated and recreated), the tail reopens the path
//! and continues from the start of the new file. If the path is briefly
//! missing mid-rotation the tail keeps polling until it reappears.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hm_core::logline::{parse_line, LogEntry, LogSnapshot};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Buffered entries per live tail before the reader waits on the consumer
const TAIL_CHANNEL_CAPACITY: usize = 256;

const READ_CHUNK: usize = 8 * 1024;

/// Log access errors
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log file not found")]
    NotFound(PathBuf),

    #[error("Error reading logs: {0}")]
    Io(#[from] io::Error),
}

/// A running live tail
pub struct LogTail {
    /// Parsed entries as they are appended
    pub entries: mpsc::Receiver<LogEntry>,
    /// The follower task; finishes once `entries` is dropped or cancelled
    pub task: JoinHandle<()>,
}

/// Reads the monitor log
pub struct LogStreamer {
    path: PathBuf,
    max_lines: usize,
    default_lines: usize,
    poll_interval: Duration,
}

impl LogStreamer {
    pub fn new(path: PathBuf, max_lines: usize, default_lines: usize, poll_interval: Duration) -> Self {
        Self {
            path,
            max_lines: max_lines.max(1),
            default_lines,
            poll_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Requested line count, defaulted and clamped to `[1, max_lines]`
    pub fn clamp_lines(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_lines)
            .clamp(1, self.max_lines)
    }

    /// Last `lines` lines, optionally filtered, parsed
    pub async fn snapshot(&self, lines: Option<usize>, filter: Option<&str>) -> Result<LogSnapshot, LogError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LogError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let content = String::from_utf8_lossy(&bytes);
        Ok(LogSnapshot::from_content(&content, self.clamp_lines(lines), filter))
    }

    /// Follow lines appended after this call.
    ///
    /// The follower stops when `cancel` fires or the receiver is dropped.
    pub async fn tail(&self, cancel: CancellationToken) -> Result<LogTail, LogError> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LogError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let identity = file_identity(&file.metadata().await?);
        let offset = file.seek(SeekFrom::End(0)).await?;

        let (tx, entries) = mpsc::channel(TAIL_CHANNEL_CAPACITY);
        let follower = Follower {
            path: self.path.clone(),
            file: Some(file),
            offset,
            identity,
            poll_interval: self.poll_interval,
        };
        let task = tokio::spawn(follower.run(tx, cancel));

        tracing::debug!("Started live tail of {:?} at offset {}", self.path, offset);
        Ok(LogTail { entries, task })
    }
}

struct Follower {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    identity: Option<u64>,
    poll_interval: Duration,
}

impl Follower {
    async fn run(mut self, tx: mpsc::Sender<LogEntry>, cancel: CancellationToken) {
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            if cancel.is_cancelled() || tx.is_closed() {
                break;
            }

            let read = match self.file.as_mut() {
                Some(file) => match file.read(&mut chunk).await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!("Reading {:?} failed: {}", self.path, e);
                        0
                    }
                },
                None => 0,
            };

            if read > 0 {
                self.offset += read as u64;
                pending.extend_from_slice(&chunk[..read]);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    if let Some(entry) = parse_line(&String::from_utf8_lossy(&line)) {
                        if tx.send(entry).await.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }

            if self.reopen_if_rotated().await {
                pending.clear();
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tx.closed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::debug!("Live tail of {:?} stopped", self.path);
    }

    /// Reopen from the start if the file was truncated or replaced
    async fn reopen_if_rotated(&mut self) -> bool {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(_) => return false,
        };

        let replaced = self.file.is_none() || file_identity(&meta) != self.identity;
        let truncated = meta.len() < self.offset;
        if !replaced && !truncated {
            return false;
        }

        match File::open(&self.path).await {
            Ok(file) => {
                tracing::info!("Log file {:?} rotated, reopening", self.path);
                self.file = Some(file);
                self.offset = 0;
                self.identity = file_identity(&meta);
                true
            }
            Err(e) => {
                tracing::debug!("Reopening {:?} failed: {}", self.path, e);
                self.file = None;
                false
            }
        }
    }
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
