// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! Every state change is appended here before the in-memory mutation, so
//! replaying the file from the top reproduces the committed state.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use dq_core::Record;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Replay hit a line it cannot parse. Replay must stop here: skipping
    /// the record would break the causal ordering of everything after it.
    #[error("corrupt WAL at line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },
}

/// Write-ahead log for durable record storage.
///
/// The file handle sits behind its own lock so concurrent writers are
/// serialized; callers that need append order to match mutation order
/// (the queue manager) hold their own lock around the whole sequence.
pub struct Wal {
    file: Mutex<File>,
    sync_on_write: bool,
}

impl Wal {
    /// Open or create a WAL at the given path, in append mode.
    ///
    /// The file is readable only by the owning user.
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self, WalError> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            sync_on_write,
        })
    }

    /// Append one record to the log.
    ///
    /// The serialized line goes out in a single write. When `sync_on_write`
    /// is set, the bytes are forced to stable storage before returning, so
    /// a success here means the record survives a crash.
    pub fn append(&self, record: &Record) -> Result<(), WalError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())?;
        if self.sync_on_write {
            file.sync_all()?;
        }

        Ok(())
    }

    /// Replay all records from the log.
    ///
    /// A missing file is an empty log. Empty lines are skipped. Any line
    /// that fails to parse (including a torn final line) aborts with
    /// [`WalError::Corrupt`] carrying its 1-based line number.
    pub fn replay(path: &Path) -> Result<Vec<Record>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| WalError::Corrupt {
                line: index + 1,
                source,
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
