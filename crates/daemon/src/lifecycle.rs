// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fmt;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dq_core::{Config, SystemClock};
use dq_queue::{Manager, Scanner};
use dq_storage::{Wal, WalError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock {0}: daemon already running against this WAL?")]
    LockFailed(PathBuf, #[source] io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(String, #[source] io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Daemon state during operation
pub struct Daemon {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    lock_path: PathBuf,
    /// TCP listener for client requests
    pub listener: TcpListener,
    /// Queue manager, shared with connection tasks and the scanner
    pub manager: Arc<Manager<SystemClock>>,
    scanner: Scanner,
    /// When daemon started
    pub start_time: Instant,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon").finish_non_exhaustive()
    }
}

impl Daemon {
    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop accepting connections
        drop(self.listener);

        // 2. Stop the scanner; an in-progress scan completes first
        self.scanner.shutdown().await;

        // 3. Remove the lock file; the flock itself releases on drop
        if self.lock_path.exists() {
            std::fs::remove_file(&self.lock_path)?;
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    let lock_path = lock_path(&config.wal_file_path);
    match startup_inner(config, &lock_path).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Clean up anything created before the failure
            if lock_path.exists() {
                let _ = std::fs::remove_file(&lock_path);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - the caller cleans up if this fails
async fn startup_inner(config: Config, lock_path: &Path) -> Result<Daemon, LifecycleError> {
    // 1. Create the WAL directory and take the lock FIRST - prevents two
    //    daemons appending to the same log
    if let Some(parent) = config.wal_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut lock_file = File::create(lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(lock_path.to_path_buf(), e))?;

    // Write PID to lock file
    {
        use io::Write;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    // 2. Replay the WAL; corruption is fatal here, before any client
    //    can observe partial state
    let records = Wal::replay(&config.wal_file_path)?;

    // 3. Reopen in append mode and restore state through the replay hooks
    let wal = Wal::open(&config.wal_file_path, config.wal_sync_on_write)?;
    let manager = Arc::new(Manager::new(config.clone(), SystemClock, wal));
    for record in &records {
        manager.apply(record);
    }

    let stats = manager.stats();
    info!(
        "Restored {} records: {} tasks ({} pending, {} in flight, {} done)",
        records.len(),
        stats.total,
        stats.pending,
        stats.in_flight,
        stats.done
    );

    // 4. Start the visibility scanner
    let scanner = Scanner::spawn(Arc::clone(&manager), config.visibility_scan_interval);

    // 5. Bind LAST - no client is accepted before state is restored
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen_addr.clone(), e))?;

    info!("Daemon started, WAL at {}", config.wal_file_path.display());

    Ok(Daemon {
        config,
        lock_file,
        lock_path: lock_path.to_path_buf(),
        listener,
        manager,
        scanner,
        start_time: Instant::now(),
    })
}

/// Lock file sits next to the WAL: `<wal_file_path>.lock`
fn lock_path(wal_path: &Path) -> PathBuf {
    let mut name = wal_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
