// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background scanner that reclaims expired visibility leases

use std::sync::Arc;
use std::time::Duration;

use dq_core::Clock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::manager::{Manager, WalAppend};

/// Periodic driver for [`Manager::scan_visibility`].
///
/// Holds no state of its own; each scan is atomic under the manager's
/// lock, so shutdown never interrupts one mid-operation.
pub struct Scanner {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Scanner {
    /// Spawn the scan loop on the current tokio runtime
    pub fn spawn<C, W>(manager: Arc<Manager<C, W>>, interval: Duration) -> Self
    where
        C: Clock + 'static,
        W: WalAppend + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.scan_visibility(),
                    _ = rx.changed() => {
                        debug!("visibility scanner stopping");
                        break;
                    }
                }
            }
        });

        Self { handle, shutdown }
    }

    /// Stop the scan loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
