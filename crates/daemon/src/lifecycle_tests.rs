// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use dq_core::Config;

fn test_config(dir: &tempfile::TempDir) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        wal_file_path: dir.path().join("dq.wal"),
        ..Config::default()
    }
}

#[tokio::test]
async fn startup_restores_state_from_wal() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    // A previous daemon run: two tasks, one leased
    {
        let wal = Wal::open(&config.wal_file_path, true).unwrap();
        let manager = Manager::new(config.clone(), SystemClock, wal);
        manager.enqueue("t1", "p1").unwrap();
        manager.enqueue("t2", "p2").unwrap();
        manager.poll("w1").unwrap().unwrap();
    }

    let daemon = startup(config).await.unwrap();

    let stats = daemon.manager.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.in_flight, 1);
    assert_eq!(daemon.manager.lease_holder("t1").as_deref(), Some("w1"));

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_daemon_on_same_wal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let first = startup(test_config(&dir)).await.unwrap();

    let err = startup(test_config(&dir)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_, _)));

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn corrupt_wal_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    std::fs::write(&config.wal_file_path, "not a record\n").unwrap();

    let err = startup(config).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Wal(WalError::Corrupt { line: 1, .. })
    ));
}

#[tokio::test]
async fn shutdown_removes_lock_file_and_frees_the_wal() {
    let dir = tempfile::tempdir().unwrap();

    let daemon = startup(test_config(&dir)).await.unwrap();
    let lock = dir.path().join("dq.wal.lock");
    assert!(lock.exists());

    daemon.shutdown().await.unwrap();
    assert!(!lock.exists());

    // A fresh daemon can take over
    let daemon = startup(test_config(&dir)).await.unwrap();
    daemon.shutdown().await.unwrap();
}
