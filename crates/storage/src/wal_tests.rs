// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{DateTime, TimeZone, Utc};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

fn enqueue(task_id: &str) -> Record {
    Record::Enqueue {
        task_id: task_id.to_string(),
        payload: "p".to_string(),
        timestamp: ts(),
    }
}

#[test]
fn wal_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let wal = Wal::open(&path, true).unwrap();
        wal.append(&enqueue("t1")).unwrap();
        wal.append(&Record::Poll {
            task_id: "t1".to_string(),
            worker_id: "w1".to_string(),
            deadline: ts() + chrono::Duration::seconds(30),
            timestamp: ts(),
        })
        .unwrap();
    }

    let records = Wal::replay(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert!(matches!(records[0], Record::Enqueue { .. }));
    assert!(matches!(records[1], Record::Poll { .. }));
}

#[test]
fn wal_replay_nonexistent() {
    let path = Path::new("/nonexistent/path/wal");
    let records = Wal::replay(path).unwrap();
    assert!(records.is_empty());
}

#[test]
fn wal_append_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let wal = Wal::open(&path, true).unwrap();
        wal.append(&enqueue("t1")).unwrap();
    }
    {
        let wal = Wal::open(&path, true).unwrap();
        wal.append(&enqueue("t2")).unwrap();
    }

    let records = Wal::replay(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].task_id(), "t1");
    assert_eq!(records[1].task_id(), "t2");
}

#[test]
fn wal_replay_skips_empty_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let line = serde_json::to_string(&enqueue("t1")).unwrap();
    std::fs::write(&path, format!("{}\n\n{}\n", line, line)).unwrap();

    let records = Wal::replay(&path).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn wal_replay_reports_corrupt_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let line = serde_json::to_string(&enqueue("t1")).unwrap();
    std::fs::write(&path, format!("{}\nnot json\n", line)).unwrap();

    let err = Wal::replay(&path).unwrap_err();
    match err {
        WalError::Corrupt { line, .. } => assert_eq!(line, 2),
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[test]
fn wal_replay_rejects_truncated_final_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let line = serde_json::to_string(&enqueue("t1")).unwrap();
    let torn = &line[..line.len() / 2];
    std::fs::write(&path, format!("{}\n{}", line, torn)).unwrap();

    let err = Wal::replay(&path).unwrap_err();
    assert!(matches!(err, WalError::Corrupt { line: 2, .. }));
}

#[test]
fn wal_replay_rejects_unknown_record_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    std::fs::write(
        &path,
        "{\"type\":\"SNAPSHOT\",\"task_id\":\"t1\",\"timestamp\":\"2025-01-01T12:00:00Z\"}\n",
    )
    .unwrap();

    let err = Wal::replay(&path).unwrap_err();
    assert!(matches!(err, WalError::Corrupt { line: 1, .. }));
}

#[test]
fn wal_append_without_sync_still_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let wal = Wal::open(&path, false).unwrap();
    wal.append(&enqueue("t1")).unwrap();
    drop(wal);

    let records = Wal::replay(&path).unwrap();
    assert_eq!(records.len(), 1);
}

#[cfg(unix)]
#[test]
fn wal_file_is_private_to_owner() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let _wal = Wal::open(&path, true).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
