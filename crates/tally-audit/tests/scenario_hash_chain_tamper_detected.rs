//! Audit ledger hash chain integrity.
//!
//! GREEN when:
//! - Writing 5 chained events, then verifying, succeeds.
//! - Mutating line 3's after-snapshot in the file is detected.
//! - Deleting a line breaks the chain at the following event.

use serde_json::json;
use tally_audit::{verify_hash_chain, AuditLedger, VerifyResult};
use tempfile::TempDir;

fn write_five_events(path: &std::path::Path) {
    let mut ledger = AuditLedger::new(path, true).unwrap();
    for i in 0..5 {
        ledger
            .append(
                "analyst",
                &format!("test_action_{i}"),
                "monthly_submission",
                &format!("run:2026-0{}", i + 1),
                json!({ "notified_to_source": false }),
                json!({ "notified_to_source": true, "index": i }),
            )
            .unwrap();
    }
}

#[test]
fn untampered_chain_verifies_valid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five_events(&path);

    let result = verify_hash_chain(&path).unwrap();
    assert_eq!(
        result,
        VerifyResult::Valid { lines: 5 },
        "untampered chain should verify as valid with 5 lines"
    );
}

#[test]
fn tampered_snapshot_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five_events(&path);

    // Tamper with line 3: flip the after-snapshot without recomputing hashes.
    {
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut ev: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
        ev["after"]["notified_to_source"] = json!(false);
        lines[2] = serde_json::to_string(&ev).unwrap();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    }

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 3, "tamper should be detected at line 3: {reason}");
            assert!(
                reason.contains("hash_self mismatch"),
                "reason should mention hash_self mismatch, got: {reason}"
            );
        }
        VerifyResult::Valid { lines } => {
            panic!("tampered chain should NOT verify as valid (got {lines} valid lines)");
        }
    }
}

#[test]
fn deleted_line_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five_events(&path);

    // Drop line 3; the next event's hash_prev no longer matches.
    {
        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, line)| line)
            .collect();
        std::fs::write(&path, kept.join("\n") + "\n").unwrap();
    }

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert!(
                reason.contains("hash_prev mismatch"),
                "reason should mention hash_prev mismatch, got: {reason}"
            );
            assert!(line >= 3, "break should be at line 3 or later (was at {line})");
        }
        VerifyResult::Valid { lines } => {
            panic!("chain with deleted line should NOT verify as valid (got {lines} lines)");
        }
    }
}

#[test]
fn empty_ledger_is_valid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    std::fs::write(&path, "").unwrap();

    let result = verify_hash_chain(&path).unwrap();
    assert_eq!(result, VerifyResult::Valid { lines: 0 });
}

#[test]
fn read_all_returns_events_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five_events(&path);

    let ledger = AuditLedger::new(&path, true).unwrap();
    let events = ledger.read_all().unwrap();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0].action, "test_action_0");
    assert_eq!(events[4].action, "test_action_4");
    assert_eq!(events[0].actor, "analyst");
}
