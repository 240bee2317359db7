//! Every workflow mutation leaves an audit event, and the ledger's hash
//! chain stays verifiable.

use tally_audit::{verify_hash_chain, VerifyResult};
use tally_engine::MatchRules;
use tally_testkit::consistent_record_sets;
use tally_workflow::WorkflowService;
use tempfile::TempDir;

#[test]
fn scenario_mutations_append_before_after_events() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();

    let (mut internal, erp, psp) = consistent_record_sets("REF", 2);
    internal.retain(|r| r.merchant_ref != "REF-002");
    let run = service.create_run("analyst").unwrap();
    service
        .run_reconciliation(run.id, &internal, &erp, &psp, &MatchRules::default())
        .unwrap();
    service
        .address_monthly_doubtful(run.id, "2026-03", "analyst")
        .unwrap();
    service
        .mark_monthly_notified(run.id, "2026-03", "analyst")
        .unwrap();

    let events = service.audit_events().unwrap();
    let actions: Vec<&str> = events.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            "create_run",
            "ingest_run_results",
            "monthly_address_doubtful",
            "monthly_notify_sources",
        ]
    );

    // Notify carries the flag flip as before/after snapshots.
    let notify = &events[3];
    assert_eq!(notify.actor, "analyst");
    assert_eq!(notify.entity_type, "monthly_submission");
    assert_eq!(notify.entity_id, format!("{}:2026-03", run.id));
    assert_eq!(notify.before["notified_to_source"], false);
    assert_eq!(notify.after["notified_to_source"], true);

    // The chained ledger verifies end to end.
    let result = verify_hash_chain(dir.path().join("audit.jsonl")).unwrap();
    assert_eq!(result, VerifyResult::Valid { lines: 4 });
}
