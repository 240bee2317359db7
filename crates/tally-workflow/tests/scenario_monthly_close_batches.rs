//! Cross-run monthly close: only daily-closed runs contribute, journal
//! precedes ERP submission, and revert returns the batch to the journal
//! stage.

use tally_engine::MatchRules;
use tally_schemas::CloseNextAction;
use tally_testkit::consistent_record_sets;
use tally_workflow::{WorkflowError, WorkflowService};
use tempfile::TempDir;
use uuid::Uuid;

fn assert_validation(err: WorkflowError, needle: &str) {
    match err {
        WorkflowError::Validation(msg) => {
            assert!(msg.contains(needle), "expected {needle:?} in {msg:?}")
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

/// All-good run over two references in 2026-03. Ready to close right after
/// completion: nothing doubtful, nothing to notify.
fn seed_clean_run(service: &WorkflowService) -> Uuid {
    let (internal, erp, psp) = consistent_record_sets("REF", 2);
    let run = service.create_run("analyst").unwrap();
    service
        .run_reconciliation(run.id, &internal, &erp, &psp, &MatchRules::default())
        .unwrap();
    run.id
}

#[test]
fn scenario_open_runs_do_not_contribute() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();

    let first = seed_clean_run(&service);
    let second = seed_clean_run(&service);
    service.close_daily_ops(first, "supervisor").unwrap();

    // Only the closed run is in the batch.
    let batch = service.get_monthly_close_batch("2026-03").unwrap();
    assert_eq!(batch.source_run_count, 1);
    assert_eq!(batch.source_run_ids, vec![first]);
    assert_eq!(batch.total_transactions, 2);

    // Closing the second run doubles the batch.
    service.close_daily_ops(second, "supervisor").unwrap();
    let batch = service.get_monthly_close_batch("2026-03").unwrap();
    assert_eq!(batch.source_run_count, 2);
    assert_eq!(batch.total_transactions, 4);
    assert_eq!(batch.good_transactions, 4);
    assert!(batch.ready_for_erp);
}

#[test]
fn scenario_journal_then_submit_then_revert() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    let run_id = seed_clean_run(&service);
    service.close_daily_ops(run_id, "supervisor").unwrap();

    // Submission requires the consolidated journal first.
    let err = service
        .submit_monthly_close_to_erp("2026-03", "admin")
        .unwrap_err();
    assert_validation(err, "create monthly journal before submitting");

    let batch = service
        .create_monthly_close_journal("2026-03", "supervisor")
        .unwrap();
    assert!(batch.journal_created);
    assert!(batch.journal_created_at.is_some());
    assert_eq!(batch.next_action, CloseNextAction::SubmitToErp);

    let batch = service
        .submit_monthly_close_to_erp("2026-03", "admin")
        .unwrap();
    assert!(batch.submitted_to_erp);
    assert_eq!(batch.next_action, CloseNextAction::Completed);

    // Revert clears both flags and their timestamps.
    let batch = service
        .revert_monthly_close_submission("2026-03", "admin")
        .unwrap();
    assert!(!batch.submitted_to_erp);
    assert!(!batch.journal_created);
    assert!(batch.journal_created_at.is_none());
    assert!(batch.submitted_at.is_none());
    assert_eq!(batch.next_action, CloseNextAction::CreateJournal);

    // The batch can walk the journal → submit path again.
    let batch = service
        .create_monthly_close_journal("2026-03", "supervisor")
        .unwrap();
    assert_eq!(batch.next_action, CloseNextAction::SubmitToErp);
}

#[test]
fn scenario_revert_requires_a_submission() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    let run_id = seed_clean_run(&service);
    service.close_daily_ops(run_id, "supervisor").unwrap();

    let err = service
        .revert_monthly_close_submission("2026-03", "admin")
        .unwrap_err();
    assert_validation(err, "has not been submitted");
}

#[test]
fn scenario_batch_not_ready_before_any_daily_close() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    seed_clean_run(&service);

    // No run has closed its day: the month is not even a batch yet.
    let err = service.get_monthly_close_batch("2026-03").unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
    assert!(service.list_monthly_close_batches().unwrap().is_empty());
}
