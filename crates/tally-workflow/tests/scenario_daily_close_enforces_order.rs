//! Daily close lifecycle: address → notify → close must happen in that
//! order, and the closed run feeds the cross-run monthly batch.

use tally_engine::MatchRules;
use tally_schemas::{CloseNextAction, DailyCloseState, DailyNextAction};
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

/// REF-001 good, REF-002 doubtful (missing internal), month 2026-03.
fn seed_mixed_run(service: &WorkflowService) -> Uuid {
    let (mut internal, erp, psp) = consistent_record_sets("REF", 2);
    internal.retain(|r| r.merchant_ref != "REF-002");
    let run = service.create_run("analyst").unwrap();
    service
        .run_reconciliation(run.id, &internal, &erp, &psp, &MatchRules::default())
        .unwrap();
    run.id
}

#[test]
fn scenario_ordered_daily_close_feeds_monthly_batch() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    let run_id = seed_mixed_run(&service);

    let daily = service.get_daily_ops(run_id).unwrap();
    assert_eq!(daily.close_state, DailyCloseState::Open);
    assert_eq!(daily.next_action, DailyNextAction::AddressDoubtful);
    assert_eq!(daily.notifications_required, 1);
    assert_eq!(daily.notifications_sent, 0);

    // Closing before addressing the doubtful item is rejected.
    let err = service.close_daily_ops(run_id, "supervisor").unwrap_err();
    assert_validation(err, "address_doubtful");

    let daily = service.address_daily_doubtful(run_id, "analyst").unwrap();
    assert_eq!(daily.unresolved_doubtful, 0);
    assert_eq!(daily.next_action, DailyNextAction::SendNotifications);

    // Still not closable: the doubtful month has not been notified.
    let err = service.close_daily_ops(run_id, "supervisor").unwrap_err();
    assert_validation(err, "send_notifications");

    let daily = service.notify_daily_ops(run_id, "analyst").unwrap();
    assert_eq!(daily.notifications_sent, 1);
    assert_eq!(daily.close_state, DailyCloseState::ReadyToClose);
    assert_eq!(daily.next_action, DailyNextAction::CloseDay);

    let daily = service.close_daily_ops(run_id, "supervisor").unwrap();
    assert_eq!(daily.close_state, DailyCloseState::Closed);
    assert!(daily.closed_at.is_some());

    // The closed run now contributes to the calendar-month batch.
    let batch = service.get_monthly_close_batch("2026-03").unwrap();
    assert_eq!(batch.source_run_count, 1);
    assert_eq!(batch.source_run_ids, vec![run_id]);
    assert_eq!(batch.total_transactions, 2);
    assert_eq!(batch.good_transactions, 1);
    assert_eq!(batch.doubtful_transactions, 1);
    assert_eq!(batch.unresolved_doubtful, 0);
    assert!(batch.ready_for_erp);
    assert_eq!(batch.next_action, CloseNextAction::CreateJournal);
}

#[test]
fn scenario_incomplete_run_waits_for_completion() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    let run = service.create_run("analyst").unwrap();

    let daily = service.get_daily_ops(run.id).unwrap();
    assert_eq!(daily.close_state, DailyCloseState::Open);
    assert_eq!(daily.next_action, DailyNextAction::WaitRunCompletion);

    let err = service.close_daily_ops(run.id, "supervisor").unwrap_err();
    assert_validation(err, "wait_run_completion");
}

#[test]
fn scenario_notify_fails_fast_without_partial_effects() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();

    // Two doubtful months: both references missing internally, one dated
    // March, the other April.
    let (_, mut erp, mut psp) = consistent_record_sets("REF", 2);
    for row in erp.iter_mut().chain(psp.iter_mut()) {
        if row.merchant_ref == "REF-002" {
            row.transaction_date = "2026-04-02T09:00:00".to_string();
        }
    }
    let run = service.create_run("analyst").unwrap();
    service
        .run_reconciliation(run.id, &[], &erp, &psp, &MatchRules::default())
        .unwrap();

    // Only March gets addressed; April still has unresolved doubtful.
    service
        .address_monthly_doubtful(run.id, "2026-03", "analyst")
        .unwrap();

    let err = service.notify_daily_ops(run.id, "analyst").unwrap_err();
    assert_validation(err, "2026-04 still has unresolved doubtful");

    // Fail fast means fail whole: March was NOT notified either.
    let march = service
        .get_monthly_submission(run.id, "2026-03")
        .unwrap();
    assert!(!march.notified_to_source);
}

#[test]
fn scenario_business_date_defaults_and_validation() {
    let dir = TempDir::new().unwrap();
    let service = WorkflowService::open(dir.path(), true).unwrap();
    let run = service.create_run("analyst").unwrap();

    // Defaults to the run's creation date.
    let daily = service.get_daily_ops(run.id).unwrap();
    assert_eq!(
        daily.business_date,
        run.created_at.format("%Y-%m-%d").to_string()
    );

    let daily = service
        .set_daily_business_date(run.id, "2026-02-03", "analyst")
        .unwrap();
    assert_eq!(daily.business_date, "2026-02-03");

    let err = service
        .set_daily_business_date(run.id, "03/02/2026", "analyst")
        .unwrap_err();
    assert_validation(err, "business_date must be YYYY-MM-DD");
}
