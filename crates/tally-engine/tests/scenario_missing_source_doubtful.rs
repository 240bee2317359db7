use tally_engine::{reconcile, MatchRules};
use tally_schemas::{ExceptionState, FinalStatus, ReasonCode, Severity};
use tally_testkit::consistent_record_sets;
use uuid::Uuid;

#[test]
fn scenario_missing_source_is_doubtful_with_skipped_stages() {
    let (mut internal, erp, psp) = consistent_record_sets("REF", 2);
    // REF-002 never reached the internal ledger.
    internal.retain(|r| r.merchant_ref != "REF-002");

    let run_id = Uuid::new_v4();
    let outcome = reconcile(run_id, &internal, &erp, &psp, &MatchRules::default());

    assert_eq!(outcome.decisions.len(), 2);
    let doubtful = &outcome.decisions[1];
    assert_eq!(doubtful.merchant_ref, "REF-002");
    assert_eq!(doubtful.final_status, FinalStatus::DoubtfulTransaction);
    assert_eq!(
        doubtful.reason_codes,
        vec![ReasonCode::MissingInOneOrMoreSources]
    );

    // No content check runs when a source is absent; they are reported as
    // skipped, not failed-and-computed.
    assert!(doubtful.trace.exact_hash.skipped);
    assert!(doubtful.trace.fuzzy.skipped);
    assert!(doubtful.trace.fuzzy.score.is_none());
    assert!(!doubtful.trace.three_way.presence_check);
    assert!(doubtful.trace.backdated.max_gap_days.is_none());
    assert!(!doubtful.trace.sources_present.internal);
    assert!(doubtful.trace.sources_present.erp);
    assert!(doubtful.trace.sources_present.psp);
    assert_eq!(doubtful.fuzzy_score, None);
    assert_eq!(doubtful.backdated_gap_days, None);
    assert_eq!(doubtful.fx_detail, "not_applicable_missing_sources");

    // The month is still derived from the sources that did report.
    assert_eq!(doubtful.transaction_month, "2026-03");

    // Exactly one exception case, 1:1 with the doubtful decision.
    assert_eq!(outcome.exceptions.len(), 1);
    let exc = &outcome.exceptions[0];
    assert_eq!(exc.run_id, run_id);
    assert_eq!(exc.merchant_ref, "REF-002");
    assert_eq!(exc.severity, Severity::Medium);
    assert_eq!(exc.state, ExceptionState::Open);
    assert_eq!(exc.reason_codes, doubtful.reason_codes);
}
