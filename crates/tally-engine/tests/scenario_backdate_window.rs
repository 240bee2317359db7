use tally_engine::{reconcile, MatchRules};
use tally_schemas::{FinalStatus, ReasonCode};
use tally_testkit::record;
use uuid::Uuid;

#[test]
fn scenario_gap_at_window_boundary_passes() {
    // Settlement reporting lag: ERP saw the transaction three days later.
    // Max pairwise gap == window (3 days) still passes.
    let internal = vec![record("REF-001")
        .transaction_date("2026-03-01T09:00:00")
        .build()];
    let erp = vec![record("REF-001")
        .transaction_date("2026-03-04T18:00:00")
        .build()];
    let psp = vec![record("REF-001")
        .transaction_date("2026-03-01T23:59:59")
        .build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    let decision = &outcome.decisions[0];

    assert!(decision.stage_results.backdated);
    assert_eq!(decision.backdated_gap_days, Some(3));
    // Dates differ so the digest differs, but fuzzy does not weigh dates:
    // an exact-hash mismatch alone leaves the decision GOOD.
    assert!(!decision.stage_results.exact_hash);
    assert_eq!(decision.final_status, FinalStatus::GoodTransaction);
    assert_eq!(decision.reason_codes, vec![ReasonCode::ExactHashMismatch]);
}

#[test]
fn scenario_gap_beyond_window_is_doubtful() {
    let internal = vec![record("REF-001")
        .transaction_date("2026-03-01T09:00:00")
        .build()];
    let erp = vec![record("REF-001")
        .transaction_date("2026-03-05T00:00:00")
        .build()];
    let psp = vec![record("REF-001")
        .transaction_date("2026-03-01T09:00:00")
        .build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    let decision = &outcome.decisions[0];

    assert!(!decision.stage_results.backdated);
    assert_eq!(decision.backdated_gap_days, Some(4));
    assert_eq!(decision.final_status, FinalStatus::DoubtfulTransaction);
    assert!(decision
        .reason_codes
        .contains(&ReasonCode::BackdatedWindowExceeded));

    let gaps = decision.trace.backdated.pair_gaps_days.as_ref().unwrap();
    assert_eq!(gaps.internal_vs_erp, 4);
    assert_eq!(gaps.internal_vs_psp, 0);
    assert_eq!(gaps.erp_vs_psp, 4);
}

#[test]
fn scenario_wider_window_accepts_the_same_gap() {
    let internal = vec![record("REF-001")
        .transaction_date("2026-03-01T09:00:00")
        .build()];
    let erp = vec![record("REF-001")
        .transaction_date("2026-03-05T00:00:00")
        .build()];
    let psp = vec![record("REF-001")
        .transaction_date("2026-03-01T09:00:00")
        .build()];

    let rules = MatchRules {
        backdate_window_days: 5,
        ..MatchRules::default()
    };
    let outcome = reconcile(Uuid::new_v4(), &internal, &erp, &psp, &rules);
    let decision = &outcome.decisions[0];

    assert!(decision.stage_results.backdated);
    assert_eq!(decision.final_status, FinalStatus::GoodTransaction);
}
