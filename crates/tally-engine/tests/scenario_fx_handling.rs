use tally_engine::{reconcile, MatchRules};
use tally_schemas::ReasonCode;
use tally_testkit::record;
use uuid::Uuid;

#[test]
fn scenario_same_currency_needs_no_fx_rates() {
    let internal = vec![record("REF-001").build()];
    let erp = vec![record("REF-001").build()];
    let psp = vec![record("REF-001").build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    let decision = &outcome.decisions[0];
    assert!(decision.stage_results.fx_handled);
    assert_eq!(decision.fx_detail, "handled");
}

#[test]
fn scenario_mixed_currencies_with_positive_rates_handled() {
    // PSP settles in USD; every source carries a positive rate, so the FX
    // stage passes. The identity check fails on currency, which is the
    // three-way stage's concern, not FX's.
    let internal = vec![record("REF-001").fx_rate(Some(1.0)).build()];
    let erp = vec![record("REF-001").fx_rate(Some(1.0)).build()];
    let psp = vec![record("REF-001")
        .currency("USD")
        .fx_rate(Some(1.0843))
        .build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    let decision = &outcome.decisions[0];

    assert!(decision.stage_results.fx_handled);
    assert!(!decision.stage_results.three_way);
    assert!(!decision
        .reason_codes
        .contains(&ReasonCode::FxDataInsufficient));
    assert!(decision
        .reason_codes
        .contains(&ReasonCode::ThreeWayValidationFailed));
}

#[test]
fn scenario_mixed_currencies_with_missing_rate_insufficient() {
    let internal = vec![record("REF-001").fx_rate(Some(1.0)).build()];
    let erp = vec![record("REF-001").fx_rate(None).build()];
    let psp = vec![record("REF-001")
        .currency("USD")
        .fx_rate(Some(1.0843))
        .build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    let decision = &outcome.decisions[0];

    assert!(!decision.stage_results.fx_handled);
    assert_eq!(decision.fx_detail, "insufficient_fx_data");
    assert!(decision
        .reason_codes
        .contains(&ReasonCode::FxDataInsufficient));
}

#[test]
fn scenario_non_positive_rate_is_insufficient() {
    let internal = vec![record("REF-001").fx_rate(Some(0.0)).build()];
    let erp = vec![record("REF-001").fx_rate(Some(1.0)).build()];
    let psp = vec![record("REF-001")
        .currency("USD")
        .fx_rate(Some(1.0843))
        .build()];

    let outcome = reconcile(
        Uuid::new_v4(),
        &internal,
        &erp,
        &psp,
        &MatchRules::default(),
    );
    assert!(!outcome.decisions[0].stage_results.fx_handled);
}
