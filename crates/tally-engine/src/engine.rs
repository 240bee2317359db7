use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use tally_schemas::{
    BackdateTrace, ExactHashTrace, ExceptionCase, ExceptionState, FinalStatus, FuzzyTrace,
    FxTrace, MatchDecision, MatchTrace, PairWise, PerSource, ReasonCode, Severity, SourceRecord,
    SourcesPresent, StageResult, ThreeWayTrace,
};

use crate::dates::{date_gap_days, month_from_sources};
use crate::rules::{normalize_status, FuzzyWeights, MatchRules};

/// Everything one engine pass produces: an immutable decision per reference
/// and an open exception case per doubtful decision.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub decisions: Vec<MatchDecision>,
    pub exceptions: Vec<ExceptionCase>,
}

/// Content digest of the fields that must agree for an exact match:
/// reference, amount triplet, currency, date-only transaction date and
/// client id. Identical formatting on all three sources, so digest equality
/// is field-tuple equality.
pub fn row_digest(row: &SourceRecord) -> String {
    let date_part = row
        .transaction_date
        .get(..10)
        .unwrap_or(&row.transaction_date);
    let key = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        row.merchant_ref,
        row.gross_amount,
        row.currency,
        row.processing_fee,
        row.net_payout,
        date_part,
        row.client_id,
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Weighted similarity between one pair of source rows. Rounded to four
/// decimals so scores are stable across platforms.
fn score_pair(a: &SourceRecord, b: &SourceRecord, w: &FuzzyWeights) -> f64 {
    let mut score = 0.0;
    if a.merchant_ref == b.merchant_ref {
        score += w.merchant_ref;
    }
    // The amount triplet matches as a unit; a single drifted component
    // forfeits the whole weight. NaN never equals NaN, so uncoerced
    // amounts fail here naturally.
    let amounts_match = a.gross_amount == b.gross_amount
        && a.processing_fee == b.processing_fee
        && a.net_payout == b.net_payout;
    if amounts_match {
        score += w.amounts;
    }
    if normalize_status(&a.status) == normalize_status(&b.status) {
        score += w.status;
    }
    if a.client_id == b.client_id {
        score += w.client_id;
    }
    if a.payment_method == b.payment_method {
        score += w.payment_method;
    }
    round4(score)
}

/// FX is handled when all three rows agree on currency, or every row
/// carries a finite, strictly positive fx rate.
fn fx_can_handle(i: &SourceRecord, e: &SourceRecord, p: &SourceRecord) -> bool {
    let currencies: BTreeSet<&str> = [
        i.currency.as_str(),
        e.currency.as_str(),
        p.currency.as_str(),
    ]
    .into_iter()
    .collect();
    if currencies.len() == 1 {
        return true;
    }
    [i.fx_rate, e.fx_rate, p.fx_rate]
        .into_iter()
        .all(|r| matches!(r, Some(v) if v.is_finite() && v > 0.0))
}

fn index_by_ref(rows: &[SourceRecord]) -> BTreeMap<&str, &SourceRecord> {
    // Later duplicates win, same as the upstream normalizer's keying.
    rows.iter().map(|r| (r.merchant_ref.as_str(), r)).collect()
}

/// Run the three-way match for one run.
///
/// Evaluates every distinct reference across the union of the three key
/// sets, in sorted reference order. Never fails: data problems surface as
/// reason codes on the affected reference's decision.
pub fn reconcile(
    run_id: Uuid,
    internal: &[SourceRecord],
    erp: &[SourceRecord],
    psp: &[SourceRecord],
    rules: &MatchRules,
) -> ReconcileOutcome {
    let internal_idx = index_by_ref(internal);
    let erp_idx = index_by_ref(erp);
    let psp_idx = index_by_ref(psp);

    let mut all_refs: BTreeSet<&str> = BTreeSet::new();
    all_refs.extend(internal_idx.keys());
    all_refs.extend(erp_idx.keys());
    all_refs.extend(psp_idx.keys());

    let mut decisions = Vec::with_capacity(all_refs.len());
    let mut exceptions = Vec::new();

    for merchant_ref in all_refs {
        let i = internal_idx.get(merchant_ref).copied();
        let e = erp_idx.get(merchant_ref).copied();
        let p = psp_idx.get(merchant_ref).copied();
        let transaction_month = month_from_sources([i, e, p]);

        let decision = match (i, e, p) {
            (Some(i), Some(e), Some(p)) => {
                evaluate_reference(run_id, merchant_ref, i, e, p, transaction_month, rules)
            }
            _ => missing_source_decision(run_id, merchant_ref, i, e, p, transaction_month, rules),
        };

        if decision.final_status == FinalStatus::DoubtfulTransaction {
            let reason_codes = if decision.reason_codes.is_empty() {
                vec![ReasonCode::ManualReviewRequired]
            } else {
                decision.reason_codes.clone()
            };
            exceptions.push(ExceptionCase {
                id: Uuid::new_v4(),
                run_id,
                merchant_ref: merchant_ref.to_string(),
                severity: Severity::Medium,
                reason_codes,
                state: ExceptionState::Open,
            });
        }
        decisions.push(decision);
    }

    ReconcileOutcome {
        decisions,
        exceptions,
    }
}

/// Decision for a reference absent from at least one source. All stage
/// checks after presence are skipped, not failed-and-computed.
fn missing_source_decision(
    run_id: Uuid,
    merchant_ref: &str,
    i: Option<&SourceRecord>,
    e: Option<&SourceRecord>,
    p: Option<&SourceRecord>,
    transaction_month: String,
    rules: &MatchRules,
) -> MatchDecision {
    let trace = MatchTrace {
        sources_present: SourcesPresent {
            internal: i.is_some(),
            erp: e.is_some(),
            psp: p.is_some(),
        },
        exact_hash: ExactHashTrace {
            matched: false,
            skipped: true,
            hashes: None,
        },
        fuzzy: FuzzyTrace {
            score: None,
            threshold: rules.fuzzy_threshold,
            skipped: true,
            pair_scores: None,
        },
        three_way: ThreeWayTrace {
            presence_check: false,
            amount_check: false,
            identity_check: false,
        },
        backdated: BackdateTrace {
            window_days: rules.backdate_window_days,
            max_gap_days: None,
            pair_gaps_days: None,
        },
        fx: FxTrace {
            handled: false,
            detail: "not_applicable_missing_sources".to_string(),
            currencies: Vec::new(),
            rates: PerSource {
                internal: None,
                erp: None,
                psp: None,
            },
        },
    };

    MatchDecision {
        run_id,
        merchant_ref: merchant_ref.to_string(),
        final_status: FinalStatus::DoubtfulTransaction,
        reason_codes: vec![ReasonCode::MissingInOneOrMoreSources],
        stage_results: StageResult::default(),
        transaction_month,
        fuzzy_score: None,
        backdated_gap_days: None,
        fx_detail: "not_applicable_missing_sources".to_string(),
        trace,
    }
}

/// Full five-stage evaluation for a reference present in all three sources.
fn evaluate_reference(
    run_id: Uuid,
    merchant_ref: &str,
    i: &SourceRecord,
    e: &SourceRecord,
    p: &SourceRecord,
    transaction_month: String,
    rules: &MatchRules,
) -> MatchDecision {
    let mut stage = StageResult::default();
    let w = &rules.fuzzy_weights;

    // Stage: exact digest across all three rows.
    let (h_i, h_e, h_p) = (row_digest(i), row_digest(e), row_digest(p));
    stage.exact_hash = h_i == h_e && h_e == h_p;

    // Stage: fuzzy. Pair scores are always computed for the trace; the
    // pass/fail and the reported score come from the exact-hash shortcut
    // when it matched.
    let pair_scores = PairWise {
        internal_vs_erp: score_pair(i, e, w),
        internal_vs_psp: score_pair(i, p, w),
        erp_vs_psp: score_pair(e, p, w),
    };
    let fuzzy_score = if stage.exact_hash {
        stage.fuzzy = true;
        1.0
    } else {
        // Conservative: every pair must clear the threshold on its own; one
        // weak pair fails the whole reference.
        stage.fuzzy = pair_scores.min() >= rules.fuzzy_threshold;
        pair_scores.min()
    };

    // Stage: strict three-way equality on amounts and identity fields.
    let amount_check = i.gross_amount == e.gross_amount
        && e.gross_amount == p.gross_amount
        && i.processing_fee == e.processing_fee
        && e.processing_fee == p.processing_fee
        && i.net_payout == e.net_payout
        && e.net_payout == p.net_payout;
    let identity_check = i.client_id == e.client_id
        && e.client_id == p.client_id
        && i.currency == e.currency
        && e.currency == p.currency
        && i.bank_country == e.bank_country
        && e.bank_country == p.bank_country;
    stage.three_way = amount_check && identity_check;

    // Stage: backdate window. An unparseable date is a data-quality
    // failure on this reference, never a run abort.
    let gap_ie = date_gap_days(&i.transaction_date, &e.transaction_date);
    let gap_ip = date_gap_days(&i.transaction_date, &p.transaction_date);
    let gap_ep = date_gap_days(&e.transaction_date, &p.transaction_date);
    let (max_gap, pair_gaps, malformed_dates) = match (gap_ie, gap_ip, gap_ep) {
        (Some(ie), Some(ip), Some(ep)) => {
            let gaps = PairWise {
                internal_vs_erp: ie,
                internal_vs_psp: ip,
                erp_vs_psp: ep,
            };
            (Some(gaps.max()), Some(gaps), false)
        }
        _ => (None, None, true),
    };
    stage.backdated = matches!(max_gap, Some(g) if g <= rules.backdate_window_days);

    // Stage: FX sufficiency.
    stage.fx_handled = fx_can_handle(i, e, p);
    let fx_detail = if stage.fx_handled {
        "handled"
    } else {
        "insufficient_fx_data"
    };

    // Failing stages become reason codes, in fixed token order.
    let mut reasons = Vec::new();
    if !stage.exact_hash {
        reasons.push(ReasonCode::ExactHashMismatch);
    }
    if !stage.fuzzy {
        reasons.push(ReasonCode::FuzzyThresholdNotMet);
    }
    if !stage.three_way {
        reasons.push(ReasonCode::ThreeWayValidationFailed);
    }
    if !stage.backdated {
        reasons.push(ReasonCode::BackdatedWindowExceeded);
    }
    if !stage.fx_handled {
        reasons.push(ReasonCode::FxDataInsufficient);
    }
    if malformed_dates {
        reasons.push(ReasonCode::MalformedSourceData);
    }

    // Exact hash alone never grants GOOD; the four content stages must all
    // hold independently.
    let final_status = if stage.fuzzy && stage.three_way && stage.backdated && stage.fx_handled {
        FinalStatus::GoodTransaction
    } else {
        FinalStatus::DoubtfulTransaction
    };

    let trace = MatchTrace {
        sources_present: SourcesPresent {
            internal: true,
            erp: true,
            psp: true,
        },
        exact_hash: ExactHashTrace {
            matched: stage.exact_hash,
            skipped: false,
            hashes: Some(PerSource {
                internal: h_i[..12].to_string(),
                erp: h_e[..12].to_string(),
                psp: h_p[..12].to_string(),
            }),
        },
        fuzzy: FuzzyTrace {
            score: Some(fuzzy_score),
            threshold: rules.fuzzy_threshold,
            skipped: false,
            pair_scores: Some(pair_scores),
        },
        three_way: ThreeWayTrace {
            presence_check: true,
            amount_check,
            identity_check,
        },
        backdated: BackdateTrace {
            window_days: rules.backdate_window_days,
            max_gap_days: max_gap,
            pair_gaps_days: pair_gaps,
        },
        fx: FxTrace {
            handled: stage.fx_handled,
            detail: fx_detail.to_string(),
            currencies: vec![i.currency.clone(), e.currency.clone(), p.currency.clone()],
            rates: PerSource {
                internal: i.fx_rate,
                erp: e.fx_rate,
                psp: p.fx_rate,
            },
        },
    };

    MatchDecision {
        run_id,
        merchant_ref: merchant_ref.to_string(),
        final_status,
        reason_codes: reasons,
        stage_results: stage,
        transaction_month,
        fuzzy_score: Some(fuzzy_score),
        backdated_gap_days: max_gap,
        fx_detail: fx_detail.to_string(),
        trace,
    }
}
