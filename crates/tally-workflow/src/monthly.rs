//! Monthly submission projection (run × month scope).
//!
//! Pure functions: (decisions, exceptions, persisted flag records) in,
//! derived summaries out. The service layer owns locking, guards, audit and
//! persistence.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use tally_schemas::{
    ExceptionCase, ExceptionState, MatchDecision, MonthlyAlertRecipient, MonthlyDoubtfulDetail,
    MonthlyNextAction, MonthlySubmissionState, MonthlySubmissionSummary, RecipientKey, SourceKind,
};

/// Raw per-month counters scanned from the decisions.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MonthStats {
    pub total: usize,
    pub good: usize,
    pub doubtful: usize,
    pub addressed: usize,
    pub unresolved: usize,
}

/// Exception review state per reference. References without an exception
/// case read as open (they only matter for doubtful decisions, which always
/// have one).
pub(crate) fn exception_state_by_ref(
    exceptions: &[ExceptionCase],
) -> BTreeMap<&str, ExceptionState> {
    exceptions
        .iter()
        .map(|e| (e.merchant_ref.as_str(), e.state))
        .collect()
}

/// Scan decisions into per-month counters and the reference set per month.
pub(crate) fn monthly_index<'a>(
    decisions: &'a [MatchDecision],
    exceptions: &[ExceptionCase],
) -> (
    BTreeMap<&'a str, MonthStats>,
    BTreeMap<&'a str, BTreeSet<&'a str>>,
) {
    let states = exception_state_by_ref(exceptions);
    let mut stats: BTreeMap<&str, MonthStats> = BTreeMap::new();
    let mut refs_by_month: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for decision in decisions {
        let month = decision.transaction_month.as_str();
        let row = stats.entry(month).or_default();
        refs_by_month
            .entry(month)
            .or_default()
            .insert(decision.merchant_ref.as_str());

        row.total += 1;
        if decision.final_status.is_good() {
            row.good += 1;
            continue;
        }

        row.doubtful += 1;
        let addressed = states
            .get(decision.merchant_ref.as_str())
            .is_some_and(ExceptionState::is_addressed);
        if addressed {
            row.addressed += 1;
        } else {
            row.unresolved += 1;
        }
    }

    (stats, refs_by_month)
}

/// Which counterparties to alert for one doubtful reference, from the
/// sources that failed to report it. All-sources-present mismatches route
/// to reconciliation ops.
pub(crate) fn derive_alert_recipients(missing_sources: &[SourceKind]) -> Vec<RecipientKey> {
    let mut recipients: BTreeSet<RecipientKey> = BTreeSet::new();
    for source in missing_sources {
        recipients.insert(match source {
            SourceKind::Psp => RecipientKey::PspProvider,
            SourceKind::Internal => RecipientKey::InternalBackoffice,
            SourceKind::Erp => RecipientKey::CashierErp,
        });
    }
    if recipients.is_empty() {
        recipients.insert(RecipientKey::ReconciliationOps);
    }
    recipients.into_iter().collect()
}

/// Build every monthly submission summary for one run.
///
/// Months are the union of months seen in decisions and months carrying a
/// persisted state record, in sorted order. All counts and the next action
/// are recomputed here on every call.
pub fn build_monthly_summaries(
    run_id: Uuid,
    decisions: &[MatchDecision],
    exceptions: &[ExceptionCase],
    states: Option<&BTreeMap<String, MonthlySubmissionState>>,
) -> Vec<MonthlySubmissionSummary> {
    let (stats, _) = monthly_index(decisions, exceptions);
    let exception_states = exception_state_by_ref(exceptions);

    // Per-month doubtful details and recipient → affected-refs aggregation.
    let mut details_by_month: BTreeMap<&str, Vec<MonthlyDoubtfulDetail>> = BTreeMap::new();
    let mut recipients_by_month: BTreeMap<&str, BTreeMap<RecipientKey, BTreeSet<&str>>> =
        BTreeMap::new();

    for decision in decisions {
        if decision.final_status.is_good() {
            continue;
        }
        let month = decision.transaction_month.as_str();
        let missing_sources = decision.trace.sources_present.missing();
        let recipients = derive_alert_recipients(&missing_sources);

        details_by_month
            .entry(month)
            .or_default()
            .push(MonthlyDoubtfulDetail {
                merchant_ref: decision.merchant_ref.clone(),
                state: exception_states
                    .get(decision.merchant_ref.as_str())
                    .copied()
                    .unwrap_or(ExceptionState::Open),
                reason_codes: decision.reason_codes.clone(),
                missing_sources,
                recipients: recipients.clone(),
            });

        let target = recipients_by_month.entry(month).or_default();
        for recipient in recipients {
            target
                .entry(recipient)
                .or_default()
                .insert(decision.merchant_ref.as_str());
        }
    }

    let mut months: BTreeSet<&str> = stats.keys().copied().collect();
    if let Some(states) = states {
        months.extend(states.keys().map(String::as_str));
    }

    let mut out = Vec::with_capacity(months.len());
    for month in months {
        let row = stats.get(month).copied().unwrap_or_default();
        let state = states
            .and_then(|s| s.get(month))
            .cloned()
            .unwrap_or_default();

        let ready_for_submission = row.total > 0 && row.unresolved == 0;

        // Recipients ordered by affected-reference count descending, key as
        // the deterministic tie-break.
        let mut alert_recipients: Vec<MonthlyAlertRecipient> = recipients_by_month
            .get(month)
            .map(|by_recipient| {
                by_recipient
                    .iter()
                    .map(|(recipient, refs)| MonthlyAlertRecipient {
                        recipient_key: *recipient,
                        recipient_label: recipient.label().to_string(),
                        reason: recipient.reason().to_string(),
                        count: refs.len(),
                        merchant_refs: refs.iter().map(|r| r.to_string()).collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        alert_recipients.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.recipient_key.cmp(&b.recipient_key))
        });

        // First match wins.
        let next_action = if state.submitted_to_erp {
            MonthlyNextAction::Completed
        } else if !ready_for_submission {
            MonthlyNextAction::AddressDoubtful
        } else if row.doubtful > 0 && !state.notified_to_source {
            MonthlyNextAction::NotifySources
        } else if row.good > 0 && !state.journal_created {
            MonthlyNextAction::CreateJournal
        } else {
            MonthlyNextAction::SubmitToErp
        };

        out.push(MonthlySubmissionSummary {
            run_id,
            month: month.to_string(),
            total_transactions: row.total,
            good_transactions: row.good,
            doubtful_transactions: row.doubtful,
            addressed_doubtful: row.addressed,
            unresolved_doubtful: row.unresolved,
            ready_for_submission,
            notified_to_source: state.notified_to_source,
            journal_created: state.journal_created,
            submitted_to_erp: state.submitted_to_erp,
            next_action,
            notified_at: state.notified_at,
            journal_created_at: state.journal_created_at,
            submitted_at: state.submitted_at,
            alert_recipients,
            doubtful_details: details_by_month.remove(month).unwrap_or_default(),
        });
    }

    out
}
