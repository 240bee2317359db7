//! Consolidated monthly close projection (calendar month across runs).

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use tally_schemas::{
    CloseNextAction, DailyCloseState, DailyOpsSummary, MonthlyCloseBatch, MonthlyCloseState,
};

#[derive(Debug, Clone, Default)]
struct CloseBucket {
    source_run_ids: BTreeSet<Uuid>,
    total: usize,
    good: usize,
    doubtful: usize,
    unresolved: usize,
}

/// Aggregate per-calendar-month batches across every daily-closed run.
///
/// Runs still open contribute nothing: their numbers enter the batch only
/// once their daily close is complete. Months carrying a persisted close
/// state record appear even when no closed run feeds them yet.
pub fn build_monthly_close_batches(
    daily_summaries: &[DailyOpsSummary],
    states: &BTreeMap<String, MonthlyCloseState>,
) -> Vec<MonthlyCloseBatch> {
    let mut buckets: BTreeMap<&str, CloseBucket> = BTreeMap::new();

    for daily in daily_summaries {
        if daily.close_state != DailyCloseState::Closed {
            continue;
        }
        for item in &daily.monthly_items {
            let bucket = buckets.entry(item.month.as_str()).or_default();
            bucket.source_run_ids.insert(daily.run_id);
            bucket.total += item.total_transactions;
            bucket.good += item.good_transactions;
            bucket.doubtful += item.doubtful_transactions;
            bucket.unresolved += item.unresolved_doubtful;
        }
    }

    let mut months: BTreeSet<&str> = buckets.keys().copied().collect();
    months.extend(states.keys().map(String::as_str));

    let mut out = Vec::with_capacity(months.len());
    for month in months {
        let bucket = buckets.get(month).cloned().unwrap_or_default();
        let state = states.get(month).cloned().unwrap_or_default();

        let source_run_ids: Vec<Uuid> = bucket.source_run_ids.iter().copied().collect();
        let source_run_count = source_run_ids.len();
        let ready_for_erp = source_run_count > 0 && bucket.unresolved == 0;

        // First match wins.
        let next_action = if state.submitted_to_erp {
            CloseNextAction::Completed
        } else if !ready_for_erp {
            CloseNextAction::WaitForDailyClose
        } else if !state.journal_created {
            CloseNextAction::CreateJournal
        } else {
            CloseNextAction::SubmitToErp
        };

        out.push(MonthlyCloseBatch {
            month: month.to_string(),
            source_run_ids,
            source_run_count,
            total_transactions: bucket.total,
            good_transactions: bucket.good,
            doubtful_transactions: bucket.doubtful,
            unresolved_doubtful: bucket.unresolved,
            ready_for_erp,
            journal_created: state.journal_created,
            submitted_to_erp: state.submitted_to_erp,
            next_action,
            journal_created_at: state.journal_created_at,
            submitted_at: state.submitted_at,
        });
    }

    out
}
