//! Daily operational close projection (run scope).

use std::collections::{BTreeMap, BTreeSet};

use tally_schemas::{
    DailyCloseState, DailyNextAction, DailyNotificationTarget, DailyOpsState, DailyOpsSummary,
    MonthlySubmissionSummary, RecipientKey, ReconciliationRun, RunStatus,
};

/// Roll a run's monthly items up into its daily close summary.
///
/// The only persisted inputs are `state` (business date + closed_at); every
/// counter is summed from the recomputed monthly items.
pub fn build_daily_summary(
    run: &ReconciliationRun,
    monthly_items: Vec<MonthlySubmissionSummary>,
    state: Option<&DailyOpsState>,
) -> DailyOpsSummary {
    let total_transactions: usize = monthly_items.iter().map(|m| m.total_transactions).sum();
    let good_transactions: usize = monthly_items.iter().map(|m| m.good_transactions).sum();
    let doubtful_transactions: usize =
        monthly_items.iter().map(|m| m.doubtful_transactions).sum();
    let unresolved_doubtful: usize = monthly_items.iter().map(|m| m.unresolved_doubtful).sum();
    let addressed_doubtful: usize = monthly_items.iter().map(|m| m.addressed_doubtful).sum();

    // Notification accounting is per month: a month with doubtful items
    // requires one notification batch to its sources.
    let notifications_required = monthly_items
        .iter()
        .filter(|m| m.doubtful_transactions > 0)
        .count();
    let notifications_sent = monthly_items
        .iter()
        .filter(|m| m.doubtful_transactions > 0 && m.notified_to_source)
        .count();

    // Union each recipient's affected references across the run's months.
    let mut refs_by_recipient: BTreeMap<RecipientKey, BTreeSet<&str>> = BTreeMap::new();
    for item in &monthly_items {
        for target in &item.alert_recipients {
            refs_by_recipient
                .entry(target.recipient_key)
                .or_default()
                .extend(target.merchant_refs.iter().map(String::as_str));
        }
    }
    let mut notification_targets: Vec<DailyNotificationTarget> = refs_by_recipient
        .iter()
        .map(|(recipient, refs)| DailyNotificationTarget {
            recipient_key: *recipient,
            recipient_label: recipient.label().to_string(),
            count: refs.len(),
            merchant_refs: refs.iter().map(|r| r.to_string()).collect(),
        })
        .collect();
    notification_targets.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.recipient_key.cmp(&b.recipient_key))
    });

    let closed_at = state.and_then(|s| s.closed_at);
    let business_date = state
        .and_then(|s| s.business_date.clone())
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| run.created_at.format("%Y-%m-%d").to_string());

    // First match wins.
    let (close_state, next_action) = if closed_at.is_some() {
        (DailyCloseState::Closed, DailyNextAction::Closed)
    } else if run.status != RunStatus::Completed {
        (DailyCloseState::Open, DailyNextAction::WaitRunCompletion)
    } else if unresolved_doubtful > 0 {
        (DailyCloseState::Open, DailyNextAction::AddressDoubtful)
    } else if notifications_sent < notifications_required {
        (DailyCloseState::Open, DailyNextAction::SendNotifications)
    } else {
        (DailyCloseState::ReadyToClose, DailyNextAction::CloseDay)
    };

    DailyOpsSummary {
        run_id: run.id,
        run_status: run.status,
        business_date,
        total_transactions,
        good_transactions,
        doubtful_transactions,
        unresolved_doubtful,
        addressed_doubtful,
        notifications_required,
        notifications_sent,
        close_state,
        next_action,
        closed_at,
        notification_targets,
        monthly_items,
    }
}
