use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ExceptionState, ReasonCode, RunStatus, SourceKind};

// ---------------------------------------------------------------------------
// Persisted workflow state records
// ---------------------------------------------------------------------------
//
// These three records are the ONLY workflow memory that is ever persisted.
// Every count, readiness flag and next-action below is recomputed from the
// decisions and exceptions on each read, so a summary can never drift from
// the underlying facts.

/// Persisted flags for one run×month submission bucket. Auto-created
/// all-false when the first decision lands in that month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySubmissionState {
    pub notified_to_source: bool,
    pub journal_created: bool,
    pub submitted_to_erp: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub journal_created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub doubtful_addressed_at: Option<DateTime<Utc>>,
}

/// Persisted daily-close memory for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyOpsState {
    /// ISO `YYYY-MM-DD`; defaults to the run's creation date when unset.
    pub business_date: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Persisted cross-run close memory for one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCloseState {
    pub journal_created: bool,
    pub submitted_to_erp: bool,
    pub journal_created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Alert recipients
// ---------------------------------------------------------------------------

/// Counterparty to notify about a month's doubtful transactions, derived
/// from which source failed to report each reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKey {
    PspProvider,
    InternalBackoffice,
    CashierErp,
    ReconciliationOps,
}

impl RecipientKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKey::PspProvider => "psp_provider",
            RecipientKey::InternalBackoffice => "internal_backoffice",
            RecipientKey::CashierErp => "cashier_erp",
            RecipientKey::ReconciliationOps => "reconciliation_ops",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecipientKey::PspProvider => "PSP Provider",
            RecipientKey::InternalBackoffice => "Internal Backoffice",
            RecipientKey::CashierErp => "Cashier (ERP)",
            RecipientKey::ReconciliationOps => "Reconciliation Ops",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            RecipientKey::PspProvider => "Missing or inconsistent PSP statement entry.",
            RecipientKey::InternalBackoffice => "Missing or inconsistent internal backoffice record.",
            RecipientKey::CashierErp => "Missing or inconsistent ERP/cashier record.",
            RecipientKey::ReconciliationOps => "General reconciliation mismatch requiring review.",
        }
    }
}

// ---------------------------------------------------------------------------
// Monthly submission summary (run × month, derived)
// ---------------------------------------------------------------------------

/// Next workflow step for a run×month bucket, first-match-wins precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyNextAction {
    Completed,
    AddressDoubtful,
    NotifySources,
    CreateJournal,
    SubmitToErp,
}

impl MonthlyNextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonthlyNextAction::Completed => "completed",
            MonthlyNextAction::AddressDoubtful => "address_doubtful",
            MonthlyNextAction::NotifySources => "notify_sources",
            MonthlyNextAction::CreateJournal => "create_journal",
            MonthlyNextAction::SubmitToErp => "submit_to_erp",
        }
    }
}

/// One recipient aggregated over a month's doubtful references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAlertRecipient {
    pub recipient_key: RecipientKey,
    pub recipient_label: String,
    pub reason: String,
    pub count: usize,
    pub merchant_refs: Vec<String>,
}

/// Per-reference detail for a month's doubtful decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDoubtfulDetail {
    pub merchant_ref: String,
    pub state: ExceptionState,
    pub reason_codes: Vec<ReasonCode>,
    pub missing_sources: Vec<SourceKind>,
    pub recipients: Vec<RecipientKey>,
}

/// Derived summary for one run×month bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySubmissionSummary {
    pub run_id: Uuid,
    pub month: String,
    pub total_transactions: usize,
    pub good_transactions: usize,
    pub doubtful_transactions: usize,
    pub addressed_doubtful: usize,
    pub unresolved_doubtful: usize,
    /// `total > 0 && unresolved == 0`.
    pub ready_for_submission: bool,
    pub notified_to_source: bool,
    pub journal_created: bool,
    pub submitted_to_erp: bool,
    pub next_action: MonthlyNextAction,
    pub notified_at: Option<DateTime<Utc>>,
    pub journal_created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub alert_recipients: Vec<MonthlyAlertRecipient>,
    pub doubtful_details: Vec<MonthlyDoubtfulDetail>,
}

// ---------------------------------------------------------------------------
// Daily ops summary (run, derived)
// ---------------------------------------------------------------------------

/// Where one run sits in its daily close lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyCloseState {
    Open,
    ReadyToClose,
    Closed,
}

/// Next operator step for a run's daily close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyNextAction {
    Closed,
    WaitRunCompletion,
    AddressDoubtful,
    SendNotifications,
    CloseDay,
}

impl DailyNextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyNextAction::Closed => "closed",
            DailyNextAction::WaitRunCompletion => "wait_run_completion",
            DailyNextAction::AddressDoubtful => "address_doubtful",
            DailyNextAction::SendNotifications => "send_notifications",
            DailyNextAction::CloseDay => "close_day",
        }
    }
}

/// Run-level rollup of a recipient across all monthly buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNotificationTarget {
    pub recipient_key: RecipientKey,
    pub recipient_label: String,
    pub count: usize,
    pub merchant_refs: Vec<String>,
}

/// Derived daily-close summary for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOpsSummary {
    pub run_id: Uuid,
    pub run_status: RunStatus,
    pub business_date: String,
    pub total_transactions: usize,
    pub good_transactions: usize,
    pub doubtful_transactions: usize,
    pub unresolved_doubtful: usize,
    pub addressed_doubtful: usize,
    /// Months in this run with at least one doubtful transaction.
    pub notifications_required: usize,
    /// Of those, months already notified to their sources.
    pub notifications_sent: usize,
    pub close_state: DailyCloseState,
    pub next_action: DailyNextAction,
    pub closed_at: Option<DateTime<Utc>>,
    pub notification_targets: Vec<DailyNotificationTarget>,
    pub monthly_items: Vec<MonthlySubmissionSummary>,
}

// ---------------------------------------------------------------------------
// Monthly close batch (calendar month across runs, derived)
// ---------------------------------------------------------------------------

/// Next step for a cross-run monthly close batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseNextAction {
    Completed,
    WaitForDailyClose,
    CreateJournal,
    SubmitToErp,
}

impl CloseNextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseNextAction::Completed => "completed",
            CloseNextAction::WaitForDailyClose => "wait_for_daily_close",
            CloseNextAction::CreateJournal => "create_journal",
            CloseNextAction::SubmitToErp => "submit_to_erp",
        }
    }
}

/// Derived consolidated batch for one calendar month, aggregated over every
/// run whose daily close is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCloseBatch {
    pub month: String,
    pub source_run_ids: Vec<Uuid>,
    pub source_run_count: usize,
    pub total_transactions: usize,
    pub good_transactions: usize,
    pub doubtful_transactions: usize,
    pub unresolved_doubtful: usize,
    /// `source_run_count > 0 && unresolved == 0`.
    pub ready_for_erp: bool,
    pub journal_created: bool,
    pub submitted_to_erp: bool,
    pub next_action: CloseNextAction,
    pub journal_created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}
