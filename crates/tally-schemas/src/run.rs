use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of one reconciliation run.
///
/// File ingestion and job dispatch live outside the core, so their statuses
/// (queued, format_failed) do not appear here. Daily close gates on
/// [`RunStatus::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Draft => "draft",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Headline counters stamped onto the run when its results are ingested.
/// Display-only; every workflow decision recomputes from the decisions and
/// exceptions themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub total: usize,
    pub good: usize,
    pub doubtful: usize,
    pub exceptions: usize,
}

/// One reconciliation run: a single engine pass over three record sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub id: Uuid,
    pub status: RunStatus,
    /// Free-form progress marker ("created", "reconciling", "daily_closed", ...).
    pub stage: String,
    pub initiated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub counters: RunCounters,
}
