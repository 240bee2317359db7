use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ReasonCode;

/// Analyst-facing severity of an exception case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Review state of one exception case.
///
/// Closed state machine: `Open → {Verified, Approved, Resolved}`, addressed
/// states are terminal. Re-asserting the current state is a no-op; every
/// other transition (and any unknown state string) is rejected upstream as a
/// validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionState {
    Open,
    Verified,
    Approved,
    Resolved,
}

impl ExceptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionState::Open => "open",
            ExceptionState::Verified => "verified",
            ExceptionState::Approved => "approved",
            ExceptionState::Resolved => "resolved",
        }
    }

    /// An addressed case no longer counts toward unresolved-doubtful totals.
    pub fn is_addressed(&self) -> bool {
        !matches!(self, ExceptionState::Open)
    }

    /// `true` when moving from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: ExceptionState) -> bool {
        match self {
            ExceptionState::Open => true,
            // Addressed states are terminal; only a same-state no-op passes.
            _ => *self == next,
        }
    }
}

impl fmt::Display for ExceptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExceptionState {
    type Err = UnknownExceptionState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(ExceptionState::Open),
            "verified" => Ok(ExceptionState::Verified),
            "approved" => Ok(ExceptionState::Approved),
            "resolved" => Ok(ExceptionState::Resolved),
            _ => Err(UnknownExceptionState(s.to_string())),
        }
    }
}

/// A caller supplied a state outside the enumerated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExceptionState(pub String);

impl fmt::Display for UnknownExceptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown exception state {:?} (expected open|verified|approved|resolved)",
            self.0
        )
    }
}

impl std::error::Error for UnknownExceptionState {}

/// One exception case, created 1:1 with a doubtful decision and worked by
/// analysts until addressed. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionCase {
    pub id: Uuid,
    pub run_id: Uuid,
    pub merchant_ref: String,
    pub severity: Severity,
    pub reason_codes: Vec<ReasonCode>,
    pub state: ExceptionState,
}
