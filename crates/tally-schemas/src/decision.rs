use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PairWise, PerSource};

/// Final verdict of the matching engine for one reference.
///
/// Wire values ("good_transaction" / "doubtful_transaction") are stable:
/// downstream consumers filter on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    GoodTransaction,
    DoubtfulTransaction,
}

impl FinalStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, FinalStatus::GoodTransaction)
    }
}

/// Fixed reason tokens attached to a decision, one per failing check.
///
/// Serialized as the stable SCREAMING_SNAKE_CASE tokens. The engine emits
/// the five stage tokens in declaration order; data-quality
/// (`MalformedSourceData`) sorts after them so consumers of the fixed stage
/// prefix are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MissingInOneOrMoreSources,
    ExactHashMismatch,
    FuzzyThresholdNotMet,
    ThreeWayValidationFailed,
    BackdatedWindowExceeded,
    FxDataInsufficient,
    MalformedSourceData,
    ManualReviewRequired,
}

/// Pass/fail outcome of each matching stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub exact_hash: bool,
    pub fuzzy: bool,
    pub three_way: bool,
    pub backdated: bool,
    pub fx_handled: bool,
}

/// Which of the three sources reported a row for this reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesPresent {
    pub internal: bool,
    pub erp: bool,
    pub psp: bool,
}

impl SourcesPresent {
    pub fn all_present(&self) -> bool {
        self.internal && self.erp && self.psp
    }

    /// Sources with no row, in canonical order.
    pub fn missing(&self) -> Vec<crate::SourceKind> {
        let mut out = Vec::new();
        if !self.internal {
            out.push(crate::SourceKind::Internal);
        }
        if !self.erp {
            out.push(crate::SourceKind::Erp);
        }
        if !self.psp {
            out.push(crate::SourceKind::Psp);
        }
        out
    }
}

/// Exact-digest sub-check evidence. `hashes` carries 12-hex-char digest
/// prefixes per source; `None` when the check was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactHashTrace {
    pub matched: bool,
    pub skipped: bool,
    pub hashes: Option<PerSource<String>>,
}

/// Fuzzy sub-check evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyTrace {
    /// Minimum of the three pairwise scores; 1.0 when exact-hash matched.
    pub score: Option<f64>,
    pub threshold: f64,
    pub skipped: bool,
    pub pair_scores: Option<PairWise<f64>>,
}

/// Three-way equality sub-check evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeWayTrace {
    pub presence_check: bool,
    pub amount_check: bool,
    pub identity_check: bool,
}

/// Backdate-window sub-check evidence. Gaps are in whole days, time-of-day
/// ignored; `None` when skipped or when a transaction date failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackdateTrace {
    pub window_days: i64,
    pub max_gap_days: Option<i64>,
    pub pair_gaps_days: Option<PairWise<i64>>,
}

/// FX sub-check evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxTrace {
    pub handled: bool,
    pub detail: String,
    /// Currencies as reported, internal/erp/psp order. Empty when skipped.
    pub currencies: Vec<String>,
    pub rates: PerSource<Option<f64>>,
}

/// Full audit trace for one decision: every sub-check's raw inputs and
/// outcome, so an analyst can replay why the engine decided what it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTrace {
    pub sources_present: SourcesPresent,
    pub exact_hash: ExactHashTrace,
    pub fuzzy: FuzzyTrace,
    pub three_way: ThreeWayTrace,
    pub backdated: BackdateTrace,
    pub fx: FxTrace,
}

/// One immutable matching decision. Created once per reference per run by
/// the engine; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub run_id: Uuid,
    pub merchant_ref: String,
    pub final_status: FinalStatus,
    pub reason_codes: Vec<ReasonCode>,
    pub stage_results: StageResult,
    /// `YYYY-MM` derived from the first parseable source date, or "unknown".
    pub transaction_month: String,
    pub fuzzy_score: Option<f64>,
    pub backdated_gap_days: Option<i64>,
    pub fx_detail: String,
    pub trace: MatchTrace,
}

#[cfg(test)]
mod tests {
    use super::*;

    // Downstream consumers filter on these literals; they must never drift.
    #[test]
    fn reason_codes_serialize_to_fixed_tokens() {
        let tokens = [
            (ReasonCode::MissingInOneOrMoreSources, "MISSING_IN_ONE_OR_MORE_SOURCES"),
            (ReasonCode::ExactHashMismatch, "EXACT_HASH_MISMATCH"),
            (ReasonCode::FuzzyThresholdNotMet, "FUZZY_THRESHOLD_NOT_MET"),
            (ReasonCode::ThreeWayValidationFailed, "THREE_WAY_VALIDATION_FAILED"),
            (ReasonCode::BackdatedWindowExceeded, "BACKDATED_WINDOW_EXCEEDED"),
            (ReasonCode::FxDataInsufficient, "FX_DATA_INSUFFICIENT"),
            (ReasonCode::MalformedSourceData, "MALFORMED_SOURCE_DATA"),
            (ReasonCode::ManualReviewRequired, "MANUAL_REVIEW_REQUIRED"),
        ];
        for (code, expected) in tokens {
            assert_eq!(
                serde_json::to_string(&code).unwrap(),
                format!("\"{expected}\"")
            );
        }
    }

    #[test]
    fn final_status_wire_values_are_stable() {
        assert_eq!(
            serde_json::to_string(&FinalStatus::GoodTransaction).unwrap(),
            "\"good_transaction\""
        );
        assert_eq!(
            serde_json::to_string(&FinalStatus::DoubtfulTransaction).unwrap(),
            "\"doubtful_transaction\""
        );
    }
}
