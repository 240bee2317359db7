use serde::{Deserialize, Serialize};

/// The three independent reporting sources reconciled against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Internal,
    Erp,
    Psp,
}

impl SourceKind {
    /// All sources, in the canonical internal → erp → psp order.
    pub const ALL: [SourceKind; 3] = [SourceKind::Internal, SourceKind::Erp, SourceKind::Psp];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Internal => "internal",
            SourceKind::Erp => "erp",
            SourceKind::Psp => "psp",
        }
    }
}

/// One normalized transaction row as delivered by the (out-of-scope) record
/// normalizer. All canonical columns present; numeric fields already coerced.
///
/// `transaction_date` / `settlement_date` stay as strings: sources report
/// heterogeneous date formats and the engine parses them tolerantly, turning
/// unparseable values into per-reference data-quality reasons instead of
/// rejecting the whole record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub psp_txn_id: String,
    pub merchant_ref: String,
    pub gross_amount: f64,
    pub currency: String,
    pub processing_fee: f64,
    pub net_payout: f64,
    pub transaction_date: String,
    pub settlement_date: String,
    pub client_id: String,
    pub client_name: String,
    pub description: String,
    pub status: String,
    pub payment_method: String,
    pub settlement_bank: String,
    pub bank_country: String,
    pub fx_rate: Option<f64>,
}

/// One value per source. Used in traces where each source contributes its
/// own observation (row digests, fx rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerSource<T> {
    pub internal: T,
    pub erp: T,
    pub psp: T,
}

/// One value per source pair. The engine compares the three rows pairwise;
/// fuzzy scores and date gaps are reported per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairWise<T> {
    pub internal_vs_erp: T,
    pub internal_vs_psp: T,
    pub erp_vs_psp: T,
}

impl<T: Copy + PartialOrd> PairWise<T> {
    /// Smallest of the three pairwise values.
    pub fn min(&self) -> T {
        let mut m = self.internal_vs_erp;
        if self.internal_vs_psp < m {
            m = self.internal_vs_psp;
        }
        if self.erp_vs_psp < m {
            m = self.erp_vs_psp;
        }
        m
    }

    /// Largest of the three pairwise values.
    pub fn max(&self) -> T {
        let mut m = self.internal_vs_erp;
        if self.internal_vs_psp > m {
            m = self.internal_vs_psp;
        }
        if self.erp_vs_psp > m {
            m = self.erp_vs_psp;
        }
        m
    }
}
