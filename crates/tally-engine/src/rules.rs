use serde::{Deserialize, Serialize};

/// Weight of each field group in the pairwise fuzzy score. Weights sum to
/// 1.0 so a fully-matching pair scores exactly 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyWeights {
    pub merchant_ref: f64,
    /// The gross/fee/net triplet matches as a unit.
    pub amounts: f64,
    pub status: f64,
    pub client_id: f64,
    pub payment_method: f64,
}

impl Default for FuzzyWeights {
    fn default() -> Self {
        Self {
            merchant_ref: 0.5,
            amounts: 0.2,
            status: 0.1,
            client_id: 0.1,
            payment_method: 0.1,
        }
    }
}

/// Tunable matching parameters. Defaults are the production values; the
/// config layer may override threshold and window per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchRules {
    pub fuzzy_weights: FuzzyWeights,
    /// Every pairwise fuzzy score must meet this for the fuzzy stage to pass.
    pub fuzzy_threshold: f64,
    /// Maximum allowed day-gap between any two sources' transaction dates.
    pub backdate_window_days: i64,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            fuzzy_weights: FuzzyWeights::default(),
            fuzzy_threshold: 0.9,
            backdate_window_days: 3,
        }
    }
}

/// Map source-specific settlement vocabulary onto one comparable token.
/// Unrecognized statuses compare by their uppercased literal.
pub fn normalize_status(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "captured" | "confirmed" | "settled" => "SUCCESS".to_string(),
        _ => raw.trim().to_ascii_uppercase(),
    }
}
