//! tally-config
//!
//! Environment-driven settings for the reconciliation core. Flat `TALLY_*`
//! variables with documented defaults; no config files, no layering. Parse
//! failures abort with deterministic, copy/paste-friendly messages rather
//! than silently falling back to defaults.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use tally_engine::MatchRules;

/// Effective settings after env resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `state.json` and `audit.jsonl`.
    pub storage_dir: PathBuf,
    /// Minimum pairwise fuzzy score for the fuzzy stage to pass.
    pub fuzzy_threshold: f64,
    /// Maximum allowed day-gap between sources' transaction dates.
    pub backdate_window_days: i64,
    /// Chain audit events with sha256 hashes (tamper evidence).
    pub audit_hash_chain: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".tmp/tally"),
            fuzzy_threshold: 0.9,
            backdate_window_days: 3,
            audit_hash_chain: true,
        }
    }
}

impl Settings {
    /// Resolve settings from process environment variables:
    ///
    /// - `TALLY_STORAGE_DIR` (default `.tmp/tally`)
    /// - `TALLY_FUZZY_THRESHOLD` (default `0.9`)
    /// - `TALLY_BACKDATE_WINDOW_DAYS` (default `3`)
    /// - `TALLY_AUDIT_HASH_CHAIN` (`true`/`false`, default `true`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same resolution against an arbitrary lookup (tests inject a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Settings::default();

        let storage_dir = lookup("TALLY_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        let fuzzy_threshold = match lookup("TALLY_FUZZY_THRESHOLD") {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if (0.0..=1.0).contains(&v) => v,
                Ok(v) => bail!("TALLY_FUZZY_THRESHOLD must be within 0.0..=1.0, got {v}"),
                Err(_) => bail!("TALLY_FUZZY_THRESHOLD must be a number, got {raw:?}"),
            },
            None => defaults.fuzzy_threshold,
        };

        let backdate_window_days = match lookup("TALLY_BACKDATE_WINDOW_DAYS") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) if v >= 0 => v,
                Ok(v) => bail!("TALLY_BACKDATE_WINDOW_DAYS must be >= 0, got {v}"),
                Err(_) => bail!("TALLY_BACKDATE_WINDOW_DAYS must be an integer, got {raw:?}"),
            },
            None => defaults.backdate_window_days,
        };

        let audit_hash_chain = match lookup("TALLY_AUDIT_HASH_CHAIN") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => bail!("TALLY_AUDIT_HASH_CHAIN must be true|false, got {other:?}"),
            },
            None => defaults.audit_hash_chain,
        };

        Ok(Settings {
            storage_dir,
            fuzzy_threshold,
            backdate_window_days,
            audit_hash_chain,
        })
    }

    /// Materialize the engine's matching parameters from these settings.
    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            fuzzy_threshold: self.fuzzy_threshold,
            backdate_window_days: self.backdate_window_days,
            ..MatchRules::default()
        }
    }
}
