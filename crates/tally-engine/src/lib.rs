//! tally-engine
//!
//! Three-way matching engine.
//!
//! Architectural decisions:
//! - One synchronous pass per run over three normalized record sets
//! - Per-reference decisions; references are independent of each other
//! - Every failing check becomes a reason code, never an error: a reference
//!   with malformed data goes DOUBTFUL, the run itself cannot abort
//! - One exception case per doubtful decision
//!
//! Deterministic, pure logic. No IO. No clock beyond the input rows.

mod dates;
mod engine;
mod rules;

pub use dates::{date_gap_days, month_from_sources, parse_record_date};
pub use engine::{reconcile, row_digest, ReconcileOutcome};
pub use rules::{normalize_status, FuzzyWeights, MatchRules};
