//! tally-workflow
//!
//! Derived workflow state machines over the matching engine's output.
//!
//! # Design
//!
//! Three nested scopes share one discipline:
//!
//! - **run × month**: monthly submission buckets,
//! - **run**: daily operational close,
//! - **calendar month across runs**: consolidated monthly close.
//!
//! Every summary is a pure projection recomputed from the stored decisions,
//! exceptions and a small per-scope flag record on every read; no derived
//! totals are ever persisted, so what the caller sees cannot drift from the
//! underlying facts.
//!
//! Every mutation is a read-modify-write transaction behind one service
//! mutex: load state → recompute aggregates → check guards → mutate the flag
//! record → append an audit event → persist atomically. Guard failures are
//! [`WorkflowError::Validation`]; unknown keys are [`WorkflowError::NotFound`].

mod close;
mod daily;
mod error;
mod monthly;
mod service;

pub use close::build_monthly_close_batches;
pub use daily::build_daily_summary;
pub use error::{WorkflowError, WorkflowResult};
pub use monthly::build_monthly_summaries;
pub use service::WorkflowService;
