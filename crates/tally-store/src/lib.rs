//! tally-store
//!
//! File-backed document store for the reconciliation core.
//!
//! One JSON document holds every persisted scope, keyed the way the
//! workflow addresses it:
//!
//! - `runs` by run id,
//! - `decisions` / `exceptions` by run id (engine facts),
//! - `monthly_submissions` by run id × month (small state records),
//! - `daily_ops` by run id,
//! - `monthly_close` by calendar month.
//!
//! Loads once on open; every mutation is persisted by writing a sibling
//! temp file and renaming it over the document, so readers never observe a
//! half-written state. Derived summaries are never stored here, only the
//! facts and the small per-scope flag records.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use tally_schemas::{
    DailyOpsState, ExceptionCase, MatchDecision, MonthlyCloseState, MonthlySubmissionState,
    ReconciliationRun,
};

/// The full persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDoc {
    #[serde(default)]
    pub runs: BTreeMap<Uuid, ReconciliationRun>,
    #[serde(default)]
    pub decisions: BTreeMap<Uuid, Vec<MatchDecision>>,
    #[serde(default)]
    pub exceptions: BTreeMap<Uuid, Vec<ExceptionCase>>,
    #[serde(default)]
    pub monthly_submissions: BTreeMap<Uuid, BTreeMap<String, MonthlySubmissionState>>,
    #[serde(default)]
    pub daily_ops: BTreeMap<Uuid, DailyOpsState>,
    #[serde(default)]
    pub monthly_close: BTreeMap<String, MonthlyCloseState>,
}

impl StoreDoc {
    /// State record for a run×month bucket, created all-false on first touch.
    pub fn ensure_month_state(
        &mut self,
        run_id: Uuid,
        month: &str,
    ) -> &mut MonthlySubmissionState {
        self.monthly_submissions
            .entry(run_id)
            .or_default()
            .entry(month.to_string())
            .or_default()
    }

    /// Daily-close record for a run, created empty on first touch.
    pub fn ensure_daily_state(&mut self, run_id: Uuid) -> &mut DailyOpsState {
        self.daily_ops.entry(run_id).or_default()
    }

    /// Cross-run close record for a calendar month, created on first touch.
    pub fn ensure_monthly_close_state(&mut self, month: &str) -> &mut MonthlyCloseState {
        self.monthly_close.entry(month.to_string()).or_default()
    }

    pub fn decisions_for(&self, run_id: Uuid) -> &[MatchDecision] {
        self.decisions.get(&run_id).map_or(&[], Vec::as_slice)
    }

    pub fn exceptions_for(&self, run_id: Uuid) -> &[ExceptionCase] {
        self.exceptions.get(&run_id).map_or(&[], Vec::as_slice)
    }
}

/// Handle on the persisted document.
pub struct StateStore {
    path: PathBuf,
    doc: StoreDoc,
}

impl StateStore {
    /// Open (or create) the document at `path`. A missing file starts as an
    /// empty document and is written immediately so the directory is valid
    /// from the first call.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read state document {:?}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse state document {:?}", path))?
        } else {
            StoreDoc::default()
        };

        let store = Self { path, doc };
        if !store.path.exists() {
            store.persist()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &StoreDoc {
        &self.doc
    }

    /// Mutable access for read-modify-write transactions. The caller owns
    /// the guard discipline (see tally-workflow) and must call
    /// [`StateStore::persist`] once the mutation is complete.
    pub fn state_mut(&mut self) -> &mut StoreDoc {
        &mut self.doc
    }

    /// Atomically replace the on-disk document: write a sibling temp file,
    /// then rename it over the target.
    pub fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.doc).context("serialize state document")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("write temp state {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {:?} -> {:?}", tmp, self.path))?;
        Ok(())
    }
}
