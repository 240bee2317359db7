//! Workflow service: guarded, audited mutations over the persisted state.
//!
//! One mutex serializes every read-modify-write so concurrent mutations to
//! the same scope key can never lose an update. Reads recompute their
//! summaries from the stored facts under the same lock, so a guard check
//! always sees the aggregates it is about to gate.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use tally_audit::{AuditEvent, AuditLedger};
use tally_engine::{reconcile, MatchRules};
use tally_schemas::{
    DailyCloseState, DailyOpsSummary, ExceptionCase, ExceptionState, MatchDecision,
    MonthlyCloseBatch, MonthlySubmissionSummary, ReconciliationRun, RunCounters, RunStatus,
    SourceRecord,
};
use tally_store::{StateStore, StoreDoc};

use crate::close::build_monthly_close_batches;
use crate::daily::build_daily_summary;
use crate::error::{WorkflowError, WorkflowResult};
use crate::monthly::{build_monthly_summaries, monthly_index};

/// The reconciliation core's service surface. See the crate docs for the
/// locking and recompute-on-read discipline.
pub struct WorkflowService {
    inner: Mutex<Inner>,
}

struct Inner {
    store: StateStore,
    ledger: AuditLedger,
}

fn to_json<T: serde::Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// Monthly items for one run, recomputed from stored facts.
fn monthly_items(doc: &StoreDoc, run_id: Uuid) -> Vec<MonthlySubmissionSummary> {
    build_monthly_summaries(
        run_id,
        doc.decisions_for(run_id),
        doc.exceptions_for(run_id),
        doc.monthly_submissions.get(&run_id),
    )
}

/// Daily rollup for one run, recomputed from stored facts.
fn daily_summary(doc: &StoreDoc, run_id: Uuid) -> WorkflowResult<DailyOpsSummary> {
    let run = doc
        .runs
        .get(&run_id)
        .ok_or_else(|| WorkflowError::not_found("run", run_id))?;
    Ok(build_daily_summary(
        run,
        monthly_items(doc, run_id),
        doc.daily_ops.get(&run_id),
    ))
}

/// Cross-run close batches, recomputed from every run's daily rollup.
fn close_batches(doc: &StoreDoc) -> Vec<MonthlyCloseBatch> {
    let daily: Vec<DailyOpsSummary> = doc
        .runs
        .values()
        .map(|run| {
            build_daily_summary(
                run,
                monthly_items(doc, run.id),
                doc.daily_ops.get(&run.id),
            )
        })
        .collect();
    build_monthly_close_batches(&daily, &doc.monthly_close)
}

impl Inner {
    fn run(&self, run_id: Uuid) -> WorkflowResult<ReconciliationRun> {
        self.store
            .state()
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("run", run_id))
    }

    fn require_run(&self, run_id: Uuid) -> WorkflowResult<()> {
        self.run(run_id).map(|_| ())
    }

    fn audit(
        &mut self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        before: Value,
        after: Value,
    ) -> WorkflowResult<()> {
        self.ledger
            .append(actor, action, entity_type, entity_id, before, after)?;
        Ok(())
    }

    /// Move every non-addressed exception of `month`'s references to
    /// verified. Idempotent: already-addressed cases are untouched, so a
    /// second call changes nothing. Audits, does NOT persist; the public
    /// operation persists once.
    fn address_month(&mut self, run_id: Uuid, month: &str, actor: &str) -> WorkflowResult<usize> {
        let doc = self.store.state_mut();

        let (known, target_refs) = {
            let (stats, refs_by_month) =
                monthly_index(doc.decisions_for(run_id), doc.exceptions_for(run_id));
            let known = stats.contains_key(month)
                || doc
                    .monthly_submissions
                    .get(&run_id)
                    .is_some_and(|m| m.contains_key(month));
            let target_refs: Vec<String> = refs_by_month
                .get(month)
                .map(|refs| refs.iter().map(|r| r.to_string()).collect())
                .unwrap_or_default();
            (known, target_refs)
        };
        if !known {
            return Err(WorkflowError::not_found("month", month));
        }

        let mut updated = 0usize;
        if let Some(items) = doc.exceptions.get_mut(&run_id) {
            for item in items.iter_mut() {
                if target_refs.iter().any(|r| r == &item.merchant_ref)
                    && !item.state.is_addressed()
                {
                    item.state = ExceptionState::Verified;
                    updated += 1;
                }
            }
        }
        doc.ensure_month_state(run_id, month).doubtful_addressed_at = Some(Utc::now());

        self.audit(
            actor,
            "monthly_address_doubtful",
            "monthly_submission",
            &format!("{run_id}:{month}"),
            Value::Null,
            json!({ "month": month, "updated_exceptions": updated }),
        )?;
        Ok(updated)
    }

    /// Flip the notified flag for one month. The caller has already checked
    /// the doubtful>0 guard. Audits, does NOT persist.
    fn notify_month(&mut self, run_id: Uuid, month: &str, actor: &str) -> WorkflowResult<()> {
        let state = self.store.state_mut().ensure_month_state(run_id, month);
        let before = to_json(&state.clone());
        state.notified_to_source = true;
        state.notified_at = Some(Utc::now());
        let after = to_json(&state.clone());

        self.audit(
            actor,
            "monthly_notify_sources",
            "monthly_submission",
            &format!("{run_id}:{month}"),
            before,
            after,
        )
    }
}

impl WorkflowService {
    /// Open (or create) the workflow state under `dir`: `state.json` for
    /// the document, `audit.jsonl` for the ledger.
    pub fn open(dir: impl AsRef<Path>, audit_hash_chain: bool) -> WorkflowResult<Self> {
        let dir = dir.as_ref();
        let store = StateStore::open(dir.join("state.json"))?;
        let ledger = AuditLedger::new(dir.join("audit.jsonl"), audit_hash_chain)?;
        Ok(Self {
            inner: Mutex::new(Inner { store, ledger }),
        })
    }

    fn lock(&self) -> WorkflowResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| WorkflowError::Storage(anyhow!("workflow service mutex poisoned")))
    }

    // -----------------------------------------------------------------------
    // Run lifecycle
    // -----------------------------------------------------------------------

    /// Create a draft run.
    pub fn create_run(&self, initiated_by: &str) -> WorkflowResult<ReconciliationRun> {
        let mut g = self.lock()?;
        let now = Utc::now();
        let run = ReconciliationRun {
            id: Uuid::new_v4(),
            status: RunStatus::Draft,
            stage: "created".to_string(),
            initiated_by: initiated_by.to_string(),
            created_at: now,
            updated_at: now,
            counters: RunCounters::default(),
        };
        g.store.state_mut().runs.insert(run.id, run.clone());
        g.audit(
            initiated_by,
            "create_run",
            "reconciliation_run",
            &run.id.to_string(),
            Value::Null,
            to_json(&run),
        )?;
        g.store.persist()?;
        info!(run_id = %run.id, "reconciliation run created");
        Ok(run)
    }

    pub fn get_run(&self, run_id: Uuid) -> WorkflowResult<ReconciliationRun> {
        self.lock()?.run(run_id)
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> WorkflowResult<Vec<ReconciliationRun>> {
        let g = self.lock()?;
        let mut runs: Vec<ReconciliationRun> = g.store.state().runs.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    /// Execute the matching engine for a run and ingest its output.
    ///
    /// The pass itself is pure; this wraps it with run bookkeeping: status
    /// running → engine → store decisions/exceptions → ensure month states
    /// → stamp counters → status completed.
    pub fn run_reconciliation(
        &self,
        run_id: Uuid,
        internal: &[SourceRecord],
        erp: &[SourceRecord],
        psp: &[SourceRecord],
        rules: &MatchRules,
    ) -> WorkflowResult<ReconciliationRun> {
        let mut g = self.lock()?;
        let mut run = g.run(run_id)?;
        run.status = RunStatus::Running;
        run.stage = "reconciling".to_string();
        run.updated_at = Utc::now();
        g.store.state_mut().runs.insert(run_id, run);

        let outcome = reconcile(run_id, internal, erp, psp, rules);
        let run = ingest(&mut g, run_id, outcome.decisions, outcome.exceptions, "engine")?;
        g.store.persist()?;
        info!(
            run_id = %run_id,
            total = run.counters.total,
            doubtful = run.counters.doubtful,
            "reconciliation pass complete"
        );
        Ok(run)
    }

    /// Store externally produced engine output for a run. Same bookkeeping
    /// as [`WorkflowService::run_reconciliation`] without executing the
    /// engine. Used when the pass ran elsewhere and by scenario fixtures.
    pub fn ingest_run_results(
        &self,
        run_id: Uuid,
        decisions: Vec<MatchDecision>,
        exceptions: Vec<ExceptionCase>,
        actor: &str,
    ) -> WorkflowResult<ReconciliationRun> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let run = ingest(&mut g, run_id, decisions, exceptions, actor)?;
        g.store.persist()?;
        Ok(run)
    }

    /// Record a failed run with the stage that broke.
    pub fn fail_run(
        &self,
        run_id: Uuid,
        stage: &str,
        actor: &str,
    ) -> WorkflowResult<ReconciliationRun> {
        let mut g = self.lock()?;
        let mut run = g.run(run_id)?;
        let before = to_json(&run);
        run.status = RunStatus::Failed;
        run.stage = stage.to_string();
        run.updated_at = Utc::now();
        g.store.state_mut().runs.insert(run_id, run.clone());
        g.audit(
            actor,
            "fail_run",
            "reconciliation_run",
            &run_id.to_string(),
            before,
            to_json(&run),
        )?;
        g.store.persist()?;
        Ok(run)
    }

    pub fn get_decisions(&self, run_id: Uuid) -> WorkflowResult<Vec<MatchDecision>> {
        let g = self.lock()?;
        g.require_run(run_id)?;
        Ok(g.store.state().decisions_for(run_id).to_vec())
    }

    pub fn get_exceptions(&self, run_id: Uuid) -> WorkflowResult<Vec<ExceptionCase>> {
        let g = self.lock()?;
        g.require_run(run_id)?;
        Ok(g.store.state().exceptions_for(run_id).to_vec())
    }

    // -----------------------------------------------------------------------
    // Exception tracker
    // -----------------------------------------------------------------------

    /// Move one exception case to a new review state.
    ///
    /// Legal transitions: open → {verified, approved, resolved}; addressed
    /// states are terminal. Re-asserting the current state is an idempotent
    /// no-op.
    pub fn update_exception_state(
        &self,
        exception_id: Uuid,
        next: ExceptionState,
        actor: &str,
    ) -> WorkflowResult<ExceptionCase> {
        let mut g = self.lock()?;

        let located = g.store.state().exceptions.iter().find_map(|(run_id, items)| {
            items
                .iter()
                .position(|e| e.id == exception_id)
                .map(|idx| (*run_id, idx))
        });
        let (run_id, idx) =
            located.ok_or_else(|| WorkflowError::not_found("exception", exception_id))?;

        let case = g
            .store
            .state_mut()
            .exceptions
            .get_mut(&run_id)
            .and_then(|items| items.get_mut(idx))
            .ok_or_else(|| WorkflowError::not_found("exception", exception_id))?;
        let before = case.clone();
        if before.state == next {
            return Ok(before);
        }
        if !before.state.can_transition_to(next) {
            return Err(WorkflowError::validation(format!(
                "illegal exception transition: {} -> {}",
                before.state, next
            )));
        }
        case.state = next;
        let after = case.clone();
        g.audit(
            actor,
            "exception_state",
            "exception",
            &exception_id.to_string(),
            to_json(&before),
            to_json(&after),
        )?;
        g.store.persist()?;
        info!(exception_id = %exception_id, from = %before.state, to = %next, "exception state updated");
        Ok(after)
    }

    // -----------------------------------------------------------------------
    // Monthly submissions (run × month)
    // -----------------------------------------------------------------------

    pub fn list_monthly_submissions(
        &self,
        run_id: Uuid,
    ) -> WorkflowResult<Vec<MonthlySubmissionSummary>> {
        let g = self.lock()?;
        g.require_run(run_id)?;
        Ok(monthly_items(g.store.state(), run_id))
    }

    pub fn get_monthly_submission(
        &self,
        run_id: Uuid,
        month: &str,
    ) -> WorkflowResult<MonthlySubmissionSummary> {
        let g = self.lock()?;
        g.require_run(run_id)?;
        find_month(g.store.state(), run_id, month)
    }

    /// Bulk-address every open exception in a month (→ verified).
    pub fn address_monthly_doubtful(
        &self,
        run_id: Uuid,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlySubmissionSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let updated = g.address_month(run_id, month, actor)?;
        g.store.persist()?;
        info!(run_id = %run_id, month, updated, "monthly doubtful addressed");
        find_month(g.store.state(), run_id, month)
    }

    /// Mark a month as notified to its sources. Requires at least one
    /// doubtful transaction: there is nobody to notify otherwise.
    pub fn mark_monthly_notified(
        &self,
        run_id: Uuid,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlySubmissionSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let summary = find_month(g.store.state(), run_id, month)?;
        if summary.doubtful_transactions == 0 {
            return Err(WorkflowError::validation(
                "no doubtful transactions to notify",
            ));
        }
        g.notify_month(run_id, month, actor)?;
        g.store.persist()?;
        info!(run_id = %run_id, month, "monthly sources notified");
        find_month(g.store.state(), run_id, month)
    }

    /// Create the accounting journal for a ready month.
    pub fn create_monthly_journal(
        &self,
        run_id: Uuid,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlySubmissionSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let summary = find_month(g.store.state(), run_id, month)?;
        if !summary.ready_for_submission {
            return Err(WorkflowError::validation(
                "monthly submission is not ready; resolve doubtful transactions first",
            ));
        }
        if summary.good_transactions == 0 {
            return Err(WorkflowError::validation(
                "no good transactions available to create journal",
            ));
        }

        let state = g.store.state_mut().ensure_month_state(run_id, month);
        let before = to_json(&state.clone());
        state.journal_created = true;
        state.journal_created_at = Some(Utc::now());
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "monthly_create_journal",
            "monthly_submission",
            &format!("{run_id}:{month}"),
            before,
            after,
        )?;
        g.store.persist()?;
        info!(run_id = %run_id, month, "monthly journal created");
        find_month(g.store.state(), run_id, month)
    }

    /// Submit a ready month to the ERP. A month with good transactions must
    /// have its journal first; a zero-good month submits without one.
    pub fn submit_monthly_to_erp(
        &self,
        run_id: Uuid,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlySubmissionSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let summary = find_month(g.store.state(), run_id, month)?;
        if !summary.ready_for_submission {
            return Err(WorkflowError::validation(
                "monthly submission is not ready; resolve doubtful transactions first",
            ));
        }
        if summary.submitted_to_erp {
            return Err(WorkflowError::validation("month already submitted to ERP"));
        }
        if summary.good_transactions > 0 && !summary.journal_created {
            return Err(WorkflowError::validation(
                "create journal before submitting to ERP",
            ));
        }

        let state = g.store.state_mut().ensure_month_state(run_id, month);
        let before = to_json(&state.clone());
        state.submitted_to_erp = true;
        state.submitted_at = Some(Utc::now());
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "monthly_submit_erp",
            "monthly_submission",
            &format!("{run_id}:{month}"),
            before,
            after,
        )?;
        g.store.persist()?;
        info!(run_id = %run_id, month, "monthly submission sent to ERP");
        find_month(g.store.state(), run_id, month)
    }

    // -----------------------------------------------------------------------
    // Daily ops (run)
    // -----------------------------------------------------------------------

    /// Daily rollups for every run, newest first.
    pub fn list_daily_ops(&self) -> WorkflowResult<Vec<DailyOpsSummary>> {
        let g = self.lock()?;
        let doc = g.store.state();
        let mut runs: Vec<&ReconciliationRun> = doc.runs.values().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.iter().map(|run| daily_summary(doc, run.id)).collect()
    }

    pub fn get_daily_ops(&self, run_id: Uuid) -> WorkflowResult<DailyOpsSummary> {
        let g = self.lock()?;
        daily_summary(g.store.state(), run_id)
    }

    /// Override the run's business date (ISO `YYYY-MM-DD`).
    pub fn set_daily_business_date(
        &self,
        run_id: Uuid,
        business_date: &str,
        actor: &str,
    ) -> WorkflowResult<DailyOpsSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        if NaiveDate::parse_from_str(business_date, "%Y-%m-%d").is_err() {
            return Err(WorkflowError::validation(
                "business_date must be YYYY-MM-DD",
            ));
        }

        let state = g.store.state_mut().ensure_daily_state(run_id);
        let before = to_json(&state.clone());
        state.business_date = Some(business_date.to_string());
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "daily_set_business_date",
            "daily_ops",
            &run_id.to_string(),
            before,
            after,
        )?;
        g.store.persist()?;
        daily_summary(g.store.state(), run_id)
    }

    /// Address doubtful exceptions across every month of the run that still
    /// has unresolved ones. No-op when none remain.
    pub fn address_daily_doubtful(
        &self,
        run_id: Uuid,
        actor: &str,
    ) -> WorkflowResult<DailyOpsSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;
        let target_months: Vec<String> = monthly_items(g.store.state(), run_id)
            .into_iter()
            .filter(|m| m.unresolved_doubtful > 0)
            .map(|m| m.month)
            .collect();
        if !target_months.is_empty() {
            for month in &target_months {
                g.address_month(run_id, month, actor)?;
            }
            g.store.persist()?;
            info!(run_id = %run_id, months = target_months.len(), "daily doubtful addressed");
        }
        daily_summary(g.store.state(), run_id)
    }

    /// Notify every un-notified doubtful month of the run.
    ///
    /// Fails fast, before any month is flagged, if a target month still
    /// has unresolved doubtful transactions, so a rejected batch leaves no
    /// partial side effects.
    pub fn notify_daily_ops(&self, run_id: Uuid, actor: &str) -> WorkflowResult<DailyOpsSummary> {
        let mut g = self.lock()?;
        g.require_run(run_id)?;

        let mut target_months = Vec::new();
        for item in monthly_items(g.store.state(), run_id) {
            if item.doubtful_transactions == 0 || item.notified_to_source {
                continue;
            }
            if item.unresolved_doubtful > 0 {
                return Err(WorkflowError::validation(format!(
                    "month {} still has unresolved doubtful transactions",
                    item.month
                )));
            }
            target_months.push(item.month);
        }

        if !target_months.is_empty() {
            for month in &target_months {
                g.notify_month(run_id, month, actor)?;
            }
            g.store.persist()?;
            info!(run_id = %run_id, months = target_months.len(), "daily notification batch sent");
        }
        daily_summary(g.store.state(), run_id)
    }

    /// Close the day for a run. Requires the rollup to be ready: run
    /// completed, zero unresolved doubtful, all required notifications sent.
    pub fn close_daily_ops(&self, run_id: Uuid, actor: &str) -> WorkflowResult<DailyOpsSummary> {
        let mut g = self.lock()?;
        let summary = daily_summary(g.store.state(), run_id)?;
        if summary.close_state != DailyCloseState::ReadyToClose {
            return Err(WorkflowError::validation(format!(
                "run not ready to close: {}",
                summary.next_action.as_str()
            )));
        }

        let state = g.store.state_mut().ensure_daily_state(run_id);
        let before = to_json(&state.clone());
        state.closed_at = Some(Utc::now());
        let after = to_json(&state.clone());
        g.audit(actor, "daily_close", "daily_ops", &run_id.to_string(), before, after)?;

        // The run record mirrors the close for list views.
        if let Some(run) = g.store.state_mut().runs.get_mut(&run_id) {
            run.stage = "daily_closed".to_string();
            run.updated_at = Utc::now();
        }
        g.store.persist()?;
        info!(run_id = %run_id, "daily run closed");
        daily_summary(g.store.state(), run_id)
    }

    // -----------------------------------------------------------------------
    // Monthly close (calendar month across runs)
    // -----------------------------------------------------------------------

    pub fn list_monthly_close_batches(&self) -> WorkflowResult<Vec<MonthlyCloseBatch>> {
        let g = self.lock()?;
        Ok(close_batches(g.store.state()))
    }

    pub fn get_monthly_close_batch(&self, month: &str) -> WorkflowResult<MonthlyCloseBatch> {
        let g = self.lock()?;
        find_close_batch(g.store.state(), month)
    }

    /// Create the consolidated journal for a ready close batch.
    pub fn create_monthly_close_journal(
        &self,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlyCloseBatch> {
        let mut g = self.lock()?;
        let batch = find_close_batch(g.store.state(), month)?;
        if !batch.ready_for_erp {
            return Err(WorkflowError::validation(
                "monthly close is not ready; close all daily runs and clear doubtfuls first",
            ));
        }
        if batch.good_transactions == 0 {
            return Err(WorkflowError::validation(
                "no good transactions available to create journal",
            ));
        }

        let state = g.store.state_mut().ensure_monthly_close_state(month);
        let before = to_json(&state.clone());
        state.journal_created = true;
        state.journal_created_at = Some(Utc::now());
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "monthly_close_create_journal",
            "monthly_close",
            month,
            before,
            after,
        )?;
        g.store.persist()?;
        info!(month, "monthly close journal created");
        find_close_batch(g.store.state(), month)
    }

    /// Submit a ready close batch to the ERP. Journal first whenever the
    /// batch has good transactions.
    pub fn submit_monthly_close_to_erp(
        &self,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlyCloseBatch> {
        let mut g = self.lock()?;
        let batch = find_close_batch(g.store.state(), month)?;
        if !batch.ready_for_erp {
            return Err(WorkflowError::validation(
                "monthly close is not ready; close all daily runs and clear doubtfuls first",
            ));
        }
        if batch.submitted_to_erp {
            return Err(WorkflowError::validation(
                "monthly close already submitted to ERP",
            ));
        }
        if batch.good_transactions > 0 && !batch.journal_created {
            return Err(WorkflowError::validation(
                "create monthly journal before submitting to ERP",
            ));
        }

        let state = g.store.state_mut().ensure_monthly_close_state(month);
        let before = to_json(&state.clone());
        state.submitted_to_erp = true;
        state.submitted_at = Some(Utc::now());
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "monthly_close_submit_erp",
            "monthly_close",
            month,
            before,
            after,
        )?;
        g.store.persist()?;
        info!(month, "monthly close submitted to ERP");
        find_close_batch(g.store.state(), month)
    }

    /// Revert a submitted close batch back to the journal stage: clears
    /// both flags and their timestamps.
    pub fn revert_monthly_close_submission(
        &self,
        month: &str,
        actor: &str,
    ) -> WorkflowResult<MonthlyCloseBatch> {
        let mut g = self.lock()?;
        let batch = find_close_batch(g.store.state(), month)?;
        if !batch.submitted_to_erp {
            return Err(WorkflowError::validation(
                "monthly close has not been submitted; nothing to revert",
            ));
        }

        let state = g.store.state_mut().ensure_monthly_close_state(month);
        let before = to_json(&state.clone());
        state.submitted_to_erp = false;
        state.submitted_at = None;
        state.journal_created = false;
        state.journal_created_at = None;
        let after = to_json(&state.clone());
        g.audit(
            actor,
            "monthly_close_revert",
            "monthly_close",
            month,
            before,
            after,
        )?;
        g.store.persist()?;
        info!(month, "monthly close submission reverted");
        find_close_batch(g.store.state(), month)
    }

    // -----------------------------------------------------------------------
    // Audit
    // -----------------------------------------------------------------------

    /// Every audit event recorded so far, oldest first.
    pub fn audit_events(&self) -> WorkflowResult<Vec<AuditEvent>> {
        let g = self.lock()?;
        Ok(g.ledger.read_all()?)
    }
}

/// Shared ingest path: store facts, seed month states, stamp counters,
/// complete the run. Audits, does NOT persist.
fn ingest(
    inner: &mut Inner,
    run_id: Uuid,
    decisions: Vec<MatchDecision>,
    exceptions: Vec<ExceptionCase>,
    actor: &str,
) -> WorkflowResult<ReconciliationRun> {
    let mut run = inner.run(run_id)?;
    let before = to_json(&run);

    let good = decisions.iter().filter(|d| d.final_status.is_good()).count();
    run.counters = RunCounters {
        total: decisions.len(),
        good,
        doubtful: decisions.len() - good,
        exceptions: exceptions.len(),
    };
    run.status = RunStatus::Completed;
    run.stage = "completed".to_string();
    run.updated_at = Utc::now();

    let doc = inner.store.state_mut();
    for decision in &decisions {
        doc.ensure_month_state(run_id, &decision.transaction_month);
    }
    doc.decisions.insert(run_id, decisions);
    doc.exceptions.insert(run_id, exceptions);
    doc.runs.insert(run_id, run.clone());

    inner.audit(
        actor,
        "ingest_run_results",
        "reconciliation_run",
        &run_id.to_string(),
        before,
        to_json(&run),
    )?;
    Ok(run)
}

/// One run's monthly summary by month key.
fn find_month(
    doc: &StoreDoc,
    run_id: Uuid,
    month: &str,
) -> WorkflowResult<MonthlySubmissionSummary> {
    monthly_items(doc, run_id)
        .into_iter()
        .find(|m| m.month == month)
        .ok_or_else(|| WorkflowError::not_found("month", month))
}

/// One close batch by month key.
fn find_close_batch(doc: &StoreDoc, month: &str) -> WorkflowResult<MonthlyCloseBatch> {
    close_batches(doc)
        .into_iter()
        .find(|b| b.month == month)
        .ok_or_else(|| WorkflowError::not_found("monthly close batch", month))
}
