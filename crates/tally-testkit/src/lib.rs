//! tally-testkit
//!
//! Scenario fixtures for the reconciliation crates: a builder producing
//! fully-populated normalized rows, triple-set helpers for the common
//! "same transaction seen by three sources" shape, and CSV round-trip
//! helpers for file-driven scenarios.
//!
//! Dev-dependency only. Must not leak into production builds.

use std::path::Path;

use anyhow::{Context, Result};

use tally_schemas::SourceRecord;

/// Builder over [`SourceRecord`] with production-shaped defaults. Tests
/// override only the fields the scenario is about.
#[derive(Debug, Clone)]
pub struct SourceRecordBuilder {
    record: SourceRecord,
}

/// Start a builder for one reference.
pub fn record(merchant_ref: &str) -> SourceRecordBuilder {
    SourceRecordBuilder {
        record: SourceRecord {
            psp_txn_id: format!("PSP-{merchant_ref}"),
            merchant_ref: merchant_ref.to_string(),
            gross_amount: 100.0,
            currency: "EUR".to_string(),
            processing_fee: 2.5,
            net_payout: 97.5,
            transaction_date: "2026-03-05T10:30:00".to_string(),
            settlement_date: "2026-03-07T00:00:00".to_string(),
            client_id: "CL-001".to_string(),
            client_name: "Acme Commerce".to_string(),
            description: "card payment".to_string(),
            status: "settled".to_string(),
            payment_method: "card".to_string(),
            settlement_bank: "First Continental".to_string(),
            bank_country: "DE".to_string(),
            fx_rate: None,
        },
    }
}

impl SourceRecordBuilder {
    pub fn amounts(mut self, gross: f64, fee: f64, net: f64) -> Self {
        self.record.gross_amount = gross;
        self.record.processing_fee = fee;
        self.record.net_payout = net;
        self
    }

    pub fn gross_amount(mut self, v: f64) -> Self {
        self.record.gross_amount = v;
        self
    }

    pub fn currency(mut self, v: &str) -> Self {
        self.record.currency = v.to_string();
        self
    }

    pub fn fx_rate(mut self, v: Option<f64>) -> Self {
        self.record.fx_rate = v;
        self
    }

    pub fn transaction_date(mut self, v: &str) -> Self {
        self.record.transaction_date = v.to_string();
        self
    }

    pub fn settlement_date(mut self, v: &str) -> Self {
        self.record.settlement_date = v.to_string();
        self
    }

    pub fn client_id(mut self, v: &str) -> Self {
        self.record.client_id = v.to_string();
        self
    }

    pub fn status(mut self, v: &str) -> Self {
        self.record.status = v.to_string();
        self
    }

    pub fn payment_method(mut self, v: &str) -> Self {
        self.record.payment_method = v.to_string();
        self
    }

    pub fn bank_country(mut self, v: &str) -> Self {
        self.record.bank_country = v.to_string();
        self
    }

    pub fn build(self) -> SourceRecord {
        self.record
    }
}

/// The same transaction as reported identically by all three sources.
pub fn consistent_triplet(merchant_ref: &str) -> (SourceRecord, SourceRecord, SourceRecord) {
    let row = record(merchant_ref).build();
    (row.clone(), row.clone(), row)
}

/// N identical-across-sources references, `REF-001`..`REF-00N` style keys.
/// Returns (internal, erp, psp) record sets.
pub fn consistent_record_sets(
    prefix: &str,
    n: usize,
) -> (Vec<SourceRecord>, Vec<SourceRecord>, Vec<SourceRecord>) {
    let mut internal = Vec::with_capacity(n);
    let mut erp = Vec::with_capacity(n);
    let mut psp = Vec::with_capacity(n);
    for i in 1..=n {
        let (a, b, c) = consistent_triplet(&format!("{prefix}-{i:03}"));
        internal.push(a);
        erp.push(b);
        psp.push(c);
    }
    (internal, erp, psp)
}

/// Load a normalized record set from CSV (canonical column headers).
pub fn load_records_csv(path: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())
        .with_context(|| format!("open record csv {:?}", path.as_ref()))?;
    let mut out = Vec::new();
    for row in reader.deserialize() {
        let record: SourceRecord = row.context("parse record csv row")?;
        out.push(record);
    }
    Ok(out)
}

/// Write a record set as CSV with canonical headers.
pub fn write_records_csv(path: impl AsRef<Path>, records: &[SourceRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("create record csv {:?}", path.as_ref()))?;
    for record in records {
        writer.serialize(record).context("write record csv row")?;
    }
    writer.flush().context("flush record csv")?;
    Ok(())
}
