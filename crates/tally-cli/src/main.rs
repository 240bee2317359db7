//! Operator CLI for the reconciliation core.
//!
//! Consumes already-normalized CSV record sets (the upstream normalizer
//! owns format detection and column mapping) and drives the workflow
//! service: reconcile, inspect, address, notify, journal, submit, close.
//! JSON on stdout, logs on stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use tally_audit::{verify_hash_chain, VerifyResult};
use tally_config::Settings;
use tally_schemas::{ExceptionState, SourceRecord};
use tally_workflow::WorkflowService;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Three-way reconciliation operations CLI", long_about = None)]
struct Cli {
    /// Actor recorded in the audit trail for mutating commands.
    #[arg(long, global = true, default_value = "analyst")]
    actor: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run, reconcile three normalized CSV record sets, print the run.
    Run {
        /// Internal ledger record set (normalized CSV)
        #[arg(long)]
        internal: PathBuf,

        /// ERP/cashier record set (normalized CSV)
        #[arg(long)]
        erp: PathBuf,

        /// PSP statement record set (normalized CSV)
        #[arg(long)]
        psp: PathBuf,
    },

    /// List runs, newest first.
    Runs,

    /// Print one run with its decisions and exceptions.
    Status {
        #[arg(long)]
        run_id: String,
    },

    /// Monthly submission workflow (run × month)
    Monthly {
        #[command(subcommand)]
        cmd: MonthlyCmd,
    },

    /// Daily close workflow (run)
    Daily {
        #[command(subcommand)]
        cmd: DailyCmd,
    },

    /// Consolidated monthly close workflow (calendar month across runs)
    Close {
        #[command(subcommand)]
        cmd: CloseCmd,
    },

    /// Exception case actions
    Exception {
        #[command(subcommand)]
        cmd: ExceptionCmd,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum MonthlyCmd {
    /// Monthly submission summaries for a run.
    List {
        #[arg(long)]
        run_id: String,
    },

    /// Bulk-address a month's open exceptions (-> verified).
    Address {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        month: String,
    },

    /// Mark a month notified to its sources.
    Notify {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        month: String,
    },

    /// Create the accounting journal for a ready month.
    Journal {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        month: String,
    },

    /// Submit a ready month to the ERP.
    Submit {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        month: String,
    },
}

#[derive(Subcommand)]
enum DailyCmd {
    /// Daily rollup for a run (or all runs without --run-id).
    Status {
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Override the run's business date (YYYY-MM-DD).
    BusinessDate {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        date: String,
    },

    /// Address doubtful exceptions across all months of the run.
    Address {
        #[arg(long)]
        run_id: String,
    },

    /// Notify every un-notified doubtful month of the run.
    Notify {
        #[arg(long)]
        run_id: String,
    },

    /// Close the day for the run.
    Close {
        #[arg(long)]
        run_id: String,
    },
}

#[derive(Subcommand)]
enum CloseCmd {
    /// All monthly close batches.
    List,

    /// One month's consolidated batch.
    Status {
        #[arg(long)]
        month: String,
    },

    /// Create the consolidated journal.
    Journal {
        #[arg(long)]
        month: String,
    },

    /// Submit the consolidated batch to the ERP.
    Submit {
        #[arg(long)]
        month: String,
    },

    /// Revert a submitted batch back to the journal stage.
    Revert {
        #[arg(long)]
        month: String,
    },
}

#[derive(Subcommand)]
enum ExceptionCmd {
    /// Exception cases of a run.
    List {
        #[arg(long)]
        run_id: String,
    },

    /// Move one exception to a new state (verified|approved|resolved).
    Set {
        #[arg(long)]
        exception_id: String,
        #[arg(long)]
        state: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Print every audit event, oldest first.
    List,

    /// Verify the audit ledger's hash chain.
    Verify,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let service = WorkflowService::open(&settings.storage_dir, settings.audit_hash_chain)?;

    match cli.cmd {
        Commands::Run { internal, erp, psp } => {
            let internal = load_records_csv(&internal)?;
            let erp = load_records_csv(&erp)?;
            let psp = load_records_csv(&psp)?;
            let run = service.create_run(&cli.actor)?;
            let run = service.run_reconciliation(
                run.id,
                &internal,
                &erp,
                &psp,
                &settings.match_rules(),
            )?;
            print_json(&run)
        }

        Commands::Runs => print_json(&service.list_runs()?),

        Commands::Status { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            let run = service.get_run(run_id)?;
            let decisions = service.get_decisions(run_id)?;
            let exceptions = service.get_exceptions(run_id)?;
            print_json(&serde_json::json!({
                "run": run,
                "decisions": decisions,
                "exceptions": exceptions,
            }))
        }

        Commands::Monthly { cmd } => match cmd {
            MonthlyCmd::List { run_id } => {
                print_json(&service.list_monthly_submissions(parse_run_id(&run_id)?)?)
            }
            MonthlyCmd::Address { run_id, month } => print_json(&service.address_monthly_doubtful(
                parse_run_id(&run_id)?,
                &month,
                &cli.actor,
            )?),
            MonthlyCmd::Notify { run_id, month } => print_json(&service.mark_monthly_notified(
                parse_run_id(&run_id)?,
                &month,
                &cli.actor,
            )?),
            MonthlyCmd::Journal { run_id, month } => print_json(&service.create_monthly_journal(
                parse_run_id(&run_id)?,
                &month,
                &cli.actor,
            )?),
            MonthlyCmd::Submit { run_id, month } => print_json(&service.submit_monthly_to_erp(
                parse_run_id(&run_id)?,
                &month,
                &cli.actor,
            )?),
        },

        Commands::Daily { cmd } => match cmd {
            DailyCmd::Status { run_id: Some(id) } => {
                print_json(&service.get_daily_ops(parse_run_id(&id)?)?)
            }
            DailyCmd::Status { run_id: None } => print_json(&service.list_daily_ops()?),
            DailyCmd::BusinessDate { run_id, date } => print_json(
                &service.set_daily_business_date(parse_run_id(&run_id)?, &date, &cli.actor)?,
            ),
            DailyCmd::Address { run_id } => {
                print_json(&service.address_daily_doubtful(parse_run_id(&run_id)?, &cli.actor)?)
            }
            DailyCmd::Notify { run_id } => {
                print_json(&service.notify_daily_ops(parse_run_id(&run_id)?, &cli.actor)?)
            }
            DailyCmd::Close { run_id } => {
                print_json(&service.close_daily_ops(parse_run_id(&run_id)?, &cli.actor)?)
            }
        },

        Commands::Close { cmd } => match cmd {
            CloseCmd::List => print_json(&service.list_monthly_close_batches()?),
            CloseCmd::Status { month } => print_json(&service.get_monthly_close_batch(&month)?),
            CloseCmd::Journal { month } => {
                print_json(&service.create_monthly_close_journal(&month, &cli.actor)?)
            }
            CloseCmd::Submit { month } => {
                print_json(&service.submit_monthly_close_to_erp(&month, &cli.actor)?)
            }
            CloseCmd::Revert { month } => {
                print_json(&service.revert_monthly_close_submission(&month, &cli.actor)?)
            }
        },

        Commands::Exception { cmd } => match cmd {
            ExceptionCmd::List { run_id } => {
                print_json(&service.get_exceptions(parse_run_id(&run_id)?)?)
            }
            ExceptionCmd::Set {
                exception_id,
                state,
            } => {
                let exception_id = Uuid::parse_str(&exception_id)
                    .with_context(|| format!("invalid exception id: {exception_id}"))?;
                // Unknown state strings are a validation failure, not a crash.
                let state = ExceptionState::from_str(&state)?;
                print_json(&service.update_exception_state(exception_id, state, &cli.actor)?)
            }
        },

        Commands::Audit { cmd } => match cmd {
            AuditCmd::List => print_json(&service.audit_events()?),
            AuditCmd::Verify => {
                let path = settings.storage_dir.join("audit.jsonl");
                match verify_hash_chain(&path)? {
                    VerifyResult::Valid { lines } => {
                        print_json(&serde_json::json!({ "valid": true, "lines": lines }))
                    }
                    VerifyResult::Broken { line, reason } => print_json(&serde_json::json!({
                        "valid": false,
                        "line": line,
                        "reason": reason,
                    })),
                }
            }
        },
    }
}

fn parse_run_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid run id: {raw}"))
}

/// Normalized record sets arrive as CSV with canonical headers.
fn load_records_csv(path: &Path) -> Result<Vec<SourceRecord>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open record csv {:?}", path))?;
    let mut out = Vec::new();
    for row in reader.deserialize() {
        let record: SourceRecord = row.context("parse record csv row")?;
        out.push(record);
    }
    Ok(out)
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}
