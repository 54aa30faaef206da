use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use attendance_risk_engine::aggregate::PanelFilters;
use attendance_risk_engine::config::AppConfig;
use attendance_risk_engine::db::PgAttendanceStore;
use attendance_risk_engine::models::{CohortStatus, Requester, Role};
use attendance_risk_engine::{range, telemetry, AggregationEngine, DateRange, EngineError};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "attendance-risk")]
#[command(about = "Attendance risk alerts and cohort reporting", long_about = None)]
struct Cli {
    #[command(flatten)]
    requester: RequesterArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RequesterArgs {
    /// Role the query runs as (admin, coordinator, instructor, learner)
    #[arg(long, global = true, default_value = "admin")]
    role: Role,
    /// Identity of the requester; instructors only see their own cohorts
    #[arg(long, global = true, default_value_t = Uuid::nil())]
    user_id: Uuid,
}

impl RequesterArgs {
    fn requester(&self) -> Requester {
        Requester::new(self.user_id, self.role)
    }
}

#[derive(Args)]
struct RangeArgs {
    /// Range start (RFC 3339 or YYYY-MM-DD); needs --to
    #[arg(long)]
    from: Option<String>,
    /// Range end (RFC 3339 or YYYY-MM-DD); needs --from
    #[arg(long)]
    to: Option<String>,
    /// Calendar month as YYYY-MM; overrides --from/--to
    #[arg(long)]
    month: Option<String>,
}

impl RangeArgs {
    fn resolve(&self) -> anyhow::Result<DateRange> {
        range::resolve(
            self.from.as_deref(),
            self.to.as_deref(),
            self.month.as_deref(),
        )
        .context("invalid date range")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical range for the given parameters
    Range {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Evaluate a single learner's current alert status
    Alert {
        #[arg(long)]
        learner: Uuid,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// List the live alerts of a cohort
    Alerts {
        #[arg(long)]
        cohort: Uuid,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Summarize attendance for a cohort
    Summary {
        #[arg(long)]
        cohort: Uuid,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Portfolio dashboard for an instructor
    Dashboard {
        #[arg(long)]
        instructor: Uuid,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Organization-wide coordination panel
    Panel {
        #[arg(long)]
        institution: Option<Uuid>,
        #[arg(long)]
        program: Option<Uuid>,
        #[arg(long)]
        status: Option<CohortStatus>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Export cohort data as CSV
    Export {
        #[command(subcommand)]
        kind: ExportKind,
    },
    /// Generate a markdown report for a cohort
    Report {
        #[arg(long)]
        cohort: Uuid,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ExportKind {
    /// Attendance detail rows
    Attendance {
        #[arg(long)]
        cohort: Uuid,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "attendance.csv")]
        out: PathBuf,
    },
    /// Live alert rows
    Alerts {
        #[arg(long)]
        cohort: Uuid,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "alerts.csv")]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Client errors (bad range, forbidden, unknown id) exit with 2, everything else with 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<EngineError>() {
        Some(engine_err) if engine_err.is_client_error() => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {

    if let Commands::Range { range } = &cli.command {
        let resolved = range.resolve()?;
        println!("{resolved}");
        return Ok(());
    }

    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.log_level).context("failed to initialise logging")?;

    let store = PgAttendanceStore::connect(&config.database_url, config.max_connections)
        .await
        .context("failed to connect to Postgres")?;
    let engine = AggregationEngine::new(store, config.engine);
    let requester = cli.requester.requester();
    info!(role = ?requester.role, "running attendance query");

    match cli.command {
        Commands::Range { .. } => {}
        Commands::Alert { learner, range } => {
            let alert = engine
                .evaluate_learner_alert(learner, &range.resolve()?, &requester)
                .await?;
            print_json(&alert)?;
        }
        Commands::Alerts { cohort, range } => {
            let alerts = engine
                .cohort_alerts(cohort, &range.resolve()?, &requester)
                .await?;
            if alerts.is_empty() {
                println!("No learners are currently on alert.");
                return Ok(());
            }
            print_json(&alerts)?;
        }
        Commands::Summary { cohort, range } => {
            let summary = engine
                .cohort_summary(cohort, &range.resolve()?, &requester)
                .await?;
            print_json(&summary)?;
        }
        Commands::Dashboard { instructor, range } => {
            let dashboard = engine
                .instructor_dashboard(instructor, &range.resolve()?)
                .await?;
            print_json(&dashboard)?;
        }
        Commands::Panel {
            institution,
            program,
            status,
            range,
        } => {
            let filters = PanelFilters {
                institution_id: institution,
                program_id: program,
                cohort_status: status,
            };
            let panel = engine
                .coordination_panel(&filters, &range.resolve()?, &requester)
                .await?;
            print_json(&panel)?;
        }
        Commands::Export { kind } => match kind {
            ExportKind::Attendance { cohort, range, out } => {
                let csv = engine
                    .export_cohort_attendance(cohort, &range.resolve()?, &requester)
                    .await?;
                std::fs::write(&out, csv)?;
                println!("Attendance written to {}.", out.display());
            }
            ExportKind::Alerts { cohort, range, out } => {
                let csv = engine
                    .export_cohort_alerts(cohort, &range.resolve()?, &requester)
                    .await?;
                std::fs::write(&out, csv)?;
                println!("Alerts written to {}.", out.display());
            }
        },
        Commands::Report { cohort, range, out } => {
            let report = engine
                .cohort_report(cohort, &range.resolve()?, &requester)
                .await?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use attendance_risk_engine::StoreError;

    #[test]
    fn client_errors_exit_with_two() {
        let err = range::resolve(Some("2025-02-01"), Some("2025-01-01"), None)
            .context("invalid date range")
            .unwrap_err();
        assert_eq!(exit_status(&err), 2);

        let err = anyhow::Error::from(EngineError::not_found("cohort", Uuid::nil()));
        assert_eq!(exit_status(&err), 2);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let decode = StoreError::Decode {
            column: "cohorts.status",
            value: "ARCHIVED".to_string(),
        };
        assert_eq!(exit_status(&anyhow::Error::from(EngineError::from(decode))), 1);
        assert_eq!(exit_status(&anyhow!("connection refused")), 1);
    }
}
