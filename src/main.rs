use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod config;
mod db;
mod entity;
mod error;
mod models;
mod report;
mod resolver;
mod risk;
mod store;

use crate::config::Settings;
use crate::db::PgEventStore;
use crate::entity::{Employee, ReportModel, Team};
use crate::models::EntityKind;
use crate::risk::{RiskModel, RiskScorer};

#[derive(Parser)]
#[command(name = "employee-dashboard")]
#[command(about = "Employee event history and recruitment risk dashboard", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import events and/or notes from CSV files
    #[command(group(
        ArgGroup::new("source")
            .args(["events", "notes"])
            .required(true)
            .multiple(true)
    ))]
    Import {
        #[arg(long)]
        events: Option<PathBuf>,
        #[arg(long)]
        notes: Option<PathBuf>,
    },
    /// List selectable employees or teams
    Options {
        #[arg(long, value_enum)]
        kind: EntityKind,
    },
    /// Render the dashboard for one employee or team
    Report {
        #[arg(long, value_enum)]
        kind: EntityKind,
        /// Numeric id or exact display name
        #[arg(long)]
        id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rank every employee or team by recruitment risk
    Score {
        #[arg(long, value_enum)]
        kind: EntityKind,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Commands {
    fn needs_model(&self) -> bool {
        matches!(self, Commands::Report { .. } | Commands::Score { .. })
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("employee_events_dashboard=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let settings = cli.settings;

    // The model is read once, before any query runs, and shared read-only.
    let scorer = if cli.command.needs_model() {
        let model = RiskModel::load(&settings.model_path)
            .context("cannot serve reports without a valid risk model")?;
        Some(RiskScorer::new(Arc::new(model)))
    } else {
        None
    };

    let database_url = settings
        .database_url
        .clone()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgEventStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { events, notes } => {
            if let Some(csv) = events {
                let inserted = db::import_events(&pool, &csv).await?;
                println!("Inserted {inserted} events from {}.", csv.display());
            }
            if let Some(csv) = notes {
                let inserted = db::import_notes(&pool, &csv).await?;
                println!("Inserted {inserted} notes from {}.", csv.display());
            }
        }
        Commands::Options { kind } => {
            let options = match kind {
                EntityKind::Employee => Employee::new(store).selector_options().await?,
                EntityKind::Team => Team::new(store).selector_options().await?,
            };

            if options.is_empty() {
                println!("No {kind} records found.");
                return Ok(());
            }

            for option in options {
                println!("{}\t{}", option.id, option.label);
            }
        }
        Commands::Report {
            kind,
            id,
            format,
            out,
        } => {
            let scorer = scorer.context("risk model was not loaded")?;
            let entity =
                resolver::resolve_and_build(store.as_ref(), settings.entity_policy(), &id, kind)
                    .await?;
            let data = match entity.kind {
                EntityKind::Employee => {
                    report::assemble(&Employee::new(store), &scorer, entity.id).await?
                }
                EntityKind::Team => report::assemble(&Team::new(store), &scorer, entity.id).await?,
            };

            let rendered = match format {
                OutputFormat::Markdown => report::build_report(&data),
                OutputFormat::Json => report::build_json(&data)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Score { kind, limit } => {
            let scorer = scorer.context("risk model was not loaded")?;
            let rankings = match kind {
                EntityKind::Employee => scorer.rank(&Employee::new(store)).await?,
                EntityKind::Team => scorer.rank(&Team::new(store)).await?,
            };

            if rankings.is_empty() {
                println!("No {kind} records to score.");
                return Ok(());
            }

            println!("Top {kind}s by recruitment risk:");
            for ranking in rankings.iter().take(limit) {
                println!(
                    "- {} (#{}) risk {:.2}",
                    ranking.label,
                    ranking.id,
                    ranking.score.value()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DefaultEntityPolicy;

    #[test]
    fn report_command_parses_with_defaults() {
        let cli = Cli::try_parse_from([
            "employee-dashboard",
            "report",
            "--kind",
            "team",
            "--id",
            "Platform",
        ])
        .unwrap();

        assert!(cli.command.needs_model());
        assert_eq!(cli.settings.entity_policy(), DefaultEntityPolicy::Fallback(1));
        match cli.command {
            Commands::Report {
                kind, id, format, ..
            } => {
                assert_eq!(kind, EntityKind::Team);
                assert_eq!(id, "Platform");
                assert_eq!(format, OutputFormat::Markdown);
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn fallback_policy_is_configurable() {
        let cli = Cli::try_parse_from([
            "employee-dashboard",
            "report",
            "--kind",
            "employee",
            "--id",
            "x",
            "--default-entity-id",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.settings.entity_policy(), DefaultEntityPolicy::Fallback(7));

        let strict = Cli::try_parse_from([
            "employee-dashboard",
            "--reject-unknown",
            "report",
            "--kind",
            "employee",
            "--id",
            "x",
        ])
        .unwrap();
        assert_eq!(strict.settings.entity_policy(), DefaultEntityPolicy::Reject);
    }

    #[test]
    fn import_requires_a_source() {
        assert!(Cli::try_parse_from(["employee-dashboard", "import"]).is_err());
        let cli = Cli::try_parse_from(["employee-dashboard", "import", "--notes", "n.csv"]).unwrap();
        assert!(!cli.command.needs_model());
    }
}
