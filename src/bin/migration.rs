//! Schema migration runner.
//!
//! `DATABASE_URL` (or `--database-url`) selects the target; defaults to the
//! local SQLite file used in development.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use condo_api::migrator::Migrator;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the condo-api schema", version)]
struct Cli {
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://condo.db?mode=rwc",
        help = "Database connection URL"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand, Clone, Copy)]
enum MigrationCommand {
    /// Apply every pending migration (default)
    Up,
    /// Roll back the most recent migration
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// List applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let mut options = ConnectOptions::new(cli.database_url.clone());
    options
        .max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .with_context(|| format!("connecting to {}", cli.database_url))?;

    match cli.command.unwrap_or(MigrationCommand::Up) {
        MigrationCommand::Up => {
            Migrator::up(&db, None).await.context("applying migrations")?;
            info!("Migrations applied");
        }
        MigrationCommand::Down { steps } => {
            Migrator::down(&db, Some(steps))
                .await
                .context("rolling back migrations")?;
            info!(steps, "Migrations rolled back");
        }
        MigrationCommand::Status => {
            Migrator::status(&db).await.context("reading migration status")?;
        }
        MigrationCommand::Fresh => {
            Migrator::fresh(&db).await.context("recreating schema")?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
