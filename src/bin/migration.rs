use clap::{Parser, Subcommand};
use migrations::{Migrator, MigratorTrait};
use tracing::info;

use fulfillment_api::db;

/// Applies or rolls back the schema migrations.
#[derive(Debug, Parser)]
#[command(name = "migration", version, about = "Fulfillment API schema migrations")]
struct Cli {
    /// Database URL; falls back to `DATABASE_URL`
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fulfillment_api::config::init_tracing("info", false);
    let cli = Cli::parse();

    let database_url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("pass --database-url or set DATABASE_URL"))?,
    };
    let conn = db::establish_connection(&database_url).await?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&conn, steps).await?;
            info!("migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&conn, Some(steps)).await?;
            info!(steps, "migrations rolled back");
        }
        Command::Status => Migrator::status(&conn).await?,
        Command::Fresh => {
            Migrator::fresh(&conn).await?;
            info!("schema recreated");
        }
    }
    Ok(())
}
