use std::{process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::{error, info};

use rtb_core::{backlog::Backlog, config::Config, logging};
use rtb_postgres::{create_pool, migrations::run_migrations, PgTasksStore, PgUsersStore};

#[derive(Parser)]
#[command(name = "rtb", version, about = "Telegram reading-list bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Serve Telegram commands and scheduled reminders (default).
    Run,
    /// Apply database migrations and exit.
    Migrate,
    /// Send one round of reminders and exit.
    Remind,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init("rtb") {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command.unwrap_or(Command::Run)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let cfg = Arc::new(Config::load()?);

    let pool = create_pool(&cfg.database).await?;
    run_migrations(&pool).await?;
    if let Command::Migrate = command {
        info!("migrations applied");
        return Ok(());
    }

    let backlog = Arc::new(Backlog::new(
        Arc::new(PgUsersStore::new(pool.clone(), logging::component("users"))),
        Arc::new(PgTasksStore::new(pool, logging::component("tasks"))),
        logging::component("backlog"),
    ));

    match command {
        Command::Remind => {
            let report = rtb_telegram::router::send_reminders_once(cfg, backlog).await?;
            info!(
                users = report.users,
                delivered = report.delivered,
                failed = report.failed,
                "reminder run finished"
            );
        }
        _ => rtb_telegram::router::run_polling(cfg, backlog).await?,
    }
    Ok(())
}
