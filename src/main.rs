use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sql_relay::{config, server};
use sql_relay::{ConnectionManager, DbSettings, MssqlConnector, RelayError, StatementPolicy};

/// Exit code for `check` when the pool cannot be established.
const EXIT_CONNECTION_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP-to-SQL relay for SQL Server")]
struct Args {
    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 3000, global = true)]
    port: u16,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /query` (the default when no subcommand is given)
    Serve,
    /// Connect once, run a single query, print the rows and exit
    Check {
        #[arg(long, default_value = "SELECT @@VERSION AS version")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env has to be loaded before clap reads PORT
    let dotenv = config::load_dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    match dotenv {
        Ok(Some(path)) => tracing::debug!("loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("{}", e),
    }

    let args = Args::parse();
    let settings = match DbSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("settings: {:?}", settings);

    let db = Arc::new(ConnectionManager::new(MssqlConnector::new(settings)));
    match args.command {
        None | Some(Command::Serve) => run_server(db, args.port).await,
        Some(Command::Check { query }) => run_check(&db, &query).await,
    }
}

async fn run_server(db: Arc<ConnectionManager<MssqlConnector>>, port: u16) -> ExitCode {
    // A failed connect is logged by init; the server still starts and answers 503.
    db.init().await;

    let policy = StatementPolicy::from_env();
    if let StatementPolicy::AllowList(keywords) = &policy {
        tracing::info!("Statement allow-list: {}", keywords.join(", "));
    }

    match server::serve(db, policy, port).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_check(db: &ConnectionManager<MssqlConnector>, query: &str) -> ExitCode {
    if db.init().await.is_none() {
        return ExitCode::from(EXIT_CONNECTION_FAILED);
    }

    let outcome = db.query(query).await;
    db.close().await;
    match outcome.and_then(|rows| {
        serde_json::to_string_pretty(&rows)
            .map_err(|e| RelayError::ExecutionError(format!("failed to render rows: {e}")))
    }) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Query error: {}", e);
            ExitCode::FAILURE
        }
    }
}
