//! bujo
//!
//! Command-line front end and HTTP API for the bullet-journal migration
//! engine.

use anyhow::{Context, Result};
use bujo_migrate::cli::{Cli, Command, ServeArgs, commands};
use bujo_migrate::clock;
use bujo_migrate::config::{Config, ConfigLoader, ConfigPaths};
use bujo_migrate::db::Database;
use bujo_migrate::engine::{MigrationEngine, Session};
use bujo_migrate::logging::{self, LogTarget};
use bujo_migrate::server::{self, AppState};
use bujo_migrate::storage::JournalStore;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target: LogTarget = match cli.log.parse() {
        Ok(target) => target,
        Err(never) => match never {},
    };
    logging::init(&target, cli.verbose)?;

    let paths = ConfigPaths::discover().with_explicit(cli.config.clone());
    let mut loader = ConfigLoader::load_with_paths(paths).context("loading configuration")?;
    for (tier, path) in loader.sources() {
        debug!(tier = %tier, path = %path.display(), "Config source");
    }

    // CLI flags are the top tier
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    if let Some(user) = &cli.user {
        config.journal.user = Some(user.clone());
    }
    let config = loader.into_config();

    let db = open_database(&config.server.db_path)?;

    match cli.command {
        Some(Command::Journal(command)) => {
            let session = match config.journal.user.as_deref() {
                Some(user) => Session::user(user),
                None => Session::anonymous(),
            };
            let engine = MigrationEngine::new(Arc::new(db), session, clock::system())
                .with_options(config.journal.engine_options());
            let out = commands::execute(command, &engine, &config.journal, cli.format).await?;
            print!("{}", out);
        }
        Some(Command::Serve(args)) => run_server(db, config, args).await?,
        None => run_server(db, config, ServeArgs::default()).await?,
    }

    Ok(())
}

fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Database::open(path).with_context(|| format!("opening database {}", path.display()))
}

async fn run_server(db: Database, mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;
    if config.journal.user.is_none() {
        info!("No journal.user configured; requests must send the x-bujo-user header");
    }

    let store: Arc<dyn JournalStore> = Arc::new(db);
    let state = AppState::new(store, config, clock::system());
    server::serve(state, addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt");
    })
    .await
}
