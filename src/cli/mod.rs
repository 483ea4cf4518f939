use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::ledger::{FileLedgerStore, HistoryLedger};
use crate::lookup::CatalogClient;
use crate::messages::RestMessageService;

pub mod commands;

use self::commands::{BrowseArgs, SendArgs, ViewArgs};

#[derive(Parser, Debug)]
#[command(
    name = "songfess",
    version,
    about = "Send a song with a personal note and browse what others shared"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over SONGFESS_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over SONGFESS_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose and publish a message with an attached song
    Send(SendArgs),
    /// Show your sent messages from the last 7 days
    History,
    /// Browse the public feed, optionally filtered
    Browse(BrowseArgs),
    /// Show one published message by id
    View(ViewArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("SONGFESS_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("SONGFESS_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    let ledger = HistoryLedger::new(FileLedgerStore::new(config.history.ledger_path.clone()));

    match cli.command {
        Commands::Send(args) => {
            let lookup = CatalogClient::new(&config.lookup).context("building catalog client")?;
            let service = build_service(&config)?;
            commands::send_message(config.clone(), &lookup, &service, &ledger, args)
        }
        Commands::History => {
            let service = build_service(&config)?;
            commands::show_history(&service, &ledger)
        }
        Commands::Browse(args) => {
            let service = build_service(&config)?;
            commands::browse(&service, args)
        }
        Commands::View(args) => {
            let service = build_service(&config)?;
            commands::view(&service, args)
        }
    }
}

fn build_service(config: &crate::AppConfig) -> Result<RestMessageService> {
    if !config.service.is_configured() {
        bail!("message store not configured; set service.base_url (and service.api_key) in the config file");
    }
    RestMessageService::new(&config.service).context("building message store client")
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
