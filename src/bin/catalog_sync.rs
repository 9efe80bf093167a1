use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use nail_catalog_sync::cli::sync::{self, SyncConfig};
use nail_catalog_sync::database_ops::reconcile::DEFAULT_BATCH_SIZE;
use nail_catalog_sync::tracing::{init_tracing, LogLevel};
use nail_catalog_sync::util::env;

#[derive(Parser, Debug)]
#[command(
    name = "catalog_sync",
    version,
    about = "Sync salon colour catalogues into the colors / color_variants tables"
)]
struct Cli {
    /// OPI storefront export
    #[arg(long)]
    opi: Option<PathBuf>,
    /// CND storefront export
    #[arg(long)]
    cnd: Option<PathBuf>,
    /// The GelBottle export
    #[arg(long)]
    tgb: Option<PathBuf>,
    /// Rows per batched insert / upsert
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Parse and report without writing to the store
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Replace existing colors.primary_variant_id with the first variant encountered
    #[arg(long, default_value_t = false)]
    overwrite_primary: bool,
    /// Do not call refresh_hex_categorization() after the sync
    #[arg(long, default_value_t = false)]
    skip_refresh: bool,
    /// Logging verbosity (RUST_LOG overrides)
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
    /// Max pool connections
    #[arg(long, default_value_t = 4)]
    max_connections: u32,
    /// Print the run summary as JSON on stdout
    #[arg(long, default_value_t = false)]
    summary_json: bool,
}

impl From<&Cli> for SyncConfig {
    fn from(cli: &Cli) -> Self {
        SyncConfig {
            opi: cli.opi.clone(),
            cnd: cli.cnd.clone(),
            tgb: cli.tgb.clone(),
            database_url: cli.db_url.clone(),
            max_connections: cli.max_connections,
            batch_size: cli.batch_size,
            dry_run: cli.dry_run,
            overwrite_primary: cli.overwrite_primary,
            skip_refresh: cli.skip_refresh,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env::init_env();
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_level) {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    // Reported here only; returning the error from main would print it again.
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "catalog sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let report = sync::run(SyncConfig::from(cli)).await?;
    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
