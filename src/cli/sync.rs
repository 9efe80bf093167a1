use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{deduplicate, load_catalogues, LoadStats, SourceCatalog};
use crate::database_ops::db::Db;
use crate::database_ops::reconcile::{
    ReconcileOptions, ReconcileSummary, Reconciler, DEFAULT_BATCH_SIZE,
};
use crate::database_ops::store::CatalogStore;
use crate::error::SyncError;
use crate::util::env as env_util;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub opi: Option<PathBuf>,
    pub cnd: Option<PathBuf>,
    pub tgb: Option<PathBuf>,
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub batch_size: usize,
    pub dry_run: bool,
    pub overwrite_primary: bool,
    /// Skip the categorization trigger after reconciling.
    pub skip_refresh: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            opi: None,
            cnd: None,
            tgb: None,
            database_url: None,
            max_connections: 4,
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            overwrite_primary: false,
            skip_refresh: false,
        }
    }
}

impl SyncConfig {
    /// Configured catalogues in concatenation order (OPI, CND, The GelBottle).
    pub fn catalog_sources(&self) -> Vec<(SourceCatalog, PathBuf)> {
        SourceCatalog::ALL
            .into_iter()
            .filter_map(|source| self.path_for(source).map(|p| (source, p.clone())))
            .collect()
    }

    fn path_for(&self, source: SourceCatalog) -> Option<&PathBuf> {
        match source {
            SourceCatalog::Opi => self.opi.as_ref(),
            SourceCatalog::Cnd => self.cnd.as_ref(),
            SourceCatalog::GelBottle => self.tgb.as_ref(),
        }
    }

    /// Check everything that does not need the store: options and input files.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::Configuration("--batch-size must be at least 1".into()));
        }
        let sources = self.catalog_sources();
        if sources.is_empty() {
            return Err(SyncError::Configuration(
                "no catalogue supplied; pass at least one of --opi, --cnd, --tgb".into(),
            ));
        }
        for (_, path) in &sources {
            if !path.is_file() {
                return Err(SyncError::MissingInput(path.clone()));
            }
        }
        Ok(())
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            batch_size: self.batch_size,
            dry_run: self.dry_run,
            overwrite_primary: self.overwrite_primary,
            refresh_categories: !self.skip_refresh,
        }
    }

    /// Store DSN from the explicit override or the environment.
    pub fn resolve_database_url(&self) -> Result<String, SyncError> {
        self.database_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(env_util::db_url)
            .ok_or_else(|| {
                SyncError::Configuration(format!(
                    "store credentials missing; set --db-url, one of {:?}, or DB_HOST/DB_USERNAME",
                    env_util::DB_URL_KEYS
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: SourceCatalog,
    pub path: PathBuf,
    #[serde(flatten)]
    pub stats: LoadStats,
}

/// Everything a run reports on exit.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceStats>,
    pub raw_rows: usize,
    pub deduplicated_rows: usize,
    pub reconcile: ReconcileSummary,
}

/// Load, deduplicate and reconcile the configured catalogues against `store`.
pub async fn sync_catalogues<S: CatalogStore + ?Sized>(
    config: &SyncConfig,
    store: &S,
) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let started_at = Utc::now();
    let sources = config.catalog_sources();

    let loaded = load_catalogues(&sources)?;
    let raw_rows = loaded.records.len();
    let source_stats: Vec<SourceStats> = loaded
        .per_source
        .iter()
        .zip(&sources)
        .map(|((source, stats), (_, path))| SourceStats {
            source: *source,
            path: path.clone(),
            stats: stats.clone(),
        })
        .collect();
    let skipped = loaded.totals().skipped_invalid_hex;
    if skipped > 0 {
        info!(skipped, "rows without a valid hex were skipped");
    }

    let records = deduplicate(loaded.records);
    let reconcile = Reconciler::new(store, config.reconcile_options())
        .run(&records)
        .await?;

    let report = SyncReport {
        started_at,
        finished_at: Utc::now(),
        sources: source_stats,
        raw_rows,
        deduplicated_rows: records.len(),
        reconcile,
    };
    log_report(&report);
    Ok(report)
}

fn log_report(report: &SyncReport) {
    let r = &report.reconcile;
    info!(
        raw_rows = report.raw_rows,
        deduplicated = report.deduplicated_rows,
        existing_colors = r.existing_colors,
        new_colors = r.new_colors,
        colors_patched = r.colors_patched,
        variants_upserted = r.variants_upserted,
        variants_new = r.variants_new,
        primary_assigned = r.primary_assigned,
        refresh = ?r.refresh,
        dry_run = r.dry_run,
        "catalog sync complete"
    );
}

/// Full run against Postgres: validate, resolve credentials, connect, sync.
pub async fn run(config: SyncConfig) -> Result<SyncReport> {
    env_util::init_env();
    config.validate()?;
    let database_url = config.resolve_database_url()?;
    info!(
        target = "preflight",
        db_url = %env_util::redact_value("DATABASE_URL", &database_url),
        sources = ?config.catalog_sources(),
        batch_size = config.batch_size,
        dry_run = config.dry_run,
        overwrite_primary = config.overwrite_primary,
        "configuration snapshot"
    );
    if config.dry_run {
        warn!("dry-run: no writes will be issued");
    }

    let db = Db::connect(&database_url, config.max_connections).await?;
    Ok(sync_catalogues(&config, &db).await?)
}
