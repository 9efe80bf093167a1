use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode},
    PgPool, QueryBuilder, Row,
};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::database_ops::store::{
    CatalogStore, Color, ColorInsert, ColorPatch, Variant, VariantUpsert, LOOKUP_CHUNK,
    VARIANT_CONFLICT_KEY,
};
use crate::util::env::env_flag;

const COLOR_COLUMNS: &str =
    "id, hex_code, name, brand, finish, category, primary_variant_id, source_priority";

const VARIANT_COLUMNS: &str = "id, color_id, brand, product_line, shade_name, shade_code, \
     collection, finish_override, product_url, swatch_url, source_catalog, is_active";

/// `ON CONFLICT` tail for variant upserts. Only the mutable columns are
/// refreshed; `id` and the natural key stay as first written.
fn variant_upsert_tail() -> String {
    format!(
        " ON CONFLICT ({}) DO UPDATE SET collection = EXCLUDED.collection, \
         finish_override = EXCLUDED.finish_override, \
         product_url = EXCLUDED.product_url, \
         swatch_url = EXCLUDED.swatch_url, \
         source_catalog = EXCLUDED.source_catalog, \
         is_active = EXCLUDED.is_active, \
         updated_at = now()",
        VARIANT_CONFLICT_KEY.join(", ")
    )
}

/// Postgres-backed catalogue store (`public.colors` / `public.color_variants`).
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !env_flag("USE_PREPARED", false) {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        // Default off: the catalogue tables are usually provisioned through the
        // hosted dashboard. Enable with AUTO_MIGRATE=1/true/on.
        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            Self::run_migrations(&pool, Path::new("./migrations")).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(Self { pool })
    }

    // Applies `NNNN_description.sql` files in version order, once each.
    async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(pool)
        .await?;

        let mut applied: HashSet<i64> = HashSet::new();
        for r in sqlx::raw_sql("SELECT version FROM _sqlx_migrations")
            .fetch_all(pool)
            .await?
        {
            applied.insert(r.try_get::<i64, _>(0)?);
        }

        let mut candidates: Vec<(i64, String, std::path::PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(stem) = fname.strip_suffix(".sql") else {
                continue;
            };
            let Some((num, desc)) = stem.split_once('_') else {
                continue;
            };
            if let Ok(version) = num.parse::<i64>() {
                candidates.push((version, desc.to_string(), path));
            }
        }
        candidates.sort_by_key(|(v, _, _)| *v);

        for (version, desc, path) in candidates {
            if !applied.insert(version) {
                continue;
            }
            let sql = std::fs::read_to_string(&path)?;
            info!(version, file = ?path, "applying migration");
            sqlx::raw_sql(&sql)
                .execute(pool)
                .await
                .with_context(|| format!("migration {version} failed"))?;
            sqlx::query("INSERT INTO _sqlx_migrations(version, description) VALUES ($1, $2)")
                .persistent(false)
                .bind(version)
                .bind(&desc)
                .execute(pool)
                .await?;
        }
        Ok(())
    }
}

fn color_from_row(r: &PgRow) -> Result<Color> {
    Ok(Color {
        id: r.try_get("id")?,
        hex_code: r.try_get("hex_code")?,
        name: r.try_get("name")?,
        brand: r.try_get("brand")?,
        finish: r.try_get("finish")?,
        category: r.try_get("category")?,
        primary_variant_id: r.try_get("primary_variant_id")?,
        source_priority: r.try_get("source_priority")?,
    })
}

fn variant_from_row(r: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: r.try_get("id")?,
        color_id: r.try_get("color_id")?,
        brand: r.try_get("brand")?,
        product_line: r.try_get("product_line")?,
        shade_name: r.try_get("shade_name")?,
        shade_code: r.try_get("shade_code")?,
        collection: r.try_get("collection")?,
        finish_override: r.try_get("finish_override")?,
        product_url: r.try_get("product_url")?,
        swatch_url: r.try_get("swatch_url")?,
        source_catalog: r.try_get("source_catalog")?,
        is_active: r.try_get("is_active")?,
    })
}

#[async_trait::async_trait]
impl CatalogStore for Db {
    #[instrument(skip(self, hexes), fields(keys = hexes.len()))]
    async fn select_colors_by_hex(&self, hexes: &[String]) -> Result<Vec<Color>> {
        let sql = format!("SELECT {COLOR_COLUMNS} FROM public.colors WHERE hex_code = ANY($1)");
        let mut out = Vec::with_capacity(hexes.len());
        for chunk in hexes.chunks(LOOKUP_CHUNK) {
            let rows = sqlx::query(&sql)
                .persistent(false)
                .bind(chunk.to_vec())
                .fetch_all(&self.pool)
                .await?;
            for r in &rows {
                out.push(color_from_row(r)?);
            }
        }
        Ok(out)
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_colors(&self, rows: &[ColorInsert]) -> Result<Vec<Color>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO public.colors (id, hex_code, name, brand, category, finish, \
             trending_score, season, mood_tags, source_priority) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.id)
                .push_bind(&r.hex_code)
                .push_bind(&r.name)
                .push_bind(&r.brand)
                .push_bind(&r.category)
                .push_bind(&r.finish)
                .push_bind(r.trending_score)
                .push_bind(&r.season)
                .push_bind(&r.mood_tags)
                .push_bind(&r.source_priority);
        });
        qb.push(" RETURNING ");
        qb.push(COLOR_COLUMNS);
        let inserted = qb.build().persistent(false).fetch_all(&self.pool).await?;
        inserted.iter().map(color_from_row).collect()
    }

    #[instrument(skip(self, patch))]
    async fn update_color(&self, id: Uuid, patch: &ColorPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, sqlx::Postgres> =
            QueryBuilder::new("UPDATE public.colors SET updated_at = now()");
        if let Some(brand) = &patch.brand {
            qb.push(", brand = ").push_bind(brand);
        }
        if let Some(finish) = &patch.finish {
            qb.push(", finish = ").push_bind(finish);
        }
        if let Some(source) = &patch.source_priority {
            qb.push(", source_priority = ").push_bind(source);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().persistent(false).execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self, ids), fields(keys = ids.len()))]
    async fn select_variants_by_color_ids(&self, ids: &[Uuid]) -> Result<Vec<Variant>> {
        let sql =
            format!("SELECT {VARIANT_COLUMNS} FROM public.color_variants WHERE color_id = ANY($1)");
        let mut out = Vec::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let rows = sqlx::query(&sql)
                .persistent(false)
                .bind(chunk.to_vec())
                .fetch_all(&self.pool)
                .await?;
            for r in &rows {
                out.push(variant_from_row(r)?);
            }
        }
        Ok(out)
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn upsert_variants(&self, rows: &[VariantUpsert]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(format!(
            "INSERT INTO public.color_variants ({VARIANT_COLUMNS}) "
        ));
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.id)
                .push_bind(r.color_id)
                .push_bind(&r.brand)
                .push_bind(&r.product_line)
                .push_bind(&r.shade_name)
                .push_bind(&r.shade_code)
                .push_bind(&r.collection)
                .push_bind(&r.finish_override)
                .push_bind(&r.product_url)
                .push_bind(&r.swatch_url)
                .push_bind(&r.source_catalog)
                .push_bind(r.is_active);
        });
        // Conflict target is backed by a NULLS NOT DISTINCT unique constraint so
        // rows without a shade code still collide.
        qb.push(variant_upsert_tail());
        qb.build().persistent(false).execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_color_primary_variant(&self, id: Uuid, variant_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE public.colors SET primary_variant_id = $1, updated_at = now() WHERE id = $2",
        )
        .persistent(false)
        .bind(variant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn trigger_categorization_refresh(&self) -> Result<()> {
        sqlx::query("SELECT public.refresh_hex_categorization()")
            .persistent(false)
            .execute(&self.pool)
            .await
            .context("refresh_hex_categorization() failed")?;
        Ok(())
    }
}
