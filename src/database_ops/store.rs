use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::VariantKey;

/// Keys per point-lookup request; gateways chunk larger sets themselves.
pub const LOOKUP_CHUNK: usize = 200;

/// Columns forming the `color_variants` conflict target.
pub const VARIANT_CONFLICT_KEY: [&str; 5] =
    ["color_id", "brand", "product_line", "shade_name", "shade_code"];

/// Provisional category for freshly inserted colours; the downstream
/// categorization routine replaces it.
pub const PROVISIONAL_CATEGORY: &str = "trending";

/// Persisted canonical colour (`public.colors`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: Uuid,
    pub hex_code: String,
    pub name: String,
    pub brand: Option<String>,
    pub finish: Option<String>,
    pub category: Option<String>,
    pub primary_variant_id: Option<Uuid>,
    pub source_priority: Option<String>,
}

/// New colour row. The caller mints `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorInsert {
    pub id: Uuid,
    pub hex_code: String,
    pub name: String,
    pub brand: String,
    pub finish: String,
    pub category: String,
    pub trending_score: i32,
    pub season: Vec<String>,
    pub mood_tags: Vec<String>,
    pub source_priority: String,
}

impl From<&ColorInsert> for Color {
    fn from(row: &ColorInsert) -> Self {
        Color {
            id: row.id,
            hex_code: row.hex_code.clone(),
            name: row.name.clone(),
            brand: Some(row.brand.clone()),
            finish: Some(row.finish.clone()),
            category: Some(row.category.clone()),
            primary_variant_id: None,
            source_priority: Some(row.source_priority.clone()),
        }
    }
}

/// Sparse colour update; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColorPatch {
    pub brand: Option<String>,
    pub finish: Option<String>,
    pub source_priority: Option<String>,
}

impl ColorPatch {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.finish.is_none() && self.source_priority.is_none()
    }

    /// Apply to an in-memory copy of the row.
    pub fn apply_to(&self, color: &mut Color) {
        if let Some(brand) = &self.brand {
            color.brand = Some(brand.clone());
        }
        if let Some(finish) = &self.finish {
            color.finish = Some(finish.clone());
        }
        if let Some(source) = &self.source_priority {
            color.source_priority = Some(source.clone());
        }
    }
}

/// Persisted brand listing (`public.color_variants`), also the upsert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub color_id: Uuid,
    pub brand: String,
    pub product_line: String,
    pub shade_name: String,
    pub shade_code: Option<String>,
    pub collection: Option<String>,
    pub finish_override: Option<String>,
    pub product_url: Option<String>,
    pub swatch_url: Option<String>,
    pub source_catalog: String,
    pub is_active: bool,
}

pub type VariantUpsert = Variant;

impl Variant {
    /// Natural key within the owning colour.
    pub fn key(&self) -> VariantKey {
        VariantKey {
            brand: self.brand.clone(),
            product_line: self.product_line.clone(),
            shade_name: self.shade_name.clone(),
            shade_code: self.shade_code.clone(),
        }
    }
}

/// Contract the reconciliation engine needs from the backing store.
///
/// Every call is its own unit of work; nothing spans calls.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Point lookup by hex. Must accept arbitrarily many keys.
    async fn select_colors_by_hex(&self, hexes: &[String]) -> Result<Vec<Color>>;

    /// Insert new colours, returning the stored rows.
    async fn insert_colors(&self, rows: &[ColorInsert]) -> Result<Vec<Color>>;

    async fn update_color(&self, id: Uuid, patch: &ColorPatch) -> Result<()>;

    async fn select_variants_by_color_ids(&self, ids: &[Uuid]) -> Result<Vec<Variant>>;

    /// True upsert on [`VARIANT_CONFLICT_KEY`]: matches update in place,
    /// everything else is inserted.
    async fn upsert_variants(&self, rows: &[VariantUpsert]) -> Result<()>;

    async fn update_color_primary_variant(&self, id: Uuid, variant_id: Uuid) -> Result<()>;

    /// Fire the downstream hex categorization procedure.
    async fn trigger_categorization_refresh(&self) -> Result<()>;
}
