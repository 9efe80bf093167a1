//! In-process [`CatalogStore`] with the same conflict semantics as the
//! Postgres tables: unique `hex_code`, unique variant natural key per colour,
//! and primary variants that must belong to their colour.
//!
//! Used by the test suites and for rehearsing a sync against a captured
//! snapshot without touching the hosted database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::VariantKey;
use crate::database_ops::store::{
    CatalogStore, Color, ColorInsert, ColorPatch, Variant, VariantUpsert,
};

/// Counts of calls received, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    pub color_lookups: usize,
    pub color_inserts: usize,
    pub color_updates: usize,
    pub variant_lookups: usize,
    pub variant_upserts: usize,
    pub primary_updates: usize,
    pub refreshes: usize,
}

impl CallCounts {
    pub fn mutations(&self) -> usize {
        self.color_inserts + self.color_updates + self.variant_upserts + self.primary_updates
    }
}

/// Ordered, comparable dump of the store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub colors: Vec<Color>,
    pub variants: Vec<Variant>,
}

#[derive(Default)]
struct State {
    colors: IndexMap<Uuid, Color>,
    color_by_hex: HashMap<String, Uuid>,
    variants: IndexMap<Uuid, Variant>,
    variant_by_key: HashMap<(Uuid, VariantKey), Uuid>,
    calls: CallCounts,
    hex_batches: Vec<Vec<String>>,
    fail_refresh: bool,
    mutation_budget: Option<usize>,
}

impl State {
    // Simulates the process dying between batches: once the budget is spent
    // every further mutating call fails without applying anything.
    fn spend_mutation(&mut self) -> Result<()> {
        match self.mutation_budget.as_mut() {
            Some(0) => Err(anyhow!("simulated store outage")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCatalogStore {
    state: Mutex<State>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves consistent data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `trigger_categorization_refresh` fail from now on.
    pub fn fail_refresh(&self, fail: bool) {
        self.lock().fail_refresh = fail;
    }

    /// Allow only `n` more mutating calls; `None` lifts the limit.
    pub fn limit_mutations(&self, n: Option<usize>) {
        self.lock().mutation_budget = n;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    pub fn reset_calls(&self) {
        let mut state = self.lock();
        state.calls = CallCounts::default();
        state.hex_batches.clear();
    }

    /// Keys of every `select_colors_by_hex` call, in call order.
    pub fn hex_lookup_batches(&self) -> Vec<Vec<String>> {
        self.lock().hex_batches.clone()
    }

    pub fn color_by_hex(&self, hex: &str) -> Option<Color> {
        let state = self.lock();
        let id = state.color_by_hex.get(hex)?;
        state.colors.get(id).cloned()
    }

    pub fn variants_of(&self, color_id: Uuid) -> Vec<Variant> {
        self.lock()
            .variants
            .values()
            .filter(|v| v.color_id == color_id)
            .cloned()
            .collect()
    }

    /// Seed a colour row directly, bypassing call accounting.
    pub fn seed_color(&self, color: Color) {
        let mut state = self.lock();
        state.color_by_hex.insert(color.hex_code.clone(), color.id);
        state.colors.insert(color.id, color);
    }

    /// Contents sorted by hex and natural key so two stores that converged to
    /// the same data compare equal regardless of insertion order.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        let mut colors: Vec<Color> = state.colors.values().cloned().collect();
        colors.sort_by(|a, b| a.hex_code.cmp(&b.hex_code));
        let hex_of: HashMap<Uuid, &str> = state
            .colors
            .values()
            .map(|c| (c.id, c.hex_code.as_str()))
            .collect();
        let mut variants: Vec<Variant> = state.variants.values().cloned().collect();
        variants.sort_by(|a, b| {
            (hex_of.get(&a.color_id), a.key()).cmp(&(hex_of.get(&b.color_id), b.key()))
        });
        StoreSnapshot { colors, variants }
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn select_colors_by_hex(&self, hexes: &[String]) -> Result<Vec<Color>> {
        let mut state = self.lock();
        state.calls.color_lookups += 1;
        state.hex_batches.push(hexes.to_vec());
        Ok(hexes
            .iter()
            .filter_map(|hex| state.color_by_hex.get(hex))
            .filter_map(|id| state.colors.get(id))
            .cloned()
            .collect())
    }

    async fn insert_colors(&self, rows: &[ColorInsert]) -> Result<Vec<Color>> {
        let mut state = self.lock();
        state.spend_mutation()?;
        state.calls.color_inserts += 1;
        // Validate the whole statement first; a violation applies nothing.
        let mut batch_hexes = HashMap::new();
        for row in rows {
            if state.color_by_hex.contains_key(&row.hex_code)
                || batch_hexes.insert(row.hex_code.as_str(), row.id).is_some()
            {
                bail!(
                    "duplicate key value violates unique constraint colors_hex_code_key ({})",
                    row.hex_code
                );
            }
            if state.colors.contains_key(&row.id) {
                bail!("duplicate key value violates unique constraint colors_pkey ({})", row.id);
            }
        }
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let color = Color::from(row);
            state.color_by_hex.insert(color.hex_code.clone(), color.id);
            state.colors.insert(color.id, color.clone());
            out.push(color);
        }
        Ok(out)
    }

    async fn update_color(&self, id: Uuid, patch: &ColorPatch) -> Result<()> {
        let mut state = self.lock();
        state.spend_mutation()?;
        state.calls.color_updates += 1;
        if let Some(color) = state.colors.get_mut(&id) {
            patch.apply_to(color);
        }
        Ok(())
    }

    async fn select_variants_by_color_ids(&self, ids: &[Uuid]) -> Result<Vec<Variant>> {
        let mut state = self.lock();
        state.calls.variant_lookups += 1;
        Ok(state
            .variants
            .values()
            .filter(|v| ids.contains(&v.color_id))
            .cloned()
            .collect())
    }

    async fn upsert_variants(&self, rows: &[VariantUpsert]) -> Result<()> {
        let mut state = self.lock();
        state.spend_mutation()?;
        state.calls.variant_upserts += 1;
        let mut batch_keys = HashMap::new();
        for row in rows {
            if !state.colors.contains_key(&row.color_id) {
                bail!("insert on color_variants violates foreign key (color_id {})", row.color_id);
            }
            let key = (row.color_id, row.key());
            if batch_keys.insert(key.clone(), row.id).is_some() {
                bail!("ON CONFLICT DO UPDATE command cannot affect row a second time");
            }
            let owner = state.variant_by_key.get(&key);
            if owner.is_none() && state.variants.contains_key(&row.id) {
                bail!(
                    "duplicate key value violates unique constraint color_variants_pkey ({})",
                    row.id
                );
            }
        }
        for row in rows {
            let key = (row.color_id, row.key());
            match state.variant_by_key.get(&key).copied() {
                Some(existing_id) => {
                    if let Some(existing) = state.variants.get_mut(&existing_id) {
                        existing.collection = row.collection.clone();
                        existing.finish_override = row.finish_override.clone();
                        existing.product_url = row.product_url.clone();
                        existing.swatch_url = row.swatch_url.clone();
                        existing.source_catalog = row.source_catalog.clone();
                        existing.is_active = row.is_active;
                    }
                }
                None => {
                    state.variant_by_key.insert(key, row.id);
                    state.variants.insert(row.id, row.clone());
                }
            }
        }
        Ok(())
    }

    async fn update_color_primary_variant(&self, id: Uuid, variant_id: Uuid) -> Result<()> {
        let mut state = self.lock();
        state.spend_mutation()?;
        state.calls.primary_updates += 1;
        match state.variants.get(&variant_id) {
            Some(v) if v.color_id == id => {}
            Some(v) => bail!("variant {variant_id} belongs to color {}, not {id}", v.color_id),
            None => bail!("primary_variant_id references missing variant {variant_id}"),
        }
        if let Some(color) = state.colors.get_mut(&id) {
            color.primary_variant_id = Some(variant_id);
        }
        Ok(())
    }

    async fn trigger_categorization_refresh(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.refreshes += 1;
        if state.fail_refresh {
            bail!("function public.refresh_hex_categorization() does not exist");
        }
        Ok(())
    }
}
