//! Five-phase reconciliation of deduplicated catalogue records against the
//! `colors` / `color_variants` tables.
//!
//! Phases run strictly in order, one request in flight at a time:
//!
//! 1. existence check by hex
//! 2. insert colours for unseen hexes
//! 3. fill empty `brand` / `finish` / `source_priority` on existing colours
//! 4. upsert every variant, reusing identities by natural key
//! 5. set `primary_variant_id` where unset (or always, in overwrite mode)
//!
//! Every mutation is safe to re-apply, so an interrupted run is recovered by
//! running again over the same input. Dry-run walks the same decisions with
//! provisional identities and issues reads only.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{group_by_hex, VariantKey, VariantRecord};
use crate::database_ops::store::{
    CatalogStore, Color, ColorInsert, ColorPatch, VariantUpsert, LOOKUP_CHUNK,
    PROVISIONAL_CATEGORY,
};
use crate::error::{Phase, SyncError};
use crate::normalization::Finish;

pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Rows per batched insert / upsert.
    pub batch_size: usize,
    pub dry_run: bool,
    /// Replace an existing `primary_variant_id` with this run's candidate.
    pub overwrite_primary: bool,
    /// Call the categorization procedure after a successful run.
    pub refresh_categories: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            overwrite_primary: false,
            refresh_categories: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    #[default]
    Skipped,
    Succeeded,
    Failed,
}

/// What a run did (or, in dry-run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub dry_run: bool,
    pub records: usize,
    pub distinct_hexes: usize,
    pub existing_colors: usize,
    pub new_colors: usize,
    pub colors_patched: usize,
    pub variants_upserted: usize,
    pub variants_new: usize,
    pub primary_assigned: usize,
    pub refresh: RefreshOutcome,
}

/// Phase 4 output: upsert payload plus the first variant seen per colour.
#[derive(Debug, Default)]
struct VariantPlan {
    rows: Vec<VariantUpsert>,
    new_count: usize,
    primary_candidates: IndexMap<Uuid, Uuid>,
}

pub struct Reconciler<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    options: ReconcileOptions,
}

impl<'a, S: CatalogStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, mut options: ReconcileOptions) -> Self {
        options.batch_size = options.batch_size.max(1);
        Self { store, options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Reconcile deduplicated records. Store failures abort with the phase
    /// they occurred in; only the categorization trigger is best-effort.
    pub async fn run(&self, records: &[VariantRecord]) -> Result<ReconcileSummary, SyncError> {
        let dry_run = self.options.dry_run;
        let mut summary = ReconcileSummary {
            dry_run,
            records: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            warn!("no records found; nothing to reconcile");
            return Ok(summary);
        }

        let groups = group_by_hex(records);
        summary.distinct_hexes = groups.len();

        // Phase 1
        let hexes: Vec<String> = groups.keys().cloned().collect();
        let existing = self.existing_colors(&hexes).await?;
        let missing: Vec<&String> = hexes.iter().filter(|h| !existing.contains_key(*h)).collect();
        summary.existing_colors = existing.len();
        summary.new_colors = missing.len();
        info!(existing = existing.len(), new = missing.len(), "color existence check");

        // Phase 2
        let inserts: Vec<ColorInsert> = missing
            .iter()
            .filter_map(|hex| groups.get(*hex).and_then(|g| g.first()))
            .map(new_color)
            .collect();
        let created = self.insert_colors(&inserts).await?;

        // Phase 3
        let mut colors: IndexMap<String, Color> = IndexMap::with_capacity(groups.len());
        let mut existing = existing;
        for hex in &hexes {
            if let Some(color) = existing.shift_remove(hex).or_else(|| created.get(hex).cloned()) {
                colors.insert(hex.clone(), color);
            }
        }
        summary.colors_patched = self.patch_colors(&mut colors, &groups, &created).await?;

        // Phase 4
        let plan = self.plan_variants(&colors, &groups, &created).await?;
        summary.variants_upserted = plan.rows.len();
        summary.variants_new = plan.new_count;
        self.upsert_variants(&plan.rows).await?;

        // Phase 5
        summary.primary_assigned = self
            .assign_primary_variants(&colors, &plan.primary_candidates)
            .await?;

        info!(
            variants = summary.variants_upserted,
            colors = summary.distinct_hexes,
            new_variants = summary.variants_new,
            dry_run,
            "variant ingest summary"
        );

        summary.refresh = self.refresh_categories().await;
        Ok(summary)
    }

    async fn existing_colors(
        &self,
        hexes: &[String],
    ) -> Result<IndexMap<String, Color>, SyncError> {
        let mut sorted: Vec<String> = hexes.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut existing: HashMap<String, Color> = HashMap::with_capacity(sorted.len());
        for (batch, chunk) in sorted.chunks(LOOKUP_CHUNK).enumerate() {
            debug!(batch, keys = chunk.len(), "looking up colors by hex");
            let found = self
                .store
                .select_colors_by_hex(chunk)
                .await
                .map_err(SyncError::store(Phase::ExistenceCheck))?;
            for color in found {
                existing.insert(color.hex_code.clone(), color);
            }
        }
        // Keep input order so later phases walk colours deterministically.
        Ok(hexes
            .iter()
            .filter_map(|hex| existing.remove(hex).map(|c| (hex.clone(), c)))
            .collect())
    }

    async fn insert_colors(
        &self,
        inserts: &[ColorInsert],
    ) -> Result<HashMap<String, Color>, SyncError> {
        let mut created: HashMap<String, Color> = HashMap::with_capacity(inserts.len());
        if self.options.dry_run {
            info!(count = inserts.len(), "dry-run: would insert new colors");
            for row in inserts {
                created.insert(row.hex_code.clone(), Color::from(row));
            }
            return Ok(created);
        }
        for (batch, chunk) in inserts.chunks(self.options.batch_size).enumerate() {
            debug!(batch, rows = chunk.len(), "inserting colors");
            let stored = self
                .store
                .insert_colors(chunk)
                .await
                .map_err(SyncError::store(Phase::InsertColors))?;
            // Stores that return nothing still created exactly what was sent.
            if stored.is_empty() {
                created.extend(chunk.iter().map(|row| (row.hex_code.clone(), Color::from(row))));
            } else {
                created.extend(stored.into_iter().map(|c| (c.hex_code.clone(), c)));
            }
        }
        info!(count = created.len(), "inserted new color rows");
        Ok(created)
    }

    async fn patch_colors(
        &self,
        colors: &mut IndexMap<String, Color>,
        groups: &IndexMap<String, Vec<VariantRecord>>,
        created: &HashMap<String, Color>,
    ) -> Result<usize, SyncError> {
        let mut patched = 0usize;
        for (hex, color) in colors.iter_mut() {
            if created.contains_key(hex) {
                continue;
            }
            let Some(representative) = groups.get(hex).and_then(|g| g.first()) else {
                continue;
            };
            let patch = sparse_patch(color, representative);
            if patch.is_empty() {
                continue;
            }
            patched += 1;
            if !self.options.dry_run {
                self.store
                    .update_color(color.id, &patch)
                    .await
                    .map_err(SyncError::store(Phase::PatchColors))?;
            }
            debug!(hex = %hex, ?patch, dry_run = self.options.dry_run, "filled empty color fields");
            patch.apply_to(color);
        }
        if patched > 0 {
            info!(count = patched, dry_run = self.options.dry_run, "patched sparse colors");
        }
        Ok(patched)
    }

    async fn plan_variants(
        &self,
        colors: &IndexMap<String, Color>,
        groups: &IndexMap<String, Vec<VariantRecord>>,
        created: &HashMap<String, Color>,
    ) -> Result<VariantPlan, SyncError> {
        // Only pre-existing colours can already own variants.
        let lookup_ids: Vec<Uuid> = colors
            .iter()
            .filter(|(hex, _)| !created.contains_key(*hex))
            .map(|(_, c)| c.id)
            .collect();
        let mut known: HashMap<(Uuid, VariantKey), Uuid> = HashMap::new();
        for chunk in lookup_ids.chunks(LOOKUP_CHUNK) {
            let variants = self
                .store
                .select_variants_by_color_ids(chunk)
                .await
                .map_err(SyncError::store(Phase::UpsertVariants))?;
            for v in variants {
                known.insert((v.color_id, v.key()), v.id);
            }
        }

        let mut plan = VariantPlan::default();
        for (hex, color) in colors {
            let Some(records) = groups.get(hex) else {
                continue;
            };
            for (index, record) in records.iter().enumerate() {
                let variant_id = match known.get(&(color.id, record.key())) {
                    Some(id) => *id,
                    None => {
                        plan.new_count += 1;
                        Uuid::new_v4()
                    }
                };
                if index == 0 {
                    plan.primary_candidates.insert(color.id, variant_id);
                }
                plan.rows.push(variant_row(variant_id, color, record));
            }
        }
        Ok(plan)
    }

    async fn upsert_variants(&self, rows: &[VariantUpsert]) -> Result<(), SyncError> {
        if self.options.dry_run {
            info!(count = rows.len(), "dry-run: would upsert color_variants");
            return Ok(());
        }
        for (batch, chunk) in rows.chunks(self.options.batch_size).enumerate() {
            debug!(batch, rows = chunk.len(), "upserting color_variants");
            self.store
                .upsert_variants(chunk)
                .await
                .map_err(SyncError::store(Phase::UpsertVariants))?;
        }
        info!(count = rows.len(), "upserted color_variants");
        Ok(())
    }

    async fn assign_primary_variants(
        &self,
        colors: &IndexMap<String, Color>,
        candidates: &IndexMap<Uuid, Uuid>,
    ) -> Result<usize, SyncError> {
        let mut assigned = 0usize;
        for color in colors.values() {
            let Some(&candidate) = candidates.get(&color.id) else {
                continue;
            };
            if !needs_primary(color.primary_variant_id, candidate, self.options.overwrite_primary) {
                continue;
            }
            assigned += 1;
            if self.options.dry_run {
                continue;
            }
            self.store
                .update_color_primary_variant(color.id, candidate)
                .await
                .map_err(SyncError::store(Phase::AssignPrimary))?;
        }
        if assigned > 0 {
            info!(count = assigned, dry_run = self.options.dry_run, "assigned primary variants");
        }
        Ok(assigned)
    }

    async fn refresh_categories(&self) -> RefreshOutcome {
        if self.options.dry_run {
            info!("dry-run: skipping refresh_hex_categorization() call");
            return RefreshOutcome::Skipped;
        }
        if !self.options.refresh_categories {
            return RefreshOutcome::Skipped;
        }
        match self.store.trigger_categorization_refresh().await {
            Ok(()) => {
                info!("hex categorization refreshed");
                RefreshOutcome::Succeeded
            }
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "categorization refresh failed; re-run it manually"
                );
                RefreshOutcome::Failed
            }
        }
    }
}

/// New colour row seeded from the first record seen for its hex.
fn new_color(representative: &VariantRecord) -> ColorInsert {
    ColorInsert {
        id: Uuid::new_v4(),
        hex_code: representative.hex_code.clone(),
        name: representative.shade_name.clone(),
        brand: representative.brand.clone(),
        finish: representative.finish.to_string(),
        category: PROVISIONAL_CATEGORY.to_string(),
        trending_score: 0,
        season: Vec::new(),
        mood_tags: Vec::new(),
        source_priority: representative.source_catalog.to_string(),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Fields of `color` that are empty and can be filled from `representative`.
/// Populated fields are never overwritten.
fn sparse_patch(color: &Color, representative: &VariantRecord) -> ColorPatch {
    ColorPatch {
        brand: is_blank(&color.brand).then(|| representative.brand.clone()),
        finish: is_blank(&color.finish).then(|| representative.finish.to_string()),
        source_priority: is_blank(&color.source_priority)
            .then(|| representative.source_catalog.to_string()),
    }
}

/// A colour finish that is missing or outside the vocabulary never matches.
fn finish_differs(color: &Color, finish: Finish) -> bool {
    color
        .finish
        .as_deref()
        .and_then(|stored| stored.trim().parse::<Finish>().ok())
        != Some(finish)
}

fn variant_row(id: Uuid, color: &Color, record: &VariantRecord) -> VariantUpsert {
    VariantUpsert {
        id,
        color_id: color.id,
        brand: record.brand.clone(),
        product_line: record.product_line.clone(),
        shade_name: record.shade_name.clone(),
        shade_code: record.shade_code.clone(),
        collection: record.collection.clone(),
        finish_override: finish_differs(color, record.finish)
            .then(|| record.finish.to_string()),
        product_url: record.product_url.clone(),
        swatch_url: record.swatch_url.clone(),
        source_catalog: record.source_catalog.to_string(),
        is_active: true,
    }
}

/// Primary assignment is monotonic unless overwrite is requested; a write
/// that would store the same id is skipped either way.
fn needs_primary(current: Option<Uuid>, candidate: Uuid, overwrite: bool) -> bool {
    match current {
        None => true,
        Some(existing) => overwrite && existing != candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceCatalog;
    use crate::database_ops::memory_store::MemoryCatalogStore;
    use crate::normalization::Finish;

    fn record(hex: &str, shade: &str, code: Option<&str>, finish: Finish) -> VariantRecord {
        VariantRecord {
            hex_code: hex.to_string(),
            brand: "OPI".to_string(),
            product_line: "Nail Lacquer".to_string(),
            shade_name: shade.to_string(),
            shade_code: code.map(str::to_string),
            collection: None,
            finish,
            product_url: None,
            swatch_url: None,
            source_catalog: SourceCatalog::Opi,
        }
    }

    fn bare_color(hex: &str) -> Color {
        Color {
            id: Uuid::new_v4(),
            hex_code: hex.to_string(),
            name: "Legacy".to_string(),
            brand: None,
            finish: Some(" ".to_string()),
            category: Some("reds".to_string()),
            primary_variant_id: None,
            source_priority: Some("manual".to_string()),
        }
    }

    #[test]
    fn sparse_patch_fills_only_empty_fields() {
        let color = bare_color("#AA0000");
        let rec = record("#AA0000", "Red", None, Finish::Matte);
        let patch = sparse_patch(&color, &rec);
        assert_eq!(patch.brand.as_deref(), Some("OPI"));
        assert_eq!(patch.finish.as_deref(), Some("matte"));
        assert_eq!(patch.source_priority, None);
    }

    #[test]
    fn finish_override_only_on_disagreement() {
        let mut color = bare_color("#AA0000");
        color.finish = Some("glossy".into());
        let glossy = record("#AA0000", "A", None, Finish::Glossy);
        let chrome = record("#AA0000", "B", None, Finish::Chrome);
        let same = variant_row(Uuid::new_v4(), &color, &glossy);
        let differs = variant_row(Uuid::new_v4(), &color, &chrome);
        assert_eq!(same.finish_override, None);
        assert_eq!(differs.finish_override.as_deref(), Some("chrome"));
    }

    #[test]
    fn stored_finish_is_parsed_before_comparing() {
        let mut color = bare_color("#AA0000");
        color.finish = Some(" matte ".into());
        let rec = record("#AA0000", "A", None, Finish::Matte);
        assert_eq!(variant_row(Uuid::new_v4(), &color, &rec).finish_override, None);

        color.finish = Some("satin".into());
        let row = variant_row(Uuid::new_v4(), &color, &rec);
        assert_eq!(row.finish_override.as_deref(), Some("matte"));
    }

    #[test]
    fn primary_rules() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(needs_primary(None, a, false));
        assert!(!needs_primary(Some(b), a, false));
        assert!(needs_primary(Some(b), a, true));
        assert!(!needs_primary(Some(a), a, true));
    }

    #[tokio::test]
    async fn first_record_represents_a_new_color() {
        let store = MemoryCatalogStore::new();
        let records = vec![
            record("#FF00AA", "Big Apple Red", Some("A"), Finish::Cream),
            record("#FF00AA", "Big Apple Red", None, Finish::Glitter),
        ];
        let summary = Reconciler::new(&store, ReconcileOptions::default())
            .run(&records)
            .await
            .unwrap();
        assert_eq!(summary.new_colors, 1);
        assert_eq!(summary.variants_new, 2);
        assert_eq!(summary.primary_assigned, 1);
        assert_eq!(summary.refresh, RefreshOutcome::Succeeded);

        let color = store.color_by_hex("#FF00AA").unwrap();
        assert_eq!(color.name, "Big Apple Red");
        assert_eq!(color.finish.as_deref(), Some("cream"));
        assert_eq!(color.category.as_deref(), Some(PROVISIONAL_CATEGORY));
        assert_eq!(color.source_priority.as_deref(), Some("opi_full_uk_catalog"));

        let variants = store.variants_of(color.id);
        let primary = variants
            .iter()
            .find(|v| Some(v.id) == color.primary_variant_id)
            .unwrap();
        assert_eq!(primary.shade_code.as_deref(), Some("A"));
        assert_eq!(primary.finish_override, None);
        let other = variants.iter().find(|v| v.shade_code.is_none()).unwrap();
        assert_eq!(other.finish_override.as_deref(), Some("glitter"));
    }

    #[tokio::test]
    async fn patched_finish_feeds_the_override_comparison() {
        let store = MemoryCatalogStore::new();
        let legacy = bare_color("#AA0000");
        store.seed_color(legacy.clone());
        let records = vec![record("#AA0000", "Red", None, Finish::Matte)];
        let summary = Reconciler::new(&store, ReconcileOptions::default())
            .run(&records)
            .await
            .unwrap();
        assert_eq!(summary.existing_colors, 1);
        assert_eq!(summary.colors_patched, 1);

        let color = store.color_by_hex("#AA0000").unwrap();
        assert_eq!(color.brand.as_deref(), Some("OPI"));
        assert_eq!(color.finish.as_deref(), Some("matte"));
        assert_eq!(color.source_priority.as_deref(), Some("manual"));
        assert_eq!(color.name, "Legacy");
        assert_eq!(store.variants_of(legacy.id)[0].finish_override, None);
    }

    #[tokio::test]
    async fn batches_respect_batch_size() {
        let store = MemoryCatalogStore::new();
        let records: Vec<VariantRecord> = (0..7)
            .map(|i| record(&format!("#00000{i}"), &format!("S{i}"), None, Finish::Glossy))
            .collect();
        let options = ReconcileOptions {
            batch_size: 3,
            ..Default::default()
        };
        Reconciler::new(&store, options).run(&records).await.unwrap();
        let calls = store.calls();
        assert_eq!(calls.color_inserts, 3);
        assert_eq!(calls.variant_upserts, 3);
        assert_eq!(calls.primary_updates, 7);
        assert_eq!(calls.color_lookups, 1);
    }

    #[tokio::test]
    async fn lookups_are_sorted_and_chunked() {
        let store = MemoryCatalogStore::new();
        // Descending input so chunk order can only come from sorting.
        let records: Vec<VariantRecord> = (0..450)
            .rev()
            .map(|i| record(&format!("#{i:06X}"), &format!("S{i}"), None, Finish::Glossy))
            .collect();
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());

        let first = reconciler.run(&records).await.unwrap();
        assert_eq!(first.new_colors, 450);
        let calls = store.calls();
        assert_eq!(calls.color_lookups, 3);
        assert_eq!(calls.variant_lookups, 0);
        assert_eq!(calls.color_inserts, 3);
        assert_eq!(calls.variant_upserts, 3);
        assert_eq!(calls.primary_updates, 450);

        let batches = store.hex_lookup_batches();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![LOOKUP_CHUNK, LOOKUP_CHUNK, 50]);
        let flat: Vec<String> = batches.concat();
        let mut sorted = flat.clone();
        sorted.sort();
        assert_eq!(flat, sorted);
        assert_eq!(flat[0], "#000000");

        store.reset_calls();
        let second = reconciler.run(&records).await.unwrap();
        assert_eq!(second.existing_colors, 450);
        assert_eq!(second.variants_new, 0);
        let calls = store.calls();
        assert_eq!(calls.color_lookups, 3);
        assert_eq!(calls.variant_lookups, 3);
        assert_eq!(calls.color_inserts, 0);
        assert_eq!(calls.primary_updates, 0);
    }

    #[tokio::test]
    async fn empty_input_touches_nothing() {
        let store = MemoryCatalogStore::new();
        let summary = Reconciler::new(&store, ReconcileOptions::default())
            .run(&[])
            .await
            .unwrap();
        assert_eq!(summary, ReconcileSummary::default());
        assert_eq!(store.calls(), Default::default());
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let store = MemoryCatalogStore::new();
        let options = ReconcileOptions {
            batch_size: 0,
            ..Default::default()
        };
        let reconciler = Reconciler::new(&store, options);
        assert_eq!(reconciler.options().batch_size, 1);
        reconciler
            .run(&[record("#000001", "S", None, Finish::Glossy)])
            .await
            .unwrap();
        assert_eq!(store.calls().color_inserts, 1);
    }
}
