#![allow(dead_code)]

use std::collections::HashMap;

use nail_catalog_sync::catalog::{SourceCatalog, VariantRecord};
use nail_catalog_sync::database_ops::memory_store::MemoryCatalogStore;
use nail_catalog_sync::normalization::Finish;

pub fn record(
    hex: &str,
    brand: &str,
    shade: &str,
    code: Option<&str>,
    finish: Finish,
    source: SourceCatalog,
) -> VariantRecord {
    VariantRecord {
        hex_code: hex.to_string(),
        brand: brand.to_string(),
        product_line: "Nail Lacquer".to_string(),
        shade_name: shade.to_string(),
        shade_code: code.map(str::to_string),
        collection: Some("Core".to_string()),
        finish,
        product_url: Some(format!("https://shop.example/{shade}")),
        swatch_url: None,
        source_catalog: source,
    }
}

/// A catalogue mix with shared hexes across brands, coded and uncoded
/// listings, and finishes that disagree within a colour.
pub fn mixed_catalogue() -> Vec<VariantRecord> {
    use Finish::*;
    use SourceCatalog::*;
    vec![
        record("#FF00AA", "OPI", "Big Apple Red", Some("A"), Cream, Opi),
        record("#FF00AA", "OPI", "Big Apple Red", None, Cream, Opi),
        record("#112233", "OPI", "Midnight", Some("NL1"), Glossy, Opi),
        record("#445566", "CND", "Wildfire", Some("S1"), Shimmer, Cnd),
        record("#112233", "CND", "Night Owl", Some("S2"), Matte, Cnd),
        record("#778899", "The GelBottle Inc.", "Disco", None, Glitter, GelBottle),
        record("#FF00AA", "The GelBottle Inc.", "Cherry", None, Chrome, GelBottle),
        record("#ABCDEF", "The GelBottle Inc.", "Veil", None, Sheer, GelBottle),
    ]
}

/// Store contents with generated identities replaced by natural keys, so two
/// stores built through different run sequences can be compared.
#[derive(Debug, PartialEq, Eq)]
pub struct Canonical {
    pub colors: Vec<CanonicalColor>,
    pub variants: Vec<CanonicalVariant>,
}

/// `(hex, name, brand, finish, source_priority, primary variant label)`
pub type CanonicalColor = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// `(hex, brand, shade_name, source_catalog, shade_code, finish_override, collection, is_active)`
pub type CanonicalVariant = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
);

pub fn canonical(store: &MemoryCatalogStore) -> Canonical {
    let snapshot = store.snapshot();
    let hex_of: HashMap<_, _> = snapshot
        .colors
        .iter()
        .map(|c| (c.id, c.hex_code.clone()))
        .collect();
    let shade_of: HashMap<_, _> = snapshot
        .variants
        .iter()
        .map(|v| (v.id, format!("{}|{}|{:?}", v.brand, v.shade_name, v.shade_code)))
        .collect();
    Canonical {
        colors: snapshot
            .colors
            .iter()
            .map(|c| {
                (
                    c.hex_code.clone(),
                    c.name.clone(),
                    c.brand.clone(),
                    c.finish.clone(),
                    c.source_priority.clone(),
                    c.primary_variant_id.and_then(|id| shade_of.get(&id).cloned()),
                )
            })
            .collect(),
        variants: snapshot
            .variants
            .iter()
            .map(|v| {
                (
                    hex_of[&v.color_id].clone(),
                    v.brand.clone(),
                    v.shade_name.clone(),
                    v.source_catalog.clone(),
                    v.shade_code.clone(),
                    v.finish_override.clone(),
                    v.collection.clone(),
                    v.is_active,
                )
            })
            .collect(),
    }
}
