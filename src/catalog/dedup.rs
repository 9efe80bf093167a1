use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::info;

use crate::catalog::record::{VariantKey, VariantRecord};

/// Dedup identity: the variant's natural key plus its measured hex, so two
/// listings that share a display name but differ in colour both survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    variant: VariantKey,
    hex_code: String,
}

/// Collapse records to one per `(brand, product_line, shade_name, shade_code, hex)`.
///
/// First occurrence wins and output keeps first-occurrence order; later
/// duplicates are dropped whole, no fields are merged.
pub fn deduplicate(records: Vec<VariantRecord>) -> Vec<VariantRecord> {
    let input = records.len();
    let mut seen: IndexMap<DedupKey, VariantRecord> = IndexMap::with_capacity(input);
    for record in records {
        let key = DedupKey {
            variant: record.key(),
            hex_code: record.hex_code.clone(),
        };
        if let Entry::Vacant(slot) = seen.entry(key) {
            slot.insert(record);
        }
    }
    let deduped: Vec<VariantRecord> = seen.into_values().collect();
    info!(input, output = deduped.len(), "deduplicated variant rows");
    deduped
}

/// Group records by hex, preserving first-seen hex order and record order
/// within each group. The first record of a group represents the colour.
pub fn group_by_hex(records: &[VariantRecord]) -> IndexMap<String, Vec<VariantRecord>> {
    let mut grouped: IndexMap<String, Vec<VariantRecord>> = IndexMap::new();
    for record in records {
        grouped
            .entry(record.hex_code.clone())
            .or_default()
            .push(record.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record::SourceCatalog;
    use crate::normalization::Finish;
    use proptest::prelude::*;

    fn record(hex: &str, shade: &str, code: Option<&str>, source: SourceCatalog) -> VariantRecord {
        VariantRecord {
            hex_code: hex.to_string(),
            brand: "OPI".to_string(),
            product_line: "Nail Lacquer".to_string(),
            shade_name: shade.to_string(),
            shade_code: code.map(str::to_string),
            collection: None,
            finish: Finish::Glossy,
            product_url: None,
            swatch_url: None,
            source_catalog: source,
        }
    }

    #[test]
    fn first_seen_wins_and_order_is_kept() {
        let a = record("#000001", "Alpha", Some("A"), SourceCatalog::Opi);
        let b = record("#000002", "Beta", None, SourceCatalog::Opi);
        let mut a_dup = a.clone();
        a_dup.source_catalog = SourceCatalog::Cnd;
        a_dup.collection = Some("Later".into());
        let c = record("#000003", "Gamma", None, SourceCatalog::Opi);

        let out = deduplicate(vec![a.clone(), b.clone(), a_dup, c.clone()]);
        assert_eq!(out, vec![a, b, c]);
    }

    #[test]
    fn hex_and_shade_code_are_part_of_the_key() {
        let coded = record("#FF00AA", "Big Apple Red", Some("A"), SourceCatalog::Opi);
        let uncoded = record("#FF00AA", "Big Apple Red", None, SourceCatalog::Opi);
        let other_hex = record("#FF00AB", "Big Apple Red", Some("A"), SourceCatalog::Opi);
        let out = deduplicate(vec![coded, uncoded, other_hex]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let records = vec![
            record("#000002", "Two", None, SourceCatalog::Opi),
            record("#000001", "One", None, SourceCatalog::Opi),
            record("#000002", "Two bis", None, SourceCatalog::Cnd),
        ];
        let grouped = group_by_hex(&records);
        let hexes: Vec<&str> = grouped.keys().map(String::as_str).collect();
        assert_eq!(hexes, vec!["#000002", "#000001"]);
        assert_eq!(grouped["#000002"][0].shade_name, "Two");
        assert_eq!(grouped["#000002"][1].shade_name, "Two bis");
    }

    proptest! {
        #[test]
        fn deduplicate_is_idempotent(
            picks in prop::collection::vec((0u8..4, 0u8..3, any::<bool>()), 0..24)
        ) {
            let records: Vec<VariantRecord> = picks
                .into_iter()
                .map(|(hex, shade, coded)| {
                    record(
                        &format!("#00000{hex}"),
                        &format!("Shade {shade}"),
                        coded.then_some("X"),
                        SourceCatalog::Opi,
                    )
                })
                .collect();
            let once = deduplicate(records);
            let twice = deduplicate(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
