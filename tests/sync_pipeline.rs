use std::path::{Path, PathBuf};

use nail_catalog_sync::cli::sync::{sync_catalogues, SyncConfig};
use nail_catalog_sync::database_ops::memory_store::MemoryCatalogStore;
use nail_catalog_sync::database_ops::reconcile::RefreshOutcome;
use nail_catalog_sync::SyncError;

const OPI: &str = "\
Brand,ProductType,ShadeCode,ShadeName,Collection,Finish,Texture,ProductURL,SwatchImageURL,ApproxHex
OPI,nail lacquer,NL H02,Chick Flick Cherry,Hollywood,Cream,,https://opi.example/h02,,#ff00aa
OPI,Nail Lacquer,NL H02,Chick Flick Cherry,Hollywood,Cream,,https://opi.example/h02,,ff00aa
OPI,Nail Lacquer,,Nameless,,,,,,not-a-hex
";

const CND: &str = "\
Brand,ProductType,ShadeCode,ShadeName,Collection,Finish,Texture,ProductURL,SwatchImageURL,ApproxHex
CND,shellac,S1,Wildfire,,,Shimmer,https://cnd.example/s1,,#112233
";

const TGB: &str = "\
Brand,Product Type,Collection,Category,Shade Name,Shade Code,ApproxHex,ProductURL,SwatchURL
The GelBottle Inc.,biab,,\"milky, sheer\",Veil,,#ABCDEF,,
The GelBottle Inc.,gelcolor,,\"glitter, shimmery\",Disco,,#FF00AA,,
";

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn config(dir: &Path) -> SyncConfig {
    SyncConfig {
        opi: Some(write(dir, "opi.csv", OPI)),
        cnd: Some(write(dir, "cnd.csv", CND)),
        tgb: Some(write(dir, "tgb.csv", TGB)),
        ..Default::default()
    }
}

#[tokio::test]
async fn three_vendor_exports_sync_into_colors_and_variants() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryCatalogStore::new();
    let report = sync_catalogues(&config(dir.path()), &store).await.unwrap();

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.sources[0].stats.rows_read, 3);
    assert_eq!(report.sources[0].stats.skipped_invalid_hex, 1);
    assert_eq!(report.raw_rows, 5);
    assert_eq!(report.deduplicated_rows, 4);
    assert_eq!(report.reconcile.new_colors, 3);
    assert_eq!(report.reconcile.variants_new, 4);
    assert_eq!(report.reconcile.primary_assigned, 3);
    assert_eq!(report.reconcile.refresh, RefreshOutcome::Succeeded);

    let cherry = store.color_by_hex("#FF00AA").unwrap();
    assert_eq!(cherry.name, "Chick Flick Cherry");
    assert_eq!(cherry.finish.as_deref(), Some("cream"));
    let disco = store
        .variants_of(cherry.id)
        .into_iter()
        .find(|v| v.shade_name == "Disco")
        .unwrap();
    assert_eq!(disco.finish_override.as_deref(), Some("glitter"));
    assert_eq!(disco.product_line, "GelColor");
    assert_eq!(disco.source_catalog, "tgb_full_catalog");

    let veil = store.color_by_hex("#ABCDEF").unwrap();
    assert_eq!(veil.finish.as_deref(), Some("sheer"));
    assert_eq!(store.variants_of(veil.id)[0].product_line, "BIAB");

    let wildfire = store.color_by_hex("#112233").unwrap();
    assert_eq!(wildfire.finish.as_deref(), Some("shimmer"));
    assert_eq!(wildfire.source_priority.as_deref(), Some("cnd_full_uk_catalog"));
}

#[tokio::test]
async fn rerunning_the_same_exports_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = MemoryCatalogStore::new();
    sync_catalogues(&config, &store).await.unwrap();
    let before = store.snapshot();

    let again = sync_catalogues(&config, &store).await.unwrap();
    assert_eq!(again.reconcile.new_colors, 0);
    assert_eq!(again.reconcile.variants_new, 0);
    assert_eq!(again.reconcile.primary_assigned, 0);
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        dry_run: true,
        ..config(dir.path())
    };
    let store = MemoryCatalogStore::new();
    let report = sync_catalogues(&config, &store).await.unwrap();

    assert!(report.reconcile.dry_run);
    assert_eq!(report.reconcile.new_colors, 3);
    assert_eq!(report.reconcile.variants_new, 4);
    assert_eq!(report.reconcile.refresh, RefreshOutcome::Skipped);
    assert_eq!(store.calls().mutations(), 0);
    assert!(store.snapshot().colors.is_empty());
}

#[tokio::test]
async fn missing_catalogue_aborts_before_touching_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        opi: Some(dir.path().join("absent.csv")),
        ..Default::default()
    };
    let store = MemoryCatalogStore::new();
    let err = sync_catalogues(&config, &store).await.unwrap_err();
    assert!(matches!(err, SyncError::MissingInput(_)));
    assert_eq!(store.calls(), Default::default());
}

#[tokio::test]
async fn report_serializes_for_summary_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryCatalogStore::new();
    let report = sync_catalogues(&config(dir.path()), &store).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["reconcile"]["refresh"], "succeeded");
    assert_eq!(json["sources"][2]["source"], "tgb_full_catalog");
    assert_eq!(json["sources"][0]["skipped_invalid_hex"], 1);
}
