use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::record::{non_blank, or_fallback, SourceCatalog, VariantRecord};
use crate::error::{RowRejection, SyncError};
use crate::normalization::finish::normalize_category_finish;
use crate::normalization::{
    clean_collection, normalize_finish, normalize_hex, normalize_product_line,
};

/// Shade name written when the export leaves it blank.
pub const UNNAMED_SHADE: &str = "Unnamed";

/// A vendor CSV row that can be turned into a [`VariantRecord`].
pub trait VendorRow: DeserializeOwned {
    fn into_record(self, source: SourceCatalog) -> Result<VariantRecord, RowRejection>;
}

/// Shopify-style storefront export shared by the OPI and CND scrapers.
#[derive(Debug, Deserialize)]
pub struct StorefrontRow {
    #[serde(rename = "Brand", default)]
    brand: Option<String>,
    #[serde(rename = "ProductType", default)]
    product_type: Option<String>,
    #[serde(rename = "ShadeCode", default)]
    shade_code: Option<String>,
    #[serde(rename = "ShadeName", default)]
    shade_name: Option<String>,
    #[serde(rename = "Collection", default)]
    collection: Option<String>,
    #[serde(rename = "Finish", default)]
    finish: Option<String>,
    #[serde(rename = "Texture", default)]
    texture: Option<String>,
    #[serde(rename = "ProductURL", default)]
    product_url: Option<String>,
    #[serde(rename = "SwatchImageURL", default)]
    swatch_url: Option<String>,
    #[serde(rename = "ApproxHex", default)]
    approx_hex: Option<String>,
}

impl VendorRow for StorefrontRow {
    fn into_record(self, source: SourceCatalog) -> Result<VariantRecord, RowRejection> {
        let raw_hex = self.approx_hex.unwrap_or_default();
        let hex_code = normalize_hex(&raw_hex).ok_or(RowRejection::InvalidHex(raw_hex))?;
        let finish_raw =
            non_blank(self.finish.as_deref()).or_else(|| non_blank(self.texture.as_deref()));
        let brand = or_fallback(self.brand.as_deref(), source.default_brand());
        Ok(VariantRecord {
            hex_code,
            product_line: normalize_product_line(
                self.product_type.as_deref().unwrap_or_default(),
                source.default_brand(),
            ),
            shade_name: or_fallback(self.shade_name.as_deref(), UNNAMED_SHADE),
            shade_code: non_blank(self.shade_code.as_deref()),
            collection: self.collection.as_deref().and_then(clean_collection),
            finish: normalize_finish(finish_raw.as_deref().unwrap_or_default()),
            product_url: non_blank(self.product_url.as_deref()),
            swatch_url: non_blank(self.swatch_url.as_deref()),
            source_catalog: source,
            brand,
        })
    }
}

/// The GelBottle search-API export; header names carry spaces and finish
/// lives in a free-text `Category` column.
#[derive(Debug, Deserialize)]
pub struct GelBottleRow {
    #[serde(rename = "Brand", default)]
    brand: Option<String>,
    #[serde(rename = "Product Type", default)]
    product_type: Option<String>,
    #[serde(rename = "Collection", default)]
    collection: Option<String>,
    #[serde(rename = "Category", default)]
    category: Option<String>,
    #[serde(rename = "Shade Name", default)]
    shade_name: Option<String>,
    #[serde(rename = "Shade Code", default)]
    shade_code: Option<String>,
    #[serde(rename = "ApproxHex", default)]
    approx_hex: Option<String>,
    #[serde(rename = "ProductURL", default)]
    product_url: Option<String>,
    #[serde(rename = "SwatchURL", default)]
    swatch_url: Option<String>,
}

impl VendorRow for GelBottleRow {
    fn into_record(self, source: SourceCatalog) -> Result<VariantRecord, RowRejection> {
        let raw_hex = self.approx_hex.unwrap_or_default();
        let hex_code = normalize_hex(&raw_hex).ok_or(RowRejection::InvalidHex(raw_hex))?;
        Ok(VariantRecord {
            hex_code,
            brand: or_fallback(self.brand.as_deref(), source.default_brand()),
            product_line: normalize_product_line(
                self.product_type.as_deref().unwrap_or_default(),
                source.default_brand(),
            ),
            shade_name: or_fallback(self.shade_name.as_deref(), UNNAMED_SHADE),
            shade_code: non_blank(self.shade_code.as_deref()),
            collection: self.collection.as_deref().and_then(clean_collection),
            finish: normalize_category_finish(self.category.as_deref().unwrap_or_default()),
            product_url: non_blank(self.product_url.as_deref()),
            swatch_url: non_blank(self.swatch_url.as_deref()),
            source_catalog: source,
        })
    }
}

/// Per-catalogue load counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub skipped_invalid_hex: usize,
    pub skipped_malformed: usize,
}

impl LoadStats {
    fn absorb(&mut self, other: &LoadStats) {
        self.rows_read += other.rows_read;
        self.rows_loaded += other.rows_loaded;
        self.skipped_invalid_hex += other.skipped_invalid_hex;
        self.skipped_malformed += other.skipped_malformed;
    }
}

/// Records from every supplied catalogue, in supplied order.
#[derive(Debug, Default)]
pub struct LoadedCatalogs {
    pub records: Vec<VariantRecord>,
    pub per_source: Vec<(SourceCatalog, LoadStats)>,
}

impl LoadedCatalogs {
    pub fn totals(&self) -> LoadStats {
        let mut total = LoadStats::default();
        for (_, stats) in &self.per_source {
            total.absorb(stats);
        }
        total
    }
}

impl SourceCatalog {
    /// Parse one export from any reader. Bad rows are skipped; only stream
    /// level failures (header, I/O) are returned.
    pub fn parse<R: Read>(self, reader: R) -> Result<(Vec<VariantRecord>, LoadStats), csv::Error> {
        match self {
            SourceCatalog::Opi | SourceCatalog::Cnd => read_rows::<StorefrontRow, R>(self, reader),
            SourceCatalog::GelBottle => read_rows::<GelBottleRow, R>(self, reader),
        }
    }

    /// Parse one export from disk.
    pub fn load(self, path: &Path) -> Result<(Vec<VariantRecord>, LoadStats), SyncError> {
        let csv_err = |source: csv::Error| SyncError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::MissingInput(path.to_path_buf())
            } else {
                csv_err(csv::Error::from(e))
            }
        })?;
        let (records, stats) = self
            .parse(BufReader::with_capacity(1 << 20, file))
            .map_err(csv_err)?;
        info!(
            source = %self,
            path = %path.display(),
            rows_read = stats.rows_read,
            rows_loaded = stats.rows_loaded,
            skipped_invalid_hex = stats.skipped_invalid_hex,
            "catalogue loaded"
        );
        Ok((records, stats))
    }
}

fn read_rows<T: VendorRow, R: Read>(
    source: SourceCatalog,
    reader: R,
) -> Result<(Vec<VariantRecord>, LoadStats), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);
    // Surface header problems before any rows are consumed.
    rdr.headers()?;

    let mut records = Vec::new();
    let mut stats = LoadStats::default();
    for (idx, row) in rdr.deserialize::<T>().enumerate() {
        stats.rows_read += 1;
        let rejection = match row {
            Ok(row) => match row.into_record(source) {
                Ok(record) => {
                    records.push(record);
                    stats.rows_loaded += 1;
                    continue;
                }
                Err(rejection) => rejection,
            },
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => RowRejection::Malformed(e.to_string()),
        };
        match rejection {
            RowRejection::InvalidHex(_) => stats.skipped_invalid_hex += 1,
            RowRejection::Malformed(_) => stats.skipped_malformed += 1,
        }
        debug!(source = %source, row = idx + 1, reason = %rejection, "skipping catalogue row");
    }
    Ok((records, stats))
}

/// Load every configured catalogue in the order given. Missing files are a
/// configuration error; the caller is expected to check paths up front.
pub fn load_catalogues(sources: &[(SourceCatalog, PathBuf)]) -> Result<LoadedCatalogs, SyncError> {
    let mut loaded = LoadedCatalogs::default();
    for (source, path) in sources {
        let (records, stats) = source.load(path)?;
        loaded.records.extend(records);
        loaded.per_source.push((*source, stats));
    }
    info!(rows = loaded.records.len(), "loaded raw variant rows");
    Ok(loaded)
}
