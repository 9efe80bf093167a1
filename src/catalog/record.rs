use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalization::Finish;

/// Vendor feed a record came from. Stored as `source_catalog` on variants and
/// as `source_priority` on the colour it first populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceCatalog {
    #[serde(rename = "opi_full_uk_catalog")]
    Opi,
    #[serde(rename = "cnd_full_uk_catalog")]
    Cnd,
    #[serde(rename = "tgb_full_catalog")]
    GelBottle,
}

impl SourceCatalog {
    /// Order catalogues are concatenated in before deduplication.
    pub const ALL: [SourceCatalog; 3] =
        [SourceCatalog::Opi, SourceCatalog::Cnd, SourceCatalog::GelBottle];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceCatalog::Opi => "opi_full_uk_catalog",
            SourceCatalog::Cnd => "cnd_full_uk_catalog",
            SourceCatalog::GelBottle => "tgb_full_catalog",
        }
    }

    /// Brand written when the export leaves the brand column blank.
    pub fn default_brand(self) -> &'static str {
        match self {
            SourceCatalog::Opi => "OPI",
            SourceCatalog::Cnd => "CND",
            SourceCatalog::GelBottle => "The GelBottle Inc.",
        }
    }
}

impl fmt::Display for SourceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural identity of a variant: `(brand, product_line, shade_name, shade_code)`.
/// `shade_code == None` is the "no code" value; it is never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub brand: String,
    pub product_line: String,
    pub shade_name: String,
    pub shade_code: Option<String>,
}

/// One normalized catalogue row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRecord {
    pub hex_code: String,
    pub brand: String,
    pub product_line: String,
    pub shade_name: String,
    pub shade_code: Option<String>,
    pub collection: Option<String>,
    pub finish: Finish,
    pub product_url: Option<String>,
    pub swatch_url: Option<String>,
    pub source_catalog: SourceCatalog,
}

impl VariantRecord {
    pub fn key(&self) -> VariantKey {
        VariantKey {
            brand: self.brand.clone(),
            product_line: self.product_line.clone(),
            shade_name: self.shade_name.clone(),
            shade_code: self.shade_code.clone(),
        }
    }
}

/// `Some(trimmed)` for non-blank input, `None` otherwise.
pub(crate) fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed value or the literal fallback when blank.
pub(crate) fn or_fallback(raw: Option<&str>, fallback: &str) -> String {
    non_blank(raw).unwrap_or_else(|| fallback.to_string())
}
