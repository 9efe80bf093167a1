/// Placeholder stored when a row carries no product line at all.
pub const UNKNOWN_PRODUCT_LINE: &str = "Unknown";

/// Canonical casing for the product lines each brand is known to ship.
fn canonical_line(brand: &str, lowered: &str) -> Option<&'static str> {
    let line = match (brand, lowered) {
        ("OPI", "nail lacquer") => "Nail Lacquer",
        ("OPI", "infinite shine") => "Infinite Shine",
        ("OPI", "gelcolor") => "GelColor",
        ("CND", "shellac") => "Shellac",
        ("CND", "vinylux") => "Vinylux",
        ("The GelBottle Inc.", "gelcolor") => "GelColor",
        ("The GelBottle Inc.", "biab") => "BIAB",
        _ => return None,
    };
    Some(line)
}

/// Map a raw product line onto the brand's canonical spelling.
///
/// Unrecognized lines are kept (trimmed) so new ranges are not silently
/// merged into an existing one; blank input becomes [`UNKNOWN_PRODUCT_LINE`].
pub fn normalize_product_line(raw: &str, brand: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_PRODUCT_LINE.to_string();
    }
    canonical_line(brand, &trimmed.to_lowercase())
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.to_string())
}
