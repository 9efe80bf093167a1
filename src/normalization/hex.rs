/// Marker every canonical hex value starts with.
pub const HEX_PREFIX: char = '#';

/// Number of hexadecimal digits after the marker.
const HEX_DIGITS: usize = 6;

/// Canonicalize a raw hex colour into the stored `#RRGGBB` form.
///
/// Normalization steps:
/// - trim whitespace
/// - uppercase
/// - prepend `#` when absent
/// - require exactly six hexadecimal digits after the marker
///
/// Anything else yields `None` and the caller drops the row.
pub fn normalize_hex(raw: &str) -> Option<String> {
    let candidate = raw.trim().to_ascii_uppercase();
    if candidate.is_empty() {
        return None;
    }
    let digits = candidate.strip_prefix(HEX_PREFIX).unwrap_or(&candidate);
    if digits.len() != HEX_DIGITS || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{HEX_PREFIX}{digits}"))
}
