/// Strip scraped URL fragments out of a collection label.
///
/// Some storefront exports glue the collection page URL onto the label with
/// underscores (`Summer 2024_https://...`). In that case the first token that
/// is not a URL is returned; otherwise the trimmed label passes through.
pub fn clean_collection(raw: &str) -> Option<String> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains("http") && cleaned.contains('_') {
        let first = cleaned
            .split('_')
            .map(str::trim)
            .find(|part| !part.is_empty() && !part.starts_with("http"));
        if let Some(part) = first {
            return Some(part.to_string());
        }
    }
    Some(cleaned.to_string())
}
