pub mod dedup;
pub mod loader;
pub mod record;

pub use dedup::{deduplicate, group_by_hex};
pub use loader::{load_catalogues, LoadStats, LoadedCatalogs};
pub use record::{SourceCatalog, VariantKey, VariantRecord};
