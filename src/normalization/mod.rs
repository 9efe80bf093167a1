//! Pure field normalizers shared by every vendor loader.
//!
//! Nothing in here performs I/O; each function maps one raw CSV value onto the
//! canonical vocabulary stored in `colors` / `color_variants`.

pub mod collection;
pub mod finish;
pub mod hex;
pub mod product_line;

pub use collection::clean_collection;
pub use finish::{normalize_finish, Finish};
pub use hex::normalize_hex;
pub use product_line::normalize_product_line;
