//! Salon colour catalogue sync.
//!
//! Vendor CSV exports are normalized into [`catalog::VariantRecord`]s,
//! deduplicated, and reconciled into one canonical colour per hex value plus
//! one variant per brand listing.

pub mod catalog;
pub mod cli;
pub mod database_ops;
pub mod error;
pub mod normalization;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use error::{Phase, RowRejection, SyncError};
