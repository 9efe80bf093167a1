use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Reconciliation phase a store failure happened in; surfaced in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ExistenceCheck,
    InsertColors,
    PatchColors,
    UpsertVariants,
    AssignPrimary,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::ExistenceCheck => "existence check",
            Phase::InsertColors => "insert colors",
            Phase::PatchColors => "patch colors",
            Phase::UpsertVariants => "upsert variants",
            Phase::AssignPrimary => "assign primary variants",
        };
        f.write_str(label)
    }
}

/// Run-level failures. Every variant aborts the sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("CSV not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("store call failed during {phase}: {source:#}")]
    Store {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub(crate) fn store(phase: Phase) -> impl FnOnce(anyhow::Error) -> SyncError {
        move |source| SyncError::Store { phase, source }
    }
}

/// Why a single CSV row was skipped. Never fatal; logged at debug level.
#[derive(Debug, Error)]
pub enum RowRejection {
    #[error("invalid hex value {0:?}")]
    InvalidHex(String),

    #[error("malformed row: {0}")]
    Malformed(String),
}
