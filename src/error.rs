use std::path::PathBuf;

use thiserror::Error;

use crate::models::EntityKind;

/// Failures surfaced by the report core.
///
/// Empty data is never represented here: an entity without events or
/// notes produces empty results instead.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no {kind} matches selector {raw:?}")]
    NotFound { kind: EntityKind, raw: String },

    #[error("feature schema mismatch: model expects {expected} columns, row has {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("unexpected prediction shape: {0}")]
    PredictionShape(String),

    #[error("failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("event store query failed: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
