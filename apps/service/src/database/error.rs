use thiserror::Error;

/// Errors surfaced by the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool::managed::PoolError<libsql::Error>),

    #[error("Record not found")]
    NotFound,

    #[error("Unique constraint violation: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Site {site_id} has {open} open outages, at most one may be open")]
    InvariantViolation { site_id: i64, open: usize },
}

impl StoreError {
    /// Data-consistency failures that must stop the scheduler instead of
    /// being logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::InvariantViolation { .. })
    }

    /// Turn a UNIQUE constraint failure into [`StoreError::Conflict`].
    pub(crate) fn from_insert(error: libsql::Error, what: &str) -> Self {
        if error.to_string().contains("UNIQUE constraint failed") {
            StoreError::Conflict(what.to_string())
        } else {
            StoreError::Query(error)
        }
    }
}
