use thiserror::Error;

/// Errors that can occur while persisting or loading jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Resolving the job's instrument reference failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] datajobs_catalog::CatalogError),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    NotFound { id: i64 },

    /// A stored row could not be decoded (unknown frequency, bad time, ...).
    #[error("Corrupt job row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, JobError>;
