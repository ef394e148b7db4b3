use thiserror::Error;

/// Errors raised while reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
