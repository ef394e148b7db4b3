//! `datajobs-catalog`: read-only access to the instrument/tag catalog.
//!
//! The catalog is owned by other subsystems; this crate only creates the
//! schema (idempotently) and answers membership queries.

pub mod accessor;
pub mod db;
pub mod error;
pub mod sqlite;

pub use accessor::CatalogAccessor;
pub use error::{CatalogError, Result};
pub use sqlite::SqliteCatalog;
