//! `datajobs-jobs`: data update job definitions and their durable store.
//!
//! A job refreshes market data either for one instrument or for every
//! instrument carrying a tag. The [`validate`] module holds the rule that a
//! job is in exactly one of those modes and references a live target;
//! [`editor::JobEditor`] runs that rule after every relevant change and
//! gates saving on it.

pub mod db;
pub mod editor;
pub mod error;
pub mod job;
pub mod sqlite;
pub mod store;
pub mod validate;

pub use editor::JobEditor;
pub use error::{JobError, Result};
pub use job::JobDefinition;
pub use sqlite::SqliteJobStore;
pub use store::JobStore;
pub use validate::{prepare_for_save, validate, ValidationError};
