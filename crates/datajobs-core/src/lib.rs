//! `datajobs-core`: types, configuration and errors shared by every
//! datajobs crate.

pub mod config;
pub mod error;
pub mod types;

pub use error::{DataJobsError, Result};
pub use types::{Frequency, Instrument, Tag};
