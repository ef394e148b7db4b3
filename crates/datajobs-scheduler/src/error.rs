use datajobs_catalog::CatalogError;
use datajobs_jobs::{JobError, ValidationError};
use thiserror::Error;

/// Faults raised by a trigger engine.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The engine has been shut down and accepts no further commands.
    #[error("Scheduler engine is shut down")]
    EngineStopped,

    /// The job's trigger spec has no future fire time.
    #[error("Trigger for job {job_id} cannot be represented: {reason}")]
    Unrepresentable { job_id: i64, reason: String },

    /// The engine refused the registration for another reason.
    #[error("Scheduler rejected job {job_id}: {reason}")]
    Rejected { job_id: i64, reason: String },
}

/// Errors surfaced by [`SchedulingCoordinator`](crate::SchedulingCoordinator) operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Job store error: {0}")]
    Store(#[from] JobError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The job is not in a saveable state; nothing was written.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// An update referenced a job the store no longer has.
    #[error("Job not found: {id}")]
    NotFound { id: i64 },

    /// The caller passed a reference that can never be valid (programming error).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
