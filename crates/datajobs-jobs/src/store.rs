use crate::error::Result;
use crate::job::JobDefinition;

/// Durable create/read/update/delete for job definitions, keyed by id.
pub trait JobStore: Send + Sync {
    /// All jobs ordered by id, with `tag` / `instrument` eagerly resolved.
    fn get_all(&self) -> Result<Vec<JobDefinition>>;

    /// One job by id, `None` if it does not exist.
    fn find_by_id(&self, id: i64) -> Result<Option<JobDefinition>>;

    /// Insert a new row and return the job with its assigned id.
    /// Any id already on `job` is ignored.
    fn add(&self, job: &JobDefinition) -> Result<JobDefinition>;

    /// Overwrite the full row for `job.id`. Last write wins.
    /// Fails with [`JobError::NotFound`](crate::JobError::NotFound) if the row is gone.
    fn update(&self, job: &JobDefinition) -> Result<()>;

    /// Remove a row. Returns `false` when there was nothing to delete.
    fn delete(&self, id: i64) -> Result<bool>;
}
