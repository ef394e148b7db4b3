use async_trait::async_trait;
use datajobs_jobs::JobDefinition;

use crate::error::SchedulerError;
use crate::trigger::TriggerSpec;

/// Command surface over a trigger engine.
///
/// Every call is synchronous from the caller's point of view except
/// [`shutdown`](SchedulerAdapter::shutdown), which may wait for in-flight
/// fires. Implementations translate [`TriggerSpec`] into their own trigger
/// representation.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Stop starting new fires. Fires already running are left alone.
    fn pause_all(&self) -> Result<(), SchedulerError>;

    /// Resume firing after [`pause_all`](SchedulerAdapter::pause_all).
    fn resume_all(&self) -> Result<(), SchedulerError>;

    /// Register `job` under its id, replacing any earlier registration.
    fn schedule(&self, job: &JobDefinition, trigger: &TriggerSpec) -> Result<(), SchedulerError>;

    /// Drop the registration for `job_id`. Returns `false` if there was none.
    fn unschedule(&self, job_id: i64) -> Result<bool, SchedulerError>;

    /// Ids that currently have a registration.
    fn scheduled_job_ids(&self) -> Result<Vec<i64>, SchedulerError>;

    /// Stop the engine, optionally waiting for running fires to finish.
    async fn shutdown(&self, wait_for_jobs: bool) -> Result<(), SchedulerError>;
}
