use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use datajobs_catalog::CatalogAccessor;
use datajobs_core::config::JobDefaults;
use datajobs_core::{Instrument, Tag};
use datajobs_jobs::{validate, JobDefinition, JobEditor, JobError, JobStore, ValidationError};
use tracing::{debug, info, warn, Instrument as _, Span};
use uuid::Uuid;

use crate::adapter::SchedulerAdapter;
use crate::confirm::{ConfirmationPrompt, Decision, PendingDelete};
use crate::error::{CoordinatorError, Result, SchedulerError};
use crate::trigger::TriggerSpec;

/// A held job that was not registered because it fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedJob {
    pub job_id: i64,
    pub name: String,
    pub reason: ValidationError,
}

/// A job the scheduler refused to schedule or unschedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub job_id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of one [`SchedulingCoordinator::schedule_all`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Ids registered (or re-registered) this pass, in collection order.
    pub scheduled: Vec<i64>,
    pub invalid: Vec<SkippedJob>,
    pub failed: Vec<FailedJob>,
    /// Registrations dropped because their job is gone or no longer schedulable.
    pub removed: Vec<i64>,
}

impl ScheduleReport {
    /// `true` when every held job ended up registered.
    pub fn is_complete(&self) -> bool {
        self.invalid.is_empty() && self.failed.is_empty()
    }
}

/// Owns the in-memory job collection and keeps the scheduler in step with it.
///
/// Not meant for concurrent writers: mutating operations take `&mut self`,
/// so callers serialise commands through one owner (the daemon's command
/// loop, or a single operator session).
pub struct SchedulingCoordinator {
    jobs: Vec<JobDefinition>,
    tags: Vec<Tag>,
    instruments: Vec<Instrument>,
    pending_deletes: HashMap<Uuid, i64>,
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogAccessor>,
    scheduler: Arc<dyn SchedulerAdapter>,
    span: Span,
}

impl SchedulingCoordinator {
    /// `span` scopes every log line the coordinator emits.
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn CatalogAccessor>,
        scheduler: Arc<dyn SchedulerAdapter>,
        span: Span,
    ) -> Self {
        Self {
            jobs: Vec::new(),
            tags: Vec::new(),
            instruments: Vec::new(),
            pending_deletes: HashMap::new(),
            store,
            catalog,
            scheduler,
            span,
        }
    }

    pub fn jobs(&self) -> &[JobDefinition] {
        &self.jobs
    }

    pub fn job(&self, id: i64) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Tags cached by the last [`refresh_catalog`](Self::refresh_catalog).
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Instruments cached by the last [`refresh_catalog`](Self::refresh_catalog).
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Replace the in-memory collection with everything in the store.
    pub fn load_all(&mut self) -> Result<usize> {
        let _enter = self.span.enter();
        self.jobs = self.store.get_all()?;
        info!(count = self.jobs.len(), "loaded jobs");
        Ok(self.jobs.len())
    }

    /// Reload the tag and instrument caches. Jobs are untouched.
    pub fn refresh_catalog(&mut self) -> Result<()> {
        let _enter = self.span.enter();
        self.tags = self.catalog.all_tags()?;
        self.instruments = self.catalog.all_instruments()?;
        debug!(tags = self.tags.len(), instruments = self.instruments.len(), "catalog refreshed");
        Ok(())
    }

    /// Rebuild every registration from the held jobs.
    ///
    /// Pauses the scheduler, upserts one trigger per valid job, drops
    /// registrations for anything else and resumes. Jobs failing validation
    /// and jobs the scheduler rejects are reported rather than aborting the
    /// pass. Only a failure to pause aborts before any change is made; resume
    /// is attempted whenever pause succeeded.
    pub fn schedule_all(&mut self) -> Result<ScheduleReport> {
        let _enter = self.span.enter();
        self.scheduler.pause_all()?;

        let mut report = ScheduleReport::default();
        let mut registered: HashSet<i64> = HashSet::new();
        for job in &self.jobs {
            if let Err(reason) = validate(job) {
                warn!(job_id = job.id, name = %job.name, %reason, "job not schedulable; skipping");
                report.invalid.push(SkippedJob {
                    job_id: job.id,
                    name: job.name.clone(),
                    reason,
                });
                continue;
            }

            let trigger = TriggerSpec::for_job(job);
            match self.scheduler.schedule(job, &trigger) {
                Ok(()) => {
                    debug!(job_id = job.id, %trigger, "scheduled");
                    registered.insert(job.id);
                    report.scheduled.push(job.id);
                }
                Err(e) => {
                    warn!(job_id = job.id, name = %job.name, error = %e, "scheduler rejected job");
                    report.failed.push(FailedJob {
                        job_id: job.id,
                        name: job.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let pruned = self.prune_registrations(&registered, &mut report);
        let resumed = self.scheduler.resume_all();
        pruned?;
        resumed?;

        info!(
            scheduled = report.scheduled.len(),
            invalid = report.invalid.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "reconcile complete"
        );
        Ok(report)
    }

    /// Reload from the store, then reconcile.
    pub fn reload(&mut self) -> Result<ScheduleReport> {
        self.load_all()?;
        self.schedule_all()
    }

    /// Persist a fresh job built from `defaults` and add it to the collection.
    ///
    /// The new job is not registered with the scheduler; it picks up a
    /// trigger on the next [`schedule_all`](Self::schedule_all).
    pub fn add_job(&mut self, defaults: &JobDefaults) -> Result<JobDefinition> {
        let _enter = self.span.enter();
        let job = self.store.add(&JobDefinition::draft(defaults))?;
        info!(job_id = job.id, name = %job.name, "job added");
        self.jobs.push(job.clone());
        Ok(job)
    }

    /// Start editing a held job. `None` if no job has that id.
    pub fn edit_job(&self, id: i64) -> Option<JobEditor> {
        self.job(id).cloned().map(JobEditor::new)
    }

    /// Validate, normalise and write the edited job, then refresh the held copy.
    ///
    /// Nothing reaches the store while the editor has a validation error.
    /// The scheduler is not touched; the change takes effect on the next
    /// [`schedule_all`](Self::schedule_all).
    pub fn update_job(&mut self, editor: &JobEditor) -> Result<JobDefinition> {
        let _enter = self.span.enter();
        if editor.id() <= 0 {
            return Err(CoordinatorError::InvalidArgument(format!(
                "cannot update job with id {}; add it first",
                editor.id()
            )));
        }
        let job = editor.to_saveable()?;
        match self.store.update(&job) {
            Ok(()) => {}
            Err(JobError::NotFound { id }) => return Err(CoordinatorError::NotFound { id }),
            Err(e) => return Err(e.into()),
        }

        match self.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(held) => *held = job.clone(),
            None => {
                self.jobs.push(job.clone());
                self.jobs.sort_by_key(|j| j.id);
            }
        }
        info!(job_id = job.id, name = %job.name, target = %job.target_label(), "job updated");
        Ok(job)
    }

    /// Remove a job from the store, the collection and the scheduler.
    ///
    /// Returns `false` without touching anything when the store has no such
    /// job. Performs the deletion unconditionally; callers wanting operator
    /// approval go through [`request_delete`](Self::request_delete) or
    /// [`delete_with_prompt`](Self::delete_with_prompt).
    pub fn delete_job(&mut self, id: i64) -> Result<bool> {
        let _enter = self.span.enter();
        let name = match self.store.find_by_id(id) {
            Ok(Some(job)) => job.name,
            Ok(None) => {
                debug!(job_id = id, "delete of unknown job ignored");
                return Ok(false);
            }
            Err(JobError::CorruptRow { id, reason }) => {
                warn!(job_id = id, %reason, "deleting unreadable job row");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        self.store.delete(id)?;
        self.jobs.retain(|j| j.id != id);
        self.pending_deletes.retain(|_, job_id| *job_id != id);
        let unscheduled = self.scheduler.unschedule(id)?;
        info!(job_id = id, %name, unscheduled, "job deleted");
        Ok(true)
    }

    /// First half of a confirmed delete.
    ///
    /// Returns the prompt to show the operator, or `None` when there is no
    /// such job. Nothing changes until [`confirm_delete`](Self::confirm_delete)
    /// is called with the returned token. A row that can no longer be decoded
    /// is still offered for deletion, named `job <id>` in the prompt.
    pub fn request_delete(&mut self, id: i64) -> Result<Option<PendingDelete>> {
        let _enter = self.span.enter();
        let name = match self.store.find_by_id(id) {
            Ok(Some(job)) => job.name,
            Ok(None) => {
                debug!(job_id = id, "delete requested for unknown job");
                return Ok(None);
            }
            Err(JobError::CorruptRow { id, reason }) => {
                warn!(job_id = id, %reason, "delete requested for unreadable job row");
                format!("job {id}")
            }
            Err(e) => return Err(e.into()),
        };
        let pending = PendingDelete::new(id, &name);
        self.pending_deletes.insert(pending.token, id);
        debug!(job_id = id, token = %pending.token, "delete awaiting confirmation");
        Ok(Some(pending))
    }

    /// Second half of a confirmed delete. Returns whether a job was deleted.
    ///
    /// Tokens are single-use; an unknown or spent token is an
    /// [`InvalidArgument`](CoordinatorError::InvalidArgument).
    pub fn confirm_delete(&mut self, token: Uuid, decision: Decision) -> Result<bool> {
        let Some(id) = self.pending_deletes.remove(&token) else {
            return Err(CoordinatorError::InvalidArgument(format!(
                "unknown delete token {token}"
            )));
        };
        match decision {
            Decision::Approve => self.delete_job(id),
            Decision::Decline => {
                let _enter = self.span.enter();
                info!(job_id = id, "delete declined");
                Ok(false)
            }
        }
    }

    /// Ask `prompt` for approval and delete on approval.
    pub async fn delete_with_prompt(
        &mut self,
        id: i64,
        prompt: &dyn ConfirmationPrompt,
    ) -> Result<bool> {
        let Some(pending) = self.request_delete(id)? else {
            return Ok(false);
        };
        let decision = prompt
            .confirm(&pending.title, &pending.message)
            .instrument(self.span.clone())
            .await;
        self.confirm_delete(pending.token, decision)
    }

    /// Instruments `job` would refresh if it fired now.
    pub fn resolve_targets(&self, job: &JobDefinition) -> Result<Vec<Instrument>> {
        let _enter = self.span.enter();
        Ok(crate::targets::resolve_targets(self.catalog.as_ref(), job)?)
    }

    /// Stop the scheduler, optionally waiting for running fires.
    pub async fn shutdown(&self, wait_for_jobs: bool) -> Result<()> {
        self.scheduler
            .shutdown(wait_for_jobs)
            .instrument(self.span.clone())
            .await?;
        Ok(())
    }

    /// Unschedule every registration not in `keep`. Individual failures go in
    /// the report; only a failure to list registrations is returned.
    fn prune_registrations(
        &self,
        keep: &HashSet<i64>,
        report: &mut ScheduleReport,
    ) -> std::result::Result<(), SchedulerError> {
        for id in self.scheduler.scheduled_job_ids()? {
            if keep.contains(&id) {
                continue;
            }
            let name = self.job(id).map(|j| j.name.clone()).unwrap_or_default();
            match self.scheduler.unschedule(id) {
                Ok(true) => {
                    debug!(job_id = id, "stale registration removed");
                    report.removed.push(id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(job_id = id, %name, error = %e, "failed to remove registration");
                    report.failed.push(FailedJob {
                        job_id: id,
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
