use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use datajobs_core::config::SchedulerConfig;
use datajobs_jobs::JobDefinition;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::adapter::SchedulerAdapter;
use crate::error::SchedulerError;
use crate::trigger::TriggerSpec;

/// Receives every job the engine fires.
///
/// Called on its own task; the engine never runs two fires of the same job
/// id at once.
#[async_trait]
pub trait FireHandler: Send + Sync + 'static {
    async fn on_fire(&self, job: JobDefinition);
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Zone in which trigger times of day are interpreted.
    pub timezone: Tz,
    /// Polling cadence of [`TriggerEngine::run`].
    pub tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            tick: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &SchedulerConfig) -> datajobs_core::Result<Self> {
        Ok(Self {
            timezone: config.tz()?,
            tick: Duration::from_millis(config.tick_millis.max(1)),
        })
    }
}

/// A live trigger.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Snapshot handed to the [`FireHandler`] on every fire.
    pub job: JobDefinition,
    pub trigger: TriggerSpec,
    pub next_fire: DateTime<Utc>,
}

#[derive(Default)]
struct EngineState {
    registrations: HashMap<i64, Registration>,
    in_flight: HashSet<i64>,
    paused: bool,
    stopped: bool,
}

/// In-process trigger engine with ±1 tick precision.
///
/// Cloning yields another handle to the same engine: one clone drives
/// [`run`](TriggerEngine::run) while others issue commands through
/// [`SchedulerAdapter`].
#[derive(Clone)]
pub struct TriggerEngine {
    state: Arc<Mutex<EngineState>>,
    config: EngineConfig,
    handler: Arc<dyn FireHandler>,
    tracker: TaskTracker,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl TriggerEngine {
    pub fn new(config: EngineConfig, handler: Arc<dyn FireHandler>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            config,
            handler,
            tracker: TaskTracker::new(),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Main loop. Polls every tick until [`SchedulerAdapter::shutdown`] is called.
    pub async fn run(self) {
        info!(timezone = %self.config.timezone, tick_ms = self.config.tick.as_millis() as u64, "trigger engine started");
        let mut shutdown = self.shutdown_tx.subscribe();
        if *shutdown.borrow() {
            return;
        }
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.fire_due(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("trigger engine loop stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Fire every registration whose time has come. Returns how many fires
    /// were started.
    ///
    /// Nothing fires while paused; those registrations stay due and fire once
    /// on the first tick after resume. A due job that is still running from
    /// its previous fire is skipped for this occurrence.
    pub fn fire_due(&self, now: DateTime<Utc>) -> usize {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.paused || state.stopped {
            return 0;
        }

        let mut due: Vec<i64> = state
            .registrations
            .iter()
            .filter(|(_, r)| r.next_fire <= now)
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        let local_now = now.with_timezone(&self.config.timezone);
        let mut started = 0;
        for job_id in due {
            let Some(reg) = state.registrations.get_mut(&job_id) else {
                continue;
            };
            let job = reg.job.clone();
            match reg.trigger.next_fire_after(&local_now) {
                Some(next) => reg.next_fire = next.with_timezone(&Utc),
                None => {
                    error!(job_id, name = %job.name, "trigger has no further fire time; dropping registration");
                    state.registrations.remove(&job_id);
                }
            }

            if !state.in_flight.insert(job_id) {
                warn!(job_id, name = %job.name, "previous fire still running; skipping this occurrence");
                continue;
            }

            info!(job_id, name = %job.name, "firing job");
            started += 1;
            let handler = Arc::clone(&self.handler);
            let in_flight = InFlight {
                state: Arc::clone(&self.state),
                job_id,
            };
            self.tracker.spawn(async move {
                let _in_flight = in_flight;
                handler.on_fire(job).await;
            });
        }
        started
    }

    /// Register or replace `job`'s trigger, computing the next fire from `now`.
    ///
    /// Re-registering with an unchanged trigger keeps the pending fire time,
    /// so a fire that came due during a pause is neither lost nor doubled.
    pub fn register(
        &self,
        job: &JobDefinition,
        trigger: &TriggerSpec,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        let mut state = lock(&self.state);
        if state.stopped {
            return Err(SchedulerError::EngineStopped);
        }

        if let Some(existing) = state.registrations.get_mut(&job.id) {
            if existing.trigger == *trigger {
                existing.job = job.clone();
                debug!(job_id = job.id, next_fire = %existing.next_fire, "trigger unchanged");
                return Ok(existing.next_fire);
            }
        }

        let local_now = now.with_timezone(&self.config.timezone);
        let next_fire = trigger
            .next_fire_after(&local_now)
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| SchedulerError::Unrepresentable {
                job_id: job.id,
                reason: format!("'{trigger}' has no upcoming fire time"),
            })?;

        state.registrations.insert(
            job.id,
            Registration {
                job: job.clone(),
                trigger: *trigger,
                next_fire,
            },
        );
        info!(job_id = job.id, name = %job.name, %trigger, %next_fire, "trigger registered");
        Ok(next_fire)
    }

    /// Snapshot of all registrations, ordered by job id.
    pub fn registrations(&self) -> Vec<Registration> {
        let state = lock(&self.state);
        let mut regs: Vec<Registration> = state.registrations.values().cloned().collect();
        regs.sort_by_key(|r| r.job.id);
        regs
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    /// Number of fires currently executing.
    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }
}

#[async_trait]
impl SchedulerAdapter for TriggerEngine {
    fn pause_all(&self) -> Result<(), SchedulerError> {
        let mut state = lock(&self.state);
        if state.stopped {
            return Err(SchedulerError::EngineStopped);
        }
        state.paused = true;
        info!(in_flight = state.in_flight.len(), "all triggers paused");
        Ok(())
    }

    fn resume_all(&self) -> Result<(), SchedulerError> {
        let mut state = lock(&self.state);
        if state.stopped {
            return Err(SchedulerError::EngineStopped);
        }
        state.paused = false;
        info!(registrations = state.registrations.len(), "all triggers resumed");
        Ok(())
    }

    fn schedule(&self, job: &JobDefinition, trigger: &TriggerSpec) -> Result<(), SchedulerError> {
        self.register(job, trigger, Utc::now()).map(|_| ())
    }

    fn unschedule(&self, job_id: i64) -> Result<bool, SchedulerError> {
        let mut state = lock(&self.state);
        if state.stopped {
            return Err(SchedulerError::EngineStopped);
        }
        let removed = state.registrations.remove(&job_id).is_some();
        if removed {
            info!(job_id, "trigger unregistered");
        }
        Ok(removed)
    }

    fn scheduled_job_ids(&self) -> Result<Vec<i64>, SchedulerError> {
        let state = lock(&self.state);
        let mut ids: Vec<i64> = state.registrations.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn shutdown(&self, wait_for_jobs: bool) -> Result<(), SchedulerError> {
        {
            let mut state = lock(&self.state);
            if state.stopped {
                return Ok(());
            }
            state.stopped = true;
            info!(in_flight = state.in_flight.len(), wait_for_jobs, "trigger engine shutting down");
        }
        self.shutdown_tx.send_replace(true);
        self.tracker.close();
        if wait_for_jobs {
            self.tracker.wait().await;
            info!("all in-flight fires finished");
        }
        Ok(())
    }
}

/// Clears the job's in-flight mark when its fire task ends, even on panic.
struct InFlight {
    state: Arc<Mutex<EngineState>>,
    job_id: i64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.job_id);
    }
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
