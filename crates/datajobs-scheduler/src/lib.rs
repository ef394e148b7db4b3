//! `datajobs-scheduler`: keeps live triggers in step with persisted jobs.
//!
//! # Overview
//!
//! The [`coordinator::SchedulingCoordinator`] owns the in-memory job list
//! and reconciles it with a [`adapter::SchedulerAdapter`] by pausing every
//! trigger, upserting one registration per valid job, dropping stale ones and
//! resuming. [`engine::TriggerEngine`] is the in-process adapter: it polls its
//! registrations and hands due jobs to a [`engine::FireHandler`], which
//! resolves the job's instruments via [`targets::resolve_targets`] at fire time.
//!
//! # Cadence
//!
//! | Frequency            | Fires                                             |
//! |----------------------|---------------------------------------------------|
//! | intraday, `OneDay`   | every day at the job's time (Mon–Fri if weekdays-only) |
//! | `OneWeek`            | Mondays at the job's time                         |
//! | `OneMonth`           | the 1st at the job's time (first weekday if weekdays-only) |

pub mod adapter;
pub mod confirm;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod targets;
pub mod trigger;

pub use adapter::SchedulerAdapter;
pub use confirm::{ConfirmationPrompt, Decision, PendingDelete};
pub use coordinator::{FailedJob, ScheduleReport, SchedulingCoordinator, SkippedJob};
pub use engine::{EngineConfig, FireHandler, Registration, TriggerEngine};
pub use error::{CoordinatorError, Result, SchedulerError};
pub use targets::resolve_targets;
pub use trigger::{Cadence, TriggerSpec};
