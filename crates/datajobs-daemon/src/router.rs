use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datajobs_catalog::CatalogAccessor;
use datajobs_core::Frequency;
use datajobs_jobs::{JobDefinition, JobStore};
use datajobs_scheduler::{resolve_targets, FireHandler};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What the fetch executor is asked to do when a job fires.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateRequest {
    pub job_id: i64,
    pub name: String,
    pub frequency: Frequency,
    /// Symbols resolved at fire time, ordered by symbol.
    pub instruments: Vec<String>,
    pub fired_at: DateTime<Utc>,
}

/// Fire handler: re-reads the job, resolves its targets against the live
/// catalog and forwards an [`UpdateRequest`] to the executor task.
///
/// The registration's copy of the job can be stale when another process
/// edited or deleted it since the last reload; the stored row wins.
pub(crate) struct UpdateDispatcher {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogAccessor>,
    tx: mpsc::Sender<UpdateRequest>,
}

impl UpdateDispatcher {
    pub(crate) fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn CatalogAccessor>,
        tx: mpsc::Sender<UpdateRequest>,
    ) -> Self {
        Self { store, catalog, tx }
    }
}

#[async_trait]
impl FireHandler for UpdateDispatcher {
    async fn on_fire(&self, registered: JobDefinition) {
        let job = match self.store.find_by_id(registered.id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(job_id = registered.id, name = %registered.name, "job no longer stored; fire skipped");
                return;
            }
            Err(e) => {
                warn!(job_id = registered.id, name = %registered.name, error = %e, "job lookup failed; fire skipped");
                return;
            }
        };

        let instruments = match resolve_targets(self.catalog.as_ref(), &job) {
            Ok(found) => found,
            Err(e) => {
                warn!(job_id = job.id, name = %job.name, error = %e, "target resolution failed; fire skipped");
                return;
            }
        };

        let request = UpdateRequest {
            job_id: job.id,
            name: job.name,
            frequency: job.frequency,
            instruments: instruments.into_iter().map(|i| i.symbol).collect(),
            fired_at: Utc::now(),
        };
        if self.tx.send(request).await.is_err() {
            warn!(job_id = job.id, "executor channel closed, update request dropped");
        }
    }
}

/// Executor boundary. Fetching is handled elsewhere; requests are logged.
pub(crate) async fn run_executor(mut rx: mpsc::Receiver<UpdateRequest>) {
    while let Some(request) = rx.recv().await {
        if request.instruments.is_empty() {
            info!(job_id = request.job_id, name = %request.name, "no instruments to refresh");
            continue;
        }
        info!(
            job_id = request.job_id,
            name = %request.name,
            frequency = %request.frequency,
            instruments = ?request.instruments,
            "data update requested"
        );
    }
    info!("executor stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use datajobs_catalog::SqliteCatalog;
    use datajobs_core::config::JobDefaults;
    use datajobs_core::Tag;
    use datajobs_jobs::SqliteJobStore;
    use datajobs_scheduler::{EngineConfig, SchedulingCoordinator, TriggerEngine};
    use rusqlite::Connection;

    struct Fixture {
        db: Arc<Mutex<Connection>>,
        store: Arc<SqliteJobStore>,
        catalog: Arc<dyn CatalogAccessor>,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        datajobs_catalog::db::init_db(&conn).unwrap();
        datajobs_jobs::db::init_db(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tags (id, name) VALUES (1, 'Energy');
             INSERT INTO instruments (id, symbol) VALUES (10, 'NG'), (11, 'CL'), (12, 'AAPL');
             INSERT INTO instrument_tags VALUES (10, 1), (11, 1);",
        )
        .unwrap();
        let db = Arc::new(Mutex::new(conn));
        Fixture {
            store: Arc::new(SqliteJobStore::new(db.clone())),
            catalog: Arc::new(SqliteCatalog::new(db.clone())),
            db,
        }
    }

    impl Fixture {
        fn dispatcher(&self, tx: mpsc::Sender<UpdateRequest>) -> UpdateDispatcher {
            UpdateDispatcher::new(self.store.clone(), self.catalog.clone(), tx)
        }

        fn coordinator(&self, engine: &TriggerEngine) -> SchedulingCoordinator {
            SchedulingCoordinator::new(
                self.store.clone(),
                self.catalog.clone(),
                Arc::new(engine.clone()),
                tracing::info_span!("coordinator"),
            )
        }

        fn add_oil_job(&self) -> JobDefinition {
            let mut job = JobDefinition::draft(&JobDefaults::default());
            job.name = "Oil".into();
            job.tag_id = Some(1);
            job.tag = Some(Tag {
                id: 1,
                name: "Energy".into(),
            });
            self.store.add(&job).unwrap()
        }
    }

    #[tokio::test]
    async fn fire_sends_resolved_symbols() {
        let f = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let oil = f.add_oil_job();
        f.dispatcher(tx).on_fire(oil.clone()).await;

        let request = rx.recv().await.unwrap();
        assert_eq!(request.job_id, oil.id);
        assert_eq!(request.name, "Oil");
        assert_eq!(request.frequency, Frequency::OneDay);
        assert_eq!(request.instruments, ["CL", "NG"]);
    }

    #[tokio::test]
    async fn missing_instrument_sends_empty_request() {
        let f = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let mut job = JobDefinition::draft(&JobDefaults::default());
        job.use_tag = false;
        job.instrument_id = Some(99);
        let job = f.store.add(&job).unwrap();
        f.dispatcher(tx).on_fire(job).await;

        assert!(rx.recv().await.unwrap().instruments.is_empty());
    }

    #[tokio::test]
    async fn fire_uses_the_stored_definition() {
        let f = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let registered = f.add_oil_job();

        let mut edited = registered.clone();
        edited.name = "Crude".into();
        edited.use_tag = false;
        edited.tag_id = None;
        edited.tag = None;
        edited.instrument_id = Some(11);
        edited.frequency = Frequency::OneHour;
        f.store.update(&edited).unwrap();

        f.dispatcher(tx).on_fire(registered).await;

        let request = rx.recv().await.unwrap();
        assert_eq!(request.name, "Crude");
        assert_eq!(request.frequency, Frequency::OneHour);
        assert_eq!(request.instruments, ["CL"]);
    }

    #[tokio::test]
    async fn unreadable_row_skips_the_fire() {
        let f = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let oil = f.add_oil_job();
        f.db
            .lock()
            .unwrap()
            .execute(
                "UPDATE data_update_jobs SET frequency = 'fortnightly' WHERE id = ?1",
                [oil.id],
            )
            .unwrap();

        f.dispatcher(tx).on_fire(oil).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn job_deleted_by_another_process_does_not_fire() {
        let f = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let daemon_engine = TriggerEngine::new(EngineConfig::default(), Arc::new(f.dispatcher(tx)));
        let mut daemon = f.coordinator(&daemon_engine);
        let oil = f.add_oil_job();
        assert_eq!(daemon.reload().unwrap().scheduled, vec![oil.id]);

        // a one-shot command shares the database but not the daemon's engine
        let (cli_tx, _cli_rx) = mpsc::channel(4);
        let cli_engine = TriggerEngine::new(EngineConfig::default(), Arc::new(f.dispatcher(cli_tx)));
        let mut cli = f.coordinator(&cli_engine);
        cli.load_all().unwrap();
        assert!(cli.delete_job(oil.id).unwrap());
        assert_eq!(daemon_engine.registrations().len(), 1);

        let due = daemon_engine.registrations()[0].next_fire;
        assert_eq!(daemon_engine.fire_due(due), 1);
        daemon.shutdown(true).await.unwrap();

        assert!(rx.try_recv().is_err());
    }
}
