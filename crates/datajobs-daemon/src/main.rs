use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use datajobs_catalog::{CatalogAccessor, SqliteCatalog};
use datajobs_core::config::DataJobsConfig;
use datajobs_jobs::{JobStore, SqliteJobStore};
use datajobs_scheduler::{EngineConfig, ScheduleReport, SchedulingCoordinator, TriggerEngine};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod cli;
mod commands;
mod prompt;
mod router;

use cli::{Cli, Commands};
use router::{UpdateDispatcher, UpdateRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datajobs=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > DATAJOBS_CONFIG env > ~/.datajobs/datajobs.toml
    let config_path = cli
        .config
        .map(|p| p.display().to_string())
        .or_else(|| std::env::var("DATAJOBS_CONFIG").ok());
    let config = DataJobsConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        DataJobsConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // schema migrations (idempotent)
    datajobs_catalog::db::init_db(&db)?;
    datajobs_jobs::db::init_db(&db)?;
    let db = Arc::new(Mutex::new(db));

    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db.clone()));
    let catalog: Arc<dyn CatalogAccessor> = Arc::new(SqliteCatalog::new(db));

    // fired jobs: TriggerEngine -> UpdateDispatcher -> executor task
    let (update_tx, update_rx) = mpsc::channel::<UpdateRequest>(256);
    let engine = TriggerEngine::new(
        EngineConfig::from_config(&config.scheduler)?,
        Arc::new(UpdateDispatcher::new(
            store.clone(),
            catalog.clone(),
            update_tx,
        )),
    );
    let mut coordinator = SchedulingCoordinator::new(
        store,
        catalog,
        Arc::new(engine.clone()),
        tracing::info_span!("coordinator"),
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, engine, coordinator, update_rx).await,
        Commands::List { json } => commands::list(&mut coordinator, json),
        Commands::Add => commands::add(&mut coordinator, &config.defaults),
        Commands::Edit(args) => commands::edit(&mut coordinator, args),
        Commands::Delete { id, yes } => commands::delete(&mut coordinator, id, yes).await,
        Commands::Tags => commands::tags(&mut coordinator),
        Commands::Instruments => commands::instruments(&mut coordinator),
    }
}

async fn run(
    config: &DataJobsConfig,
    engine: TriggerEngine,
    mut coordinator: SchedulingCoordinator,
    update_rx: mpsc::Receiver<UpdateRequest>,
) -> anyhow::Result<()> {
    coordinator.refresh_catalog()?;
    log_report(&coordinator.reload()?);

    let executor = tokio::spawn(router::run_executor(update_rx));
    let engine_loop = tokio::spawn(engine.clone().run());

    let reload_secs = config.scheduler.reload_interval_secs;
    let mut reload = tokio::time::interval(Duration::from_secs(reload_secs.max(1)));
    reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately; startup already reconciled
    reload.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    info!(
        jobs = coordinator.jobs().len(),
        reload_secs, "datajobs scheduler running"
    );
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("shutdown requested");
                break;
            }
            _ = reload.tick(), if reload_secs > 0 => {
                match coordinator.reload() {
                    Ok(report) => log_report(&report),
                    Err(e) => warn!(error = %e, "periodic reload failed"),
                }
            }
        }
    }

    coordinator.shutdown(true).await?;
    engine_loop.await?;
    // the dispatcher's sender lives inside the engine; dropping every handle closes the executor
    drop(coordinator);
    drop(engine);
    executor.await?;
    info!("datajobs stopped");
    Ok(())
}

fn log_report(report: &ScheduleReport) {
    if report.is_complete() {
        info!(scheduled = report.scheduled.len(), "all jobs scheduled");
    } else {
        warn!(
            scheduled = report.scheduled.len(),
            invalid = report.invalid.len(),
            failed = report.failed.len(),
            "some jobs are not scheduled"
        );
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
