use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveTime;
use datajobs_catalog::sqlite::attach_tags;
use datajobs_core::{Frequency, Instrument, Tag};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, instrument, warn};

use crate::error::{JobError, Result};
use crate::job::JobDefinition;
use crate::store::JobStore;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Column order shared by every SELECT in this module; see [`read_row`].
const JOB_SELECT_SQL: &str = "SELECT j.id, j.name, j.use_tag, j.tag_id, j.instrument_id,
            j.frequency, j.time, j.week_days_only,
            t.id, t.name,
            i.id, i.symbol, i.name, i.exchange, i.currency
     FROM data_update_jobs j
     LEFT JOIN tags t        ON t.id = j.tag_id
     LEFT JOIN instruments i ON i.id = j.instrument_id";

/// Job store backed by the shared SQLite database.
pub struct SqliteJobStore {
    db: Arc<Mutex<Connection>>,
}

/// A row as read from SQLite, before the text columns are parsed.
struct RawJob {
    id: i64,
    name: String,
    use_tag: bool,
    tag_id: Option<i64>,
    instrument_id: Option<i64>,
    frequency: String,
    time: String,
    week_days_only: bool,
    tag: Option<Tag>,
    instrument: Option<Instrument>,
}

impl SqliteJobStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for SqliteJobStore {
    #[instrument(skip(self))]
    fn get_all(&self) -> Result<Vec<JobDefinition>> {
        let db = self.conn();
        let sql = format!("{JOB_SELECT_SQL} ORDER BY j.id");
        let mut stmt = db.prepare(&sql)?;
        let raw = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut jobs = Vec::with_capacity(raw.len());
        for row in raw {
            match decode(row) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(error = %e, "skipping undecodable job row"),
            }
        }
        resolve_instrument_tags(&db, &mut jobs)?;
        Ok(jobs)
    }

    #[instrument(skip(self))]
    fn find_by_id(&self, id: i64) -> Result<Option<JobDefinition>> {
        let db = self.conn();
        let sql = format!("{JOB_SELECT_SQL} WHERE j.id = ?1");
        let raw = db.query_row(&sql, [id], read_row).optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut jobs = vec![decode(raw)?];
        resolve_instrument_tags(&db, &mut jobs)?;
        Ok(jobs.pop())
    }

    #[instrument(skip(self, job), fields(name = %job.name))]
    fn add(&self, job: &JobDefinition) -> Result<JobDefinition> {
        let db = self.conn();
        db.execute(
            "INSERT INTO data_update_jobs
             (name, use_tag, tag_id, instrument_id, frequency, time, week_days_only)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                job.name,
                job.use_tag,
                job.tag_id,
                job.instrument_id,
                job.frequency.to_string(),
                job.time.format(TIME_FORMAT).to_string(),
                job.week_days_only,
            ],
        )?;
        let mut saved = job.clone();
        saved.id = db.last_insert_rowid();
        info!(job_id = saved.id, "job added");
        Ok(saved)
    }

    #[instrument(skip(self, job), fields(job_id = job.id))]
    fn update(&self, job: &JobDefinition) -> Result<()> {
        let db = self.conn();
        let rows_changed = db.execute(
            "UPDATE data_update_jobs
             SET name = ?1, use_tag = ?2, tag_id = ?3, instrument_id = ?4,
                 frequency = ?5, time = ?6, week_days_only = ?7
             WHERE id = ?8",
            rusqlite::params![
                job.name,
                job.use_tag,
                job.tag_id,
                job.instrument_id,
                job.frequency.to_string(),
                job.time.format(TIME_FORMAT).to_string(),
                job.week_days_only,
                job.id,
            ],
        )?;
        if rows_changed == 0 {
            return Err(JobError::NotFound { id: job.id });
        }
        info!("job updated");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&self, id: i64) -> Result<bool> {
        let db = self.conn();
        let n = db.execute("DELETE FROM data_update_jobs WHERE id = ?1", [id])?;
        if n > 0 {
            info!(job_id = id, "job deleted");
        }
        Ok(n > 0)
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
    let tag = match row.get::<_, Option<i64>>(8)? {
        Some(id) => Some(Tag {
            id,
            name: row.get(9)?,
        }),
        None => None,
    };
    let instrument = match row.get::<_, Option<i64>>(10)? {
        Some(id) => Some(Instrument {
            id,
            symbol: row.get(11)?,
            name: row.get(12)?,
            exchange: row.get(13)?,
            currency: row.get(14)?,
            tags: Vec::new(),
        }),
        None => None,
    };
    Ok(RawJob {
        id: row.get(0)?,
        name: row.get(1)?,
        use_tag: row.get(2)?,
        tag_id: row.get(3)?,
        instrument_id: row.get(4)?,
        frequency: row.get(5)?,
        time: row.get(6)?,
        week_days_only: row.get(7)?,
        tag,
        instrument,
    })
}

fn decode(raw: RawJob) -> Result<JobDefinition> {
    let frequency: Frequency = raw
        .frequency
        .parse()
        .map_err(|reason| JobError::CorruptRow { id: raw.id, reason })?;
    let time = NaiveTime::parse_from_str(&raw.time, TIME_FORMAT).map_err(|e| {
        JobError::CorruptRow {
            id: raw.id,
            reason: format!("bad time '{}': {e}", raw.time),
        }
    })?;
    Ok(JobDefinition {
        id: raw.id,
        name: raw.name,
        use_tag: raw.use_tag,
        tag_id: raw.tag_id,
        tag: raw.tag,
        instrument_id: raw.instrument_id,
        instrument: raw.instrument,
        frequency,
        time,
        week_days_only: raw.week_days_only,
    })
}

/// Fill the tag list of every eagerly loaded instrument.
fn resolve_instrument_tags(db: &Connection, jobs: &mut [JobDefinition]) -> Result<()> {
    let slots: Vec<usize> = jobs
        .iter()
        .enumerate()
        .filter(|(_, j)| j.instrument.is_some())
        .map(|(i, _)| i)
        .collect();
    if slots.is_empty() {
        return Ok(());
    }
    let mut instruments: Vec<Instrument> = slots
        .iter()
        .filter_map(|&i| jobs[i].instrument.take())
        .collect();
    attach_tags(db, &mut instruments)?;
    for (slot, instrument) in slots.into_iter().zip(instruments) {
        jobs[slot].instrument = Some(instrument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::prepare_for_save;
    use datajobs_core::config::JobDefaults;

    fn store() -> SqliteJobStore {
        let conn = Connection::open_in_memory().unwrap();
        datajobs_catalog::db::init_db(&conn).unwrap();
        crate::db::init_db(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tags (id, name) VALUES (1, 'Energy'), (2, 'Tech');
             INSERT INTO instruments (id, symbol, exchange) VALUES
                (11, 'CL', 'NYMEX'), (12, 'AAPL', 'NASDAQ');
             INSERT INTO instrument_tags (instrument_id, tag_id) VALUES (11, 1), (12, 2);",
        )
        .unwrap();
        SqliteJobStore::new(Arc::new(Mutex::new(conn)))
    }

    fn energy() -> Tag {
        Tag {
            id: 1,
            name: "Energy".into(),
        }
    }

    fn tag_job(name: &str) -> JobDefinition {
        let mut job = JobDefinition::draft(&JobDefaults::default());
        job.name = name.into();
        job.tag = Some(energy());
        prepare_for_save(&mut job).unwrap();
        job
    }

    #[test]
    fn add_assigns_ids_and_get_all_resolves_tag() {
        let store = store();
        let a = store.add(&tag_job("Oil")).unwrap();
        let b = store.add(&tag_job("Gas")).unwrap();
        assert!(a.id > 0 && b.id > a.id);

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Oil");
        assert_eq!(all[0].tag, Some(energy()));
        assert!(all[0].instrument.is_none());
        assert_eq!(all[0], a);
    }

    #[test]
    fn draft_without_target_round_trips() {
        let store = store();
        let draft = store
            .add(&JobDefinition::draft(&JobDefaults::default()))
            .unwrap();
        let loaded = store.find_by_id(draft.id).unwrap().unwrap();
        assert!(loaded.use_tag);
        assert!(loaded.tag_id.is_none() && loaded.tag.is_none());
        assert_eq!(loaded.time, draft.time);
    }

    #[test]
    fn instrument_is_resolved_with_its_tags() {
        let store = store();
        let mut job = tag_job("Apple");
        job.use_tag = false;
        job.instrument = store_instrument(&store, 12);
        prepare_for_save(&mut job).unwrap();
        let saved = store.add(&job).unwrap();

        let loaded = store.find_by_id(saved.id).unwrap().unwrap();
        let instrument = loaded.instrument.unwrap();
        assert_eq!(instrument.symbol, "AAPL");
        assert_eq!(instrument.tags.len(), 1);
        assert_eq!(instrument.tags[0].name, "Tech");
        assert!(loaded.tag_id.is_none());
    }

    fn store_instrument(store: &SqliteJobStore, id: i64) -> Option<Instrument> {
        use datajobs_catalog::{CatalogAccessor, SqliteCatalog};
        SqliteCatalog::new(store.db.clone()).find_instrument(id).unwrap()
    }

    #[test]
    fn dangling_instrument_resolves_to_none() {
        let store = store();
        let mut job = tag_job("Crude");
        job.use_tag = false;
        job.instrument = store_instrument(&store, 11);
        prepare_for_save(&mut job).unwrap();
        let saved = store.add(&job).unwrap();

        store
            .conn()
            .execute("DELETE FROM instruments WHERE id = 11", [])
            .unwrap();
        let loaded = store.find_by_id(saved.id).unwrap().unwrap();
        assert_eq!(loaded.instrument_id, Some(11));
        assert!(loaded.instrument.is_none());
    }

    #[test]
    fn update_is_last_write_wins() {
        let store = store();
        let saved = store.add(&tag_job("Oil")).unwrap();

        let mut first = saved.clone();
        first.name = "Oil (first)".into();
        first.week_days_only = false;
        store.update(&first).unwrap();

        let mut second = saved.clone();
        second.name = "Oil (second)".into();
        second.frequency = Frequency::OneHour;
        store.update(&second).unwrap();

        let loaded = store.find_by_id(saved.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Oil (second)");
        assert_eq!(loaded.frequency, Frequency::OneHour);
        // nothing from the first write survives: full-row overwrite
        assert!(loaded.week_days_only);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = store();
        let mut ghost = tag_job("Ghost");
        ghost.id = 777;
        assert!(matches!(
            store.update(&ghost),
            Err(JobError::NotFound { id: 777 })
        ));
    }

    #[test]
    fn delete_reports_whether_a_row_went_away() {
        let store = store();
        let saved = store.add(&tag_job("Oil")).unwrap();
        assert!(store.delete(saved.id).unwrap());
        assert!(!store.delete(saved.id).unwrap());
        assert!(store.find_by_id(saved.id).unwrap().is_none());
    }

    #[test]
    fn corrupt_rows_fail_lookup_and_are_skipped_in_bulk() {
        let store = store();
        let good = store.add(&tag_job("Good")).unwrap();
        let bad = store.add(&tag_job("Bad")).unwrap();
        store
            .conn()
            .execute(
                "UPDATE data_update_jobs SET frequency = 'fortnightly' WHERE id = ?1",
                [bad.id],
            )
            .unwrap();

        assert!(matches!(
            store.find_by_id(bad.id),
            Err(JobError::CorruptRow { .. })
        ));
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, good.id);
    }
}
