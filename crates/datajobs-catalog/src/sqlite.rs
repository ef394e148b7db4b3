use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use datajobs_core::{Instrument, Tag};
use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::accessor::CatalogAccessor;
use crate::error::Result;

const INSTRUMENT_SELECT_SQL: &str = "SELECT i.id, i.symbol, i.name, i.exchange, i.currency
     FROM instruments i";

/// Catalog reader backed by the shared SQLite database.
///
/// Takes a shared connection so the job store and the catalog can live in
/// the same (possibly in-memory) database.
pub struct SqliteCatalog {
    db: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogAccessor for SqliteCatalog {
    #[instrument(skip(self))]
    fn all_tags(&self) -> Result<Vec<Tag>> {
        let db = self.conn();
        let mut stmt = db.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = tags.len(), "loaded tags");
        Ok(tags)
    }

    #[instrument(skip(self))]
    fn all_instruments(&self) -> Result<Vec<Instrument>> {
        let db = self.conn();
        let sql = format!("{INSTRUMENT_SELECT_SQL} ORDER BY i.symbol, i.id");
        let mut instruments = query_instruments(&db, &sql, [])?;
        attach_tags(&db, &mut instruments)?;
        debug!(count = instruments.len(), "loaded instruments");
        Ok(instruments)
    }

    #[instrument(skip(self))]
    fn instruments_for_tag(&self, tag_id: i64) -> Result<Vec<Instrument>> {
        let db = self.conn();
        let sql = format!(
            "{INSTRUMENT_SELECT_SQL}
             JOIN instrument_tags it ON it.instrument_id = i.id
             WHERE it.tag_id = ?1
             ORDER BY i.symbol, i.id"
        );
        let mut instruments = query_instruments(&db, &sql, [tag_id])?;
        attach_tags(&db, &mut instruments)?;
        Ok(instruments)
    }

    #[instrument(skip(self))]
    fn find_instrument(&self, id: i64) -> Result<Option<Instrument>> {
        let db = self.conn();
        let sql = format!("{INSTRUMENT_SELECT_SQL} WHERE i.id = ?1");
        let mut instruments = query_instruments(&db, &sql, [id])?;
        attach_tags(&db, &mut instruments)?;
        Ok(instruments.pop())
    }
}

fn query_instruments<P: rusqlite::Params>(
    db: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Instrument>> {
    let mut stmt = db.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(Instrument {
                id: row.get(0)?,
                symbol: row.get(1)?,
                name: row.get(2)?,
                exchange: row.get(3)?,
                currency: row.get(4)?,
                tags: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Bound on host parameters per membership query.
const TAG_LOOKUP_CHUNK: usize = 500;

/// Fill `tags` on each instrument from the memberships of those instruments only.
pub fn attach_tags(db: &Connection, instruments: &mut [Instrument]) -> Result<()> {
    if instruments.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = instruments.iter().map(|i| i.id).collect();
    let mut by_instrument: HashMap<i64, Vec<Tag>> = HashMap::new();
    for chunk in ids.chunks(TAG_LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = db.prepare(&format!(
            "SELECT it.instrument_id, t.id, t.name
             FROM instrument_tags it
             JOIN tags t ON t.id = it.tag_id
             WHERE it.instrument_id IN ({placeholders})
             ORDER BY t.name"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Tag {
                    id: row.get(1)?,
                    name: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (instrument_id, tag) = row?;
            by_instrument.entry(instrument_id).or_default().push(tag);
        }
    }
    for instrument in instruments.iter_mut() {
        instrument.tags = by_instrument.remove(&instrument.id).unwrap_or_default();
    }
    Ok(())
}
