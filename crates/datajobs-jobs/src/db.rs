use rusqlite::Connection;

use crate::error::Result;

/// Initialise the job table.
///
/// `tag_id` / `instrument_id` point into the catalog tables but carry no
/// foreign-key action: catalog rows can be removed by other subsystems and
/// a dangling reference simply resolves to nothing.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS data_update_jobs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT    NOT NULL,
            use_tag         INTEGER NOT NULL DEFAULT 1,
            tag_id          INTEGER,
            instrument_id   INTEGER,
            frequency       TEXT    NOT NULL,   -- snake_case Frequency
            time            TEXT    NOT NULL,   -- HH:MM:SS
            week_days_only  INTEGER NOT NULL DEFAULT 1
        );",
    )?;
    Ok(())
}
