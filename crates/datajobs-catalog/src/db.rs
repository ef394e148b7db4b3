use rusqlite::Connection;

use crate::error::Result;

/// Initialise the catalog tables.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS instruments (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol    TEXT NOT NULL,
            name      TEXT,
            exchange  TEXT,
            currency  TEXT
        );
        CREATE TABLE IF NOT EXISTS tags (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE
        );
        -- many-to-many: an instrument carries any number of tags
        CREATE TABLE IF NOT EXISTS instrument_tags (
            instrument_id  INTEGER NOT NULL REFERENCES instruments(id) ON DELETE CASCADE,
            tag_id         INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (instrument_id, tag_id)
        );
        CREATE INDEX IF NOT EXISTS idx_instrument_tags_tag
            ON instrument_tags (tag_id);",
    )?;
    Ok(())
}
