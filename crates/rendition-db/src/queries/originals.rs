//! Original (parent request) operations.

use rendition_common::{Error, OriginalId, OriginalStatus, OwnerId, Result};
use rusqlite::Connection;

use crate::models::{NewOriginal, Original};

const COLS: &str = "id, owner_id, url, title, status, audio, video, created_at";

/// Register a new Original in the `not started` state.
pub fn create_original(conn: &Connection, new: &NewOriginal) -> Result<Original> {
    let now = super::now();
    let q = format!(
        "INSERT INTO originals (owner_id, url, title, status, audio, video, created_at)
         VALUES (?1, ?2, ?3, 'not started', ?4, ?5, ?6)
         RETURNING {COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![
            new.owner_id.get(),
            new.url,
            new.title,
            new.audio,
            new.video,
            now
        ],
        Original::from_row,
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Get an Original by ID.
pub fn get_original(conn: &Connection, id: OriginalId) -> Result<Option<Original>> {
    let q = format!("SELECT {COLS} FROM originals WHERE id = ?1");
    match conn.query_row(&q, [id.get()], Original::from_row) {
        Ok(o) => Ok(Some(o)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Overwrite an Original's status. Returns false if the row does not exist.
pub fn set_status(conn: &Connection, id: OriginalId, status: OriginalStatus) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE originals SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.as_str(), id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Look up which owner an Original belongs to.
pub fn owner_of(conn: &Connection, id: OriginalId) -> Result<OwnerId> {
    match conn.query_row(
        "SELECT owner_id FROM originals WHERE id = ?1",
        [id.get()],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(owner) => Ok(OwnerId::from(owner)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("original", id)),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// IDs of every Original currently in `status`.
pub fn ids_with_status(conn: &Connection, status: OriginalStatus) -> Result<Vec<OriginalId>> {
    let mut stmt = conn
        .prepare("SELECT id FROM originals WHERE status = ?1 ORDER BY id")
        .map_err(|e| Error::database(e.to_string()))?;
    let ids = stmt
        .query_map([status.as_str()], |row| row.get::<_, i64>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .map(|r| r.map(OriginalId::from))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(ids)
}

/// All Originals belonging to `owner`, newest first.
pub fn list_for_owner(conn: &Connection, owner: OwnerId) -> Result<Vec<Original>> {
    let q = format!("SELECT {COLS} FROM originals WHERE owner_id = ?1 ORDER BY id DESC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([owner.get()], Original::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
