//! Transcode job record store.
//!
//! Jobs move `pending -> running -> (deleted | failed)`. A successful job is
//! deleted outright, so absence of a row is the only record of success.
//! Claiming is a single conditional `UPDATE`, which makes it exclusive even
//! when several dispatchers race on separate connections.

use rendition_common::{
    AssetId, Error, JobId, JobStatus, MediaKind, OriginalId, Result, TranscodeKind,
};
use rusqlite::Connection;

use crate::models::TranscodeJob;

const COLS: &str = "id, status, src_id, src_kind, dst_kind, original_id, height, fps, kbps,
    error, submitted_at, started_at";

/// Priority used when selecting the next pending job.
///
/// Jobs producing a reference rendition (the configured video height or
/// audio bitrate) run first; everything else runs in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOrder {
    pub reference_video_height: u32,
    pub reference_audio_kbps: u32,
}

impl Default for JobOrder {
    fn default() -> Self {
        Self {
            reference_video_height: 480,
            reference_audio_kbps: 96,
        }
    }
}

/// `ORDER BY` clause implementing [`JobOrder`]; binds `?1` and `?2`.
const ORDER_BY: &str = "ORDER BY
        CASE WHEN (dst_kind = 'video' AND height = ?1)
               OR (dst_kind = 'audio' AND kbps = ?2)
             THEN 0 ELSE 1 END,
        submitted_at ASC,
        id ASC";

/// Enqueue a new pending job converting `source` into `kind`.
pub fn enqueue(
    conn: &Connection,
    original_id: OriginalId,
    source: AssetId,
    kind: TranscodeKind,
) -> Result<TranscodeJob> {
    let src_id = match (source, kind.src_kind()) {
        (AssetId::Video(id), MediaKind::Video) => id.get(),
        (AssetId::Audio(id), MediaKind::Audio) => id.get(),
        _ => {
            return Err(Error::invalid_input(format!(
                "source {source} does not match {kind}"
            )))
        }
    };

    let now = super::now();
    let q = format!(
        "INSERT INTO transcode_jobs (status, src_id, src_kind, dst_kind, original_id,
                                     height, fps, kbps, submitted_at)
         VALUES ('pending', ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         RETURNING {COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![
            src_id,
            kind.src_kind().as_str(),
            kind.dst_kind().as_str(),
            original_id.get(),
            kind.height(),
            kind.fps(),
            kind.kbps(),
            now,
        ],
        TranscodeJob::from_row,
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<TranscodeJob> {
    let q = format!("SELECT {COLS} FROM transcode_jobs WHERE id = ?1");
    match conn.query_row(&q, [id.get()], TranscodeJob::from_row) {
        Ok(j) => Ok(j),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::not_found("transcode_job", id)),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Pending jobs in dispatch order.
///
/// The result is a fresh snapshot; call again to observe newer work.
pub fn list_pending(conn: &Connection, order: JobOrder) -> Result<Vec<TranscodeJob>> {
    let q = format!("SELECT {COLS} FROM transcode_jobs WHERE status = 'pending' {ORDER_BY}");
    query_jobs(
        conn,
        &q,
        rusqlite::params![order.reference_video_height, order.reference_audio_kbps],
    )
}

/// Jobs with an optional status filter, oldest first.
pub fn list_jobs(conn: &Connection, status: Option<JobStatus>) -> Result<Vec<TranscodeJob>> {
    match status {
        Some(s) => {
            let q = format!(
                "SELECT {COLS} FROM transcode_jobs WHERE status = ?1
                 ORDER BY submitted_at ASC, id ASC"
            );
            query_jobs(conn, &q, [s.as_str()])
        }
        None => {
            let q = format!("SELECT {COLS} FROM transcode_jobs ORDER BY submitted_at ASC, id ASC");
            query_jobs(conn, &q, rusqlite::params![])
        }
    }
}

/// Every job, of any status, referencing an Original.
pub fn list_for_original(conn: &Connection, original_id: OriginalId) -> Result<Vec<TranscodeJob>> {
    let q = format!("SELECT {COLS} FROM transcode_jobs WHERE original_id = ?1 ORDER BY id");
    query_jobs(conn, &q, [original_id.get()])
}

fn query_jobs<P: rusqlite::Params>(
    conn: &Connection,
    q: &str,
    params: P,
) -> Result<Vec<TranscodeJob>> {
    let mut stmt = conn.prepare(q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(params, TranscodeJob::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Overwrite a job's status. Moving to `running` stamps `started_at`.
pub fn set_status(conn: &Connection, id: JobId, status: JobStatus) -> Result<bool> {
    let now = super::now();
    let n = conn
        .execute(
            "UPDATE transcode_jobs
             SET status = ?1,
                 started_at = CASE WHEN ?1 = 'running' THEN ?2 ELSE started_at END
             WHERE id = ?3",
            rusqlite::params![status.as_str(), now, id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Conditionally move one specific job from `pending` to `running`.
///
/// Returns false if the job was already claimed (or no longer exists).
pub fn claim(conn: &Connection, id: JobId) -> Result<bool> {
    let now = super::now();
    let n = conn
        .execute(
            "UPDATE transcode_jobs SET status = 'running', started_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            rusqlite::params![now, id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Atomically claim the highest-priority pending job.
///
/// The selection and the status change happen in one statement, so a row
/// can only ever be handed to one caller.
pub fn claim_next_pending(conn: &Connection, order: JobOrder) -> Result<Option<TranscodeJob>> {
    let now = super::now();
    let q = format!(
        "UPDATE transcode_jobs SET status = 'running', started_at = ?3
         WHERE id = (
             SELECT id FROM transcode_jobs WHERE status = 'pending'
             {ORDER_BY}
             LIMIT 1
         )
         AND status = 'pending'
         RETURNING {COLS}"
    );

    let result = conn.query_row(
        &q,
        rusqlite::params![order.reference_video_height, order.reference_audio_kbps, now],
        TranscodeJob::from_row,
    );
    match result {
        Ok(j) => Ok(Some(j)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Mark a job failed, recording the error. The row is retained.
pub fn mark_failed(conn: &Connection, id: JobId, error: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE transcode_jobs SET status = 'failed', error = ?1 WHERE id = ?2",
            rusqlite::params![error, id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Re-enqueue a failed job. Only failed jobs are affected.
pub fn retry_failed(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE transcode_jobs SET status = 'pending', error = NULL, started_at = NULL
             WHERE id = ?1 AND status = 'failed'",
            [id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Return one `running` job to `pending` so a later pass claims it again.
pub fn requeue(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE transcode_jobs SET status = 'pending', started_at = NULL
             WHERE id = ?1 AND status = 'running'",
            [id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a job. Returns false if it did not exist.
pub fn delete(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM transcode_jobs WHERE id = ?1", [id.get()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Return every `running` job to `pending`.
///
/// Called once at startup: anything still running belonged to a process
/// that no longer exists.
pub fn reset_running_to_pending(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE transcode_jobs SET status = 'pending', started_at = NULL
         WHERE status = 'running'",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Distinct Originals referenced by at least one pending or running job.
pub fn live_original_ids(conn: &Connection) -> Result<Vec<OriginalId>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT original_id FROM transcode_jobs
             WHERE status IN ('pending', 'running')
             ORDER BY original_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .map(|r| r.map(OriginalId::from))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(ids)
}
