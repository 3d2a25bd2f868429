//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`. Column order must match the `COLS` constant of the
//! corresponding query module.

use std::str::FromStr;

use rendition_common::{
    AssetId, AssetSource, AudioId, JobId, JobStatus, MediaKind, OriginalId, OriginalStatus,
    OwnerId, TranscodeKind, VideoId,
};
use rusqlite::types::Type;
use serde::Serialize;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a text column into one of the lowercase domain enums.
fn parse_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn get_u32(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<u32> {
    let v: i64 = row.get(idx)?;
    u32::try_from(v)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn get_opt_u32(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<u32>> {
    let v: Option<i64> = row.get(idx)?;
    v.map(u32::try_from)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

// ---------------------------------------------------------------------------
// Original
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Original {
    pub id: OriginalId,
    pub owner_id: OwnerId,
    pub url: String,
    pub title: String,
    pub status: OriginalStatus,
    /// Whether an audio rendition was requested.
    pub audio: bool,
    /// Whether a video rendition was requested.
    pub video: bool,
    pub created_at: String,
}

impl Original {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: OriginalId::from(row.get::<_, i64>(0)?),
            owner_id: OwnerId::from(row.get::<_, i64>(1)?),
            url: row.get(2)?,
            title: row.get(3)?,
            status: parse_enum(row, 4)?,
            audio: row.get(5)?,
            video: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

/// Fields supplied by the retrieval pipeline when registering an Original.
#[derive(Debug, Clone)]
pub struct NewOriginal {
    pub owner_id: OwnerId,
    pub url: String,
    pub title: String,
    pub audio: bool,
    pub video: bool,
}

// ---------------------------------------------------------------------------
// Media assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: VideoId,
    pub original_id: OriginalId,
    pub source: AssetSource,
    /// Path relative to the data directory.
    pub filename: String,
    pub size: i64,
    pub duration: f64,
    pub codec: String,
    pub container: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub created_at: String,
}

impl Video {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: VideoId::from(row.get::<_, i64>(0)?),
            original_id: OriginalId::from(row.get::<_, i64>(1)?),
            source: parse_enum(row, 2)?,
            filename: row.get(3)?,
            size: row.get(4)?,
            duration: row.get(5)?,
            codec: row.get(6)?,
            container: row.get(7)?,
            width: get_u32(row, 8)?,
            height: get_u32(row, 9)?,
            fps: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub original_id: OriginalId,
    pub source: AssetSource,
    pub filename: String,
    pub size: i64,
    pub duration: f64,
    pub codec: String,
    pub container: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Audio {
    pub id: AudioId,
    pub original_id: OriginalId,
    pub source: AssetSource,
    /// Path relative to the data directory.
    pub filename: String,
    pub size: i64,
    pub duration: f64,
    pub codec: String,
    pub container: String,
    pub kbps: u32,
    pub created_at: String,
}

impl Audio {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: AudioId::from(row.get::<_, i64>(0)?),
            original_id: OriginalId::from(row.get::<_, i64>(1)?),
            source: parse_enum(row, 2)?,
            filename: row.get(3)?,
            size: row.get(4)?,
            duration: row.get(5)?,
            codec: row.get(6)?,
            container: row.get(7)?,
            kbps: get_u32(row, 8)?,
            created_at: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAudio {
    pub original_id: OriginalId,
    pub source: AssetSource,
    pub filename: String,
    pub size: i64,
    pub duration: f64,
    pub codec: String,
    pub container: String,
    pub kbps: u32,
}

// ---------------------------------------------------------------------------
// TranscodeJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Row id of the source asset; its table is given by `kind.src_kind()`.
    pub src_id: i64,
    pub kind: TranscodeKind,
    /// Back-reference used for status reconciliation only.
    pub original_id: OriginalId,
    /// Last failure message, set when the job is marked failed.
    pub error: Option<String>,
    pub submitted_at: String,
    pub started_at: Option<String>,
}

impl TranscodeJob {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let src_kind: MediaKind = parse_enum(row, 3)?;
        let dst_kind: MediaKind = parse_enum(row, 4)?;
        let height = get_opt_u32(row, 6)?;
        let fps: Option<f64> = row.get(7)?;
        let kbps = get_opt_u32(row, 8)?;
        let kind = TranscodeKind::from_parts(src_kind, dst_kind, height, fps, kbps)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: JobId::from(row.get::<_, i64>(0)?),
            status: parse_enum(row, 1)?,
            src_id: row.get(2)?,
            kind,
            original_id: OriginalId::from(row.get::<_, i64>(5)?),
            error: row.get(9)?,
            submitted_at: row.get(10)?,
            started_at: row.get(11)?,
        })
    }

    /// The typed id of the asset this job converts from.
    pub fn source(&self) -> AssetId {
        match self.kind.src_kind() {
            MediaKind::Video => AssetId::Video(VideoId::from(self.src_id)),
            MediaKind::Audio => AssetId::Audio(AudioId::from(self.src_id)),
        }
    }
}
