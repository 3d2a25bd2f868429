//! Video and audio asset operations.

use rendition_common::{AudioId, Error, OriginalId, Result, VideoId};
use rusqlite::Connection;

use crate::models::{Audio, NewAudio, NewVideo, Video};

const VIDEO_COLS: &str = "id, original_id, source, filename, size, duration, codec, container,
    width, height, fps, created_at";

const AUDIO_COLS: &str = "id, original_id, source, filename, size, duration, codec, container,
    kbps, created_at";

/// Insert a video row.
pub fn create_video(conn: &Connection, new: &NewVideo) -> Result<Video> {
    let now = super::now();
    let q = format!(
        "INSERT INTO videos (original_id, source, filename, size, duration, codec, container,
                             width, height, fps, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         RETURNING {VIDEO_COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![
            new.original_id.get(),
            new.source.as_str(),
            new.filename,
            new.size,
            new.duration,
            new.codec,
            new.container,
            new.width,
            new.height,
            new.fps,
            now,
        ],
        Video::from_row,
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Insert an audio row.
pub fn create_audio(conn: &Connection, new: &NewAudio) -> Result<Audio> {
    let now = super::now();
    let q = format!(
        "INSERT INTO audios (original_id, source, filename, size, duration, codec, container,
                             kbps, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING {AUDIO_COLS}"
    );
    conn.query_row(
        &q,
        rusqlite::params![
            new.original_id.get(),
            new.source.as_str(),
            new.filename,
            new.size,
            new.duration,
            new.codec,
            new.container,
            new.kbps,
            now,
        ],
        Audio::from_row,
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a video row by ID.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    let q = format!("SELECT {VIDEO_COLS} FROM videos WHERE id = ?1");
    match conn.query_row(&q, [id.get()], Video::from_row) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get an audio row by ID.
pub fn get_audio(conn: &Connection, id: AudioId) -> Result<Option<Audio>> {
    let q = format!("SELECT {AUDIO_COLS} FROM audios WHERE id = ?1");
    match conn.query_row(&q, [id.get()], Audio::from_row) {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Backfill probed dimensions on a video that was registered without them.
pub fn update_video_dimensions(
    conn: &Connection,
    id: VideoId,
    width: u32,
    height: u32,
    fps: f64,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE videos SET width = ?1, height = ?2, fps = ?3 WHERE id = ?4",
            rusqlite::params![width, height, fps, id.get()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// All video rows belonging to an Original, in insertion order.
pub fn list_videos_for_original(conn: &Connection, original_id: OriginalId) -> Result<Vec<Video>> {
    let q = format!("SELECT {VIDEO_COLS} FROM videos WHERE original_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([original_id.get()], Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// All audio rows belonging to an Original, in insertion order.
pub fn list_audios_for_original(conn: &Connection, original_id: OriginalId) -> Result<Vec<Audio>> {
    let q = format!("SELECT {AUDIO_COLS} FROM audios WHERE original_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([original_id.get()], Audio::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOriginal;
    use crate::pool::init_memory_pool;
    use crate::queries::originals;
    use rendition_common::{AssetSource, OwnerId};

    fn setup(conn: &Connection) -> OriginalId {
        originals::create_original(
            conn,
            &NewOriginal {
                owner_id: OwnerId::from(1),
                url: String::new(),
                title: "clip".into(),
                audio: true,
                video: true,
            },
        )
        .unwrap()
        .id
    }

    fn new_video(original_id: OriginalId, height: u32) -> NewVideo {
        NewVideo {
            original_id,
            source: AssetSource::Original,
            filename: "src.mp4".into(),
            size: 1024,
            duration: 12.5,
            codec: "h264".into(),
            container: "mov,mp4,m4a,3gp,3g2,mj2".into(),
            width: height * 16 / 9,
            height,
            fps: 30.0,
        }
    }

    #[test]
    fn create_and_get_video() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let original_id = setup(&conn);

        let video = create_video(&conn, &new_video(original_id, 1080)).unwrap();
        assert_eq!(video.source, AssetSource::Original);
        assert_eq!(video.height, 1080);

        let found = get_video(&conn, video.id).unwrap().unwrap();
        assert_eq!(found.filename, "src.mp4");
        assert!((found.duration - 12.5).abs() < f64::EPSILON);

        assert!(get_video(&conn, VideoId::from(999)).unwrap().is_none());
    }

    #[test]
    fn create_and_get_audio() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let original_id = setup(&conn);

        let audio = create_audio(
            &conn,
            &NewAudio {
                original_id,
                source: AssetSource::Transcode,
                filename: "out.mp3".into(),
                size: 512,
                duration: 3.0,
                codec: "mp3".into(),
                container: "mp3".into(),
                kbps: 96,
            },
        )
        .unwrap();

        let found = get_audio(&conn, audio.id).unwrap().unwrap();
        assert_eq!(found.source, AssetSource::Transcode);
        assert_eq!(found.kbps, 96);
        assert_eq!(list_audios_for_original(&conn, original_id).unwrap().len(), 1);
    }

    #[test]
    fn backfill_dimensions() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let original_id = setup(&conn);
        let video = create_video(&conn, &new_video(original_id, 0)).unwrap();

        assert!(update_video_dimensions(&conn, video.id, 1280, 720, 25.0).unwrap());
        let found = get_video(&conn, video.id).unwrap().unwrap();
        assert_eq!((found.width, found.height), (1280, 720));
    }

    #[test]
    fn rows_cascade_with_original() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let original_id = setup(&conn);
        create_video(&conn, &new_video(original_id, 720)).unwrap();

        conn.execute("DELETE FROM originals WHERE id = ?1", [original_id.get()])
            .unwrap();
        assert!(list_videos_for_original(&conn, original_id)
            .unwrap()
            .is_empty());
    }
}
