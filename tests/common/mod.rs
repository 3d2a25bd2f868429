//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a file-backed database inside a
//! temporary data directory together with a full [`AppContext`]. A real
//! file is used (rather than an in-memory pool) so that concurrent workers
//! exercise SQLite's locking the way production does.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rendition::config::Config;
use rendition::context::AppContext;
use rendition_common::{AssetId, AssetSource, MediaKind, OriginalId, OwnerId, TranscodeKind};
use rendition_db::models::{NewAudio, NewOriginal, NewVideo, TranscodeJob};
use rendition_db::queries::{media, originals, transcode_jobs};
use rendition_db::{get_conn, init_pool, DbPool, PooledConnection};
use tempfile::TempDir;

pub struct TestHarness {
    pub ctx: AppContext,
    pub pool: DbPool,
    dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Build a harness from `config`; its data dir is replaced by a
    /// temporary directory.
    pub fn with_config(mut config: Config) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        config.data_dir = dir.path().to_path_buf();
        config.database_path = None;

        let pool = init_pool(&config.database_path()).expect("failed to open database");
        let ctx = AppContext::new(config, pool.clone());

        Self { ctx, pool, dir }
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.pool).expect("failed to get connection")
    }

    pub fn original(&self, owner: i64) -> OriginalId {
        originals::create_original(
            &self.conn(),
            &NewOriginal {
                owner_id: OwnerId::from(owner),
                url: "https://example.com/watch".into(),
                title: "clip".into(),
                audio: true,
                video: true,
            },
        )
        .expect("failed to create original")
        .id
    }

    /// Register an `original` video row and write a placeholder file for it.
    pub fn source_video(&self, original_id: OriginalId, height: u32) -> AssetId {
        let filename = format!("source-{original_id}.mp4");
        std::fs::write(self.data_dir().join(&filename), b"source").unwrap();
        let video = media::create_video(
            &self.conn(),
            &NewVideo {
                original_id,
                source: AssetSource::Original,
                filename,
                size: 6,
                duration: 10.0,
                codec: "h264".into(),
                container: "mp4".into(),
                width: height * 16 / 9,
                height,
                fps: 30.0,
            },
        )
        .expect("failed to create video");
        AssetId::Video(video.id)
    }

    /// Register an `original` audio row and write a placeholder file for it.
    pub fn source_audio(&self, original_id: OriginalId) -> AssetId {
        let filename = format!("source-{original_id}.m4a");
        std::fs::write(self.data_dir().join(&filename), b"source").unwrap();
        let audio = media::create_audio(
            &self.conn(),
            &NewAudio {
                original_id,
                source: AssetSource::Original,
                filename,
                size: 6,
                duration: 10.0,
                codec: "aac".into(),
                container: "m4a".into(),
                kbps: 128,
            },
        )
        .expect("failed to create audio");
        AssetId::Audio(audio.id)
    }

    pub fn enqueue(
        &self,
        original_id: OriginalId,
        source: AssetId,
        kind: TranscodeKind,
    ) -> TranscodeJob {
        transcode_jobs::enqueue(&self.conn(), original_id, source, kind)
            .expect("failed to enqueue job")
    }

    /// Enqueue `n` video renditions of one source.
    pub fn enqueue_many(&self, original_id: OriginalId, source: AssetId, n: usize) -> Vec<TranscodeJob> {
        (0..n)
            .map(|i| {
                let height = 144 + 2 * i as u32;
                self.enqueue(original_id, source, TranscodeKind::video(height, None).unwrap())
            })
            .collect()
    }
}

/// Audio rendition of a video source.
pub fn audio_from_video(kbps: u32) -> TranscodeKind {
    TranscodeKind::audio(MediaKind::Video, kbps).unwrap()
}

/// Write an executable shell script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
