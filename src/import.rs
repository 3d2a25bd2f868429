//! Register a local file as a downloaded source.
//!
//! Stands in for the retrieval pipeline: the file is copied into the data
//! directory under a fresh name, probed, and recorded as an Original with
//! one `original` asset in the `download completed` state.

use std::path::Path;
use std::time::Duration;

use rendition_av::{MediaMetrics, Prober};
use rendition_common::{
    AssetId, AssetSource, Error, MediaKind, OriginalId, OriginalStatus, OwnerId, Result,
};
use rendition_db::get_conn;
use rendition_db::models::{NewAudio, NewOriginal, NewVideo};
use rendition_db::queries::{media, originals};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::AppContext;

/// Outcome of [`import_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imported {
    pub original_id: OriginalId,
    pub source: AssetId,
}

pub async fn import_file(
    ctx: &AppContext,
    file: &Path,
    owner: OwnerId,
    kind: MediaKind,
) -> Result<Imported> {
    if !tokio::fs::try_exists(file).await.unwrap_or(false) {
        return Err(Error::missing_source(file.display()));
    }

    let data_dir = &ctx.config.data_dir;
    tokio::fs::create_dir_all(data_dir).await?;

    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let filename = format!("{}{ext}", Uuid::new_v4());
    let dest = data_dir.join(&filename);
    let size = tokio::fs::copy(file, &dest).await?;
    let size = i64::try_from(size).unwrap_or(i64::MAX);

    let prober = Prober::new(
        ctx.config.tools.ffprobe(),
        Duration::from_secs(ctx.config.tools.probe_timeout_secs),
    );
    let metrics = match prober.probe(&dest, kind).await {
        Ok(m) => m,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Probe failed, recording zero metrics");
            MediaMetrics::default()
        }
    };

    let title = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let imported = {
        let conn = get_conn(&ctx.pool)?;
        let original = originals::create_original(
            &conn,
            &NewOriginal {
                owner_id: owner,
                url: format!("file://{}", file.display()),
                title,
                audio: true,
                video: kind == MediaKind::Video,
            },
        )?;

        let source = match kind {
            MediaKind::Video => AssetId::Video(
                media::create_video(
                    &conn,
                    &NewVideo {
                        original_id: original.id,
                        source: AssetSource::Original,
                        filename,
                        size,
                        duration: metrics.duration,
                        codec: metrics.codec,
                        container: metrics.container,
                        width: metrics.width,
                        height: metrics.height,
                        fps: metrics.fps,
                    },
                )?
                .id,
            ),
            MediaKind::Audio => AssetId::Audio(
                media::create_audio(
                    &conn,
                    &NewAudio {
                        original_id: original.id,
                        source: AssetSource::Original,
                        filename,
                        size,
                        duration: metrics.duration,
                        codec: metrics.codec,
                        container: metrics.container,
                        kbps: metrics.kbps,
                    },
                )?
                .id,
            ),
        };

        Imported {
            original_id: original.id,
            source,
        }
    };

    ctx.status
        .set_original_status(imported.original_id, OriginalStatus::DownloadCompleted)?;

    info!(
        original_id = %imported.original_id,
        source = %imported.source,
        file = %file.display(),
        "Imported source file"
    );

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rendition_db::init_memory_pool;
    use std::path::PathBuf;

    fn context(data_dir: &Path) -> AppContext {
        let mut config = Config::default();
        config.data_dir = data_dir.to_path_buf();
        config.tools.ffprobe_path = Some(PathBuf::from("nonexistent_ffprobe_12345"));
        AppContext::new(config, init_memory_pool().unwrap())
    }

    #[tokio::test]
    async fn test_import_copies_and_registers() {
        let data = tempfile::tempdir().unwrap();
        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("song.m4a");
        std::fs::write(&input, b"not really audio").unwrap();

        let ctx = context(data.path());
        let mut sub = ctx.broadcaster.subscribe(OwnerId::from(3));
        let imported = import_file(&ctx, &input, OwnerId::from(3), MediaKind::Audio)
            .await
            .unwrap();

        let AssetId::Audio(audio_id) = imported.source else {
            panic!("expected an audio asset, got {}", imported.source);
        };
        let conn = get_conn(&ctx.pool).unwrap();
        let audio = media::get_audio(&conn, audio_id).unwrap().unwrap();
        assert_eq!(audio.source, AssetSource::Original);
        assert_eq!(audio.size, 16);
        assert_eq!(audio.kbps, 0);
        assert!(audio.filename.ends_with(".m4a"));
        assert!(data.path().join(&audio.filename).exists());

        let original = originals::get_original(&conn, imported.original_id)
            .unwrap()
            .unwrap();
        assert_eq!(original.status, OriginalStatus::DownloadCompleted);
        assert_eq!(original.title, "song");
        assert!(!original.video);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.status, OriginalStatus::DownloadCompleted);
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let data = tempfile::tempdir().unwrap();
        let ctx = context(data.path());
        let result = import_file(
            &ctx,
            Path::new("/no/such/file.mp4"),
            OwnerId::from(1),
            MediaKind::Video,
        )
        .await;
        assert!(matches!(result, Err(Error::MissingSource(_))));
    }
}
