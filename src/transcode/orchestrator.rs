//! Decide which renditions a source asset needs and enqueue them.
//!
//! A video source yields one extracted audio track plus video renditions
//! chosen from the configured ladder:
//!
//! - [`LadderPolicy::BestFit`]: only the largest ladder height that does not
//!   exceed the source height.
//! - [`LadderPolicy::FullLadder`]: every ladder height that does not exceed
//!   the source height.
//!
//! An audio source yields a single audio rendition. Renditions are never
//! upscaled.

use std::path::PathBuf;
use std::time::Duration;

use rendition_av::Prober;
use rendition_common::{
    AssetId, AssetSource, Error, MediaKind, OriginalId, Result, TranscodeKind,
};
use rendition_db::models::TranscodeJob;
use rendition_db::queries::{media, originals, transcode_jobs};
use rendition_db::{get_conn, DbPool};
use tracing::{debug, info, warn};

use super::scheduler::SchedulerHandle;
use crate::config::{Config, LadderPolicy, RenditionConfig};

/// Video heights to produce for a source `source_height` pixels tall,
/// largest first.
pub fn plan_renditions(source_height: u32, ladder: &[u32], policy: LadderPolicy) -> Vec<u32> {
    let mut fitting: Vec<u32> = ladder
        .iter()
        .copied()
        .filter(|&h| h > 0 && h <= source_height)
        .collect();
    fitting.sort_unstable_by(|a, b| b.cmp(a));
    fitting.dedup();

    match policy {
        LadderPolicy::BestFit => fitting.truncate(1),
        LadderPolicy::FullLadder => {}
    }
    fitting
}

/// Source asset facts needed for planning.
struct SourceInfo {
    original_id: OriginalId,
    filename: String,
    /// Recorded height, 0 when unknown. Always 0 for audio.
    height: u32,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    pool: DbPool,
    prober: Prober,
    data_dir: PathBuf,
    renditions: RenditionConfig,
    scheduler: Option<SchedulerHandle>,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        prober: Prober,
        data_dir: PathBuf,
        renditions: RenditionConfig,
    ) -> Self {
        Self {
            pool,
            prober,
            data_dir,
            renditions,
            scheduler: None,
        }
    }

    pub fn from_config(pool: DbPool, config: &Config) -> Self {
        Self::new(
            pool,
            Prober::new(
                config.tools.ffprobe(),
                Duration::from_secs(config.tools.probe_timeout_secs),
            ),
            config.data_dir.clone(),
            config.renditions.clone(),
        )
    }

    /// Wake `handle` whenever jobs are enqueued.
    pub fn with_scheduler(mut self, handle: SchedulerHandle) -> Self {
        self.scheduler = Some(handle);
        self
    }

    fn source_info(&self, source: AssetId) -> Result<SourceInfo> {
        let conn = get_conn(&self.pool)?;
        match source {
            AssetId::Video(id) => {
                let video = media::get_video(&conn, id)?
                    .ok_or_else(|| Error::not_found("video", id))?;
                Ok(SourceInfo {
                    original_id: video.original_id,
                    filename: video.filename,
                    height: video.height,
                })
            }
            AssetId::Audio(id) => {
                let audio = media::get_audio(&conn, id)?
                    .ok_or_else(|| Error::not_found("audio", id))?;
                Ok(SourceInfo {
                    original_id: audio.original_id,
                    filename: audio.filename,
                    height: 0,
                })
            }
        }
    }

    /// Kinds to enqueue for `source`.
    fn plan(&self, source: AssetId, height: u32) -> Result<Vec<TranscodeKind>> {
        match source {
            AssetId::Video(_) => {
                let mut kinds = vec![TranscodeKind::audio(
                    MediaKind::Video,
                    self.renditions.audio_kbps,
                )?];
                for h in plan_renditions(height, &self.renditions.ladder, self.renditions.policy) {
                    kinds.push(TranscodeKind::video(h, None)?);
                }
                Ok(kinds)
            }
            AssetId::Audio(_) => Ok(vec![TranscodeKind::audio(
                MediaKind::Audio,
                self.renditions.audio_kbps,
            )?]),
        }
    }

    /// Enqueue every rendition a freshly completed source asset needs.
    ///
    /// Returns no jobs, without error, when the source file is not on disk.
    pub async fn transcode_source(&self, source: AssetId) -> Result<Vec<TranscodeJob>> {
        let info = self.source_info(source)?;
        let path = self.data_dir.join(&info.filename);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let err = Error::missing_source(path.display());
            warn!(source = %source, original_id = %info.original_id, error = %err, "Skipping transcode");
            return Ok(Vec::new());
        }

        let mut height = info.height;
        if let (AssetId::Video(id), 0) = (source, height) {
            let metrics = self.prober.probe(&path, MediaKind::Video).await?;
            debug!(video_id = %id, height = metrics.height, "Backfilled source dimensions");
            let conn = get_conn(&self.pool)?;
            media::update_video_dimensions(&conn, id, metrics.width, metrics.height, metrics.fps)?;
            height = metrics.height;
        }

        let kinds = self.plan(source, height)?;
        let jobs = {
            let mut conn = get_conn(&self.pool)?;
            let tx = conn
                .transaction()
                .map_err(|e| Error::database(e.to_string()))?;
            let jobs = kinds
                .into_iter()
                .map(|kind| transcode_jobs::enqueue(&tx, info.original_id, source, kind))
                .collect::<Result<Vec<_>>>()?;
            tx.commit().map_err(|e| Error::database(e.to_string()))?;
            jobs
        };

        info!(
            source = %source,
            original_id = %info.original_id,
            source_height = height,
            jobs = jobs.len(),
            "Enqueued renditions"
        );
        self.wake();

        Ok(jobs)
    }

    /// Orchestrate the downloaded source of an Original, preferring video.
    pub async fn transcode_original(&self, original_id: OriginalId) -> Result<Vec<TranscodeJob>> {
        let source = self.original_source(original_id, None)?;
        self.transcode_source(source).await
    }

    /// Enqueue one explicitly requested rendition of an Original's source.
    pub fn request_rendition(
        &self,
        original_id: OriginalId,
        kind: TranscodeKind,
    ) -> Result<TranscodeJob> {
        let source = self.original_source(original_id, Some(kind.src_kind()))?;
        let job = {
            let conn = get_conn(&self.pool)?;
            transcode_jobs::enqueue(&conn, original_id, source, kind)?
        };

        info!(job_id = %job.id, original_id = %original_id, %kind, "Rendition requested");
        self.wake();

        Ok(job)
    }

    /// The downloaded (not transcoded) asset of an Original, optionally
    /// restricted to one media kind.
    fn original_source(
        &self,
        original_id: OriginalId,
        kind: Option<MediaKind>,
    ) -> Result<AssetId> {
        let conn = get_conn(&self.pool)?;
        if originals::get_original(&conn, original_id)?.is_none() {
            return Err(Error::not_found("original", original_id));
        }

        if kind != Some(MediaKind::Audio) {
            let video = media::list_videos_for_original(&conn, original_id)?
                .into_iter()
                .find(|v| v.source == AssetSource::Original);
            if let Some(video) = video {
                return Ok(AssetId::Video(video.id));
            }
        }
        if kind != Some(MediaKind::Video) {
            let audio = media::list_audios_for_original(&conn, original_id)?
                .into_iter()
                .find(|a| a.source == AssetSource::Original);
            if let Some(audio) = audio {
                return Ok(AssetId::Audio(audio.id));
            }
        }

        Err(Error::not_found("source asset of original", original_id))
    }

    fn wake(&self) {
        if let Some(handle) = &self.scheduler {
            handle.wake();
        }
    }
}
