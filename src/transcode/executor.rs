//! Transcode job executor.
//!
//! Runs the encoder for one claimed job, registers the produced asset and
//! retires the job. Any other failure after the claim marks the job
//! `failed`, except storage errors, which leave it `running` for the
//! scheduler to requeue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rendition_av::ffmpeg::output_extension;
use rendition_av::{Encoder, MediaMetrics, Prober};
use rendition_common::{AssetId, AssetSource, Error, JobStatus, MediaKind, Result};
use rendition_db::models::{NewAudio, NewVideo, TranscodeJob};
use rendition_db::queries::{media, transcode_jobs};
use rendition_db::{get_conn, DbPool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;

/// Something that can carry out a claimed transcode job.
///
/// The scheduler only talks to this trait, so tests and alternative
/// back-ends can stand in for the ffmpeg executor.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Carry out `job` and return the id of the asset it produced.
    ///
    /// A retryable error means the job may still be `running`; the caller
    /// is expected to requeue it.
    async fn execute(&self, job: TranscodeJob) -> Result<AssetId>;
}

/// Executes jobs with ffmpeg and records the results.
#[derive(Debug, Clone)]
pub struct TranscodeExecutor {
    pool: DbPool,
    data_dir: PathBuf,
    encoder: Encoder,
    prober: Prober,
}

impl TranscodeExecutor {
    pub fn new(pool: DbPool, data_dir: PathBuf, encoder: Encoder, prober: Prober) -> Self {
        Self {
            pool,
            data_dir,
            encoder,
            prober,
        }
    }

    pub fn from_config(pool: DbPool, config: &Config) -> Self {
        Self::new(
            pool,
            config.data_dir.clone(),
            Encoder::new(config.tools.ffmpeg(), config.encoder.clone()),
            Prober::new(
                config.tools.ffprobe(),
                Duration::from_secs(config.tools.probe_timeout_secs),
            ),
        )
    }

    /// File name (relative to the data dir) of the job's source asset, or
    /// `None` if the row is gone.
    fn source_filename(&self, job: &TranscodeJob) -> Result<Option<String>> {
        let conn = get_conn(&self.pool)?;
        let filename = match job.source() {
            AssetId::Video(id) => media::get_video(&conn, id)?.map(|v| v.filename),
            AssetId::Audio(id) => media::get_audio(&conn, id)?.map(|a| a.filename),
        };
        Ok(filename)
    }

    /// Insert the asset row and delete the job in one transaction.
    fn record_asset(
        &self,
        job: &TranscodeJob,
        filename: String,
        size: i64,
        metrics: MediaMetrics,
    ) -> Result<AssetId> {
        let mut conn = get_conn(&self.pool)?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let asset = match job.kind.dst_kind() {
            MediaKind::Video => {
                let video = media::create_video(
                    &tx,
                    &NewVideo {
                        original_id: job.original_id,
                        source: AssetSource::Transcode,
                        filename,
                        size,
                        duration: metrics.duration,
                        codec: metrics.codec,
                        container: metrics.container,
                        width: metrics.width,
                        height: metrics.height,
                        fps: metrics.fps,
                    },
                )?;
                AssetId::Video(video.id)
            }
            MediaKind::Audio => {
                let audio = media::create_audio(
                    &tx,
                    &NewAudio {
                        original_id: job.original_id,
                        source: AssetSource::Transcode,
                        filename,
                        size,
                        duration: metrics.duration,
                        codec: metrics.codec,
                        container: metrics.container,
                        kbps: metrics.kbps,
                    },
                )?;
                AssetId::Audio(audio.id)
            }
        };
        transcode_jobs::delete(&tx, job.id)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(asset)
    }

    /// Everything between resolving the source and retiring the job.
    async fn transcode(
        &self,
        job: &TranscodeJob,
        src_filename: &str,
        out_filename: String,
        output: &Path,
    ) -> Result<AssetId> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let input = self.data_dir.join(src_filename);
        info!(
            job_id = %job.id,
            original_id = %job.original_id,
            kind = %job.kind,
            output = %out_filename,
            "Starting transcode"
        );
        self.encoder.encode(&job.kind, &input, output).await?;

        let size = tokio::fs::metadata(output).await?.len();
        let metrics = match self.prober.probe(output, job.kind.dst_kind()).await {
            Ok(m) => m,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Probe failed, recording zero metrics");
                MediaMetrics::default()
            }
        };
        debug!(job_id = %job.id, ?metrics, size, "Probed rendition");

        let size = i64::try_from(size).unwrap_or(i64::MAX);
        self.record_asset(job, out_filename, size, metrics)
    }
}

async fn remove_partial_output(output: &Path) {
    if let Err(e) = tokio::fs::remove_file(output).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %output.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[async_trait]
impl JobExecutor for TranscodeExecutor {
    async fn execute(&self, job: TranscodeJob) -> Result<AssetId> {
        let job_id = job.id;

        let conn = get_conn(&self.pool)?;
        transcode_jobs::set_status(&conn, job_id, JobStatus::Running)?;
        drop(conn);

        let Some(src_filename) = self.source_filename(&job)? else {
            warn!(job_id = %job_id, source = %job.source(), "Source asset no longer exists, dropping job");
            let conn = get_conn(&self.pool)?;
            transcode_jobs::delete(&conn, job_id)?;
            return Err(Error::missing_source(job.source()));
        };

        let out_filename = format!("{}.{}", Uuid::new_v4(), output_extension(&job.kind));
        let output = self.data_dir.join(&out_filename);

        match self.transcode(&job, &src_filename, out_filename, &output).await {
            Ok(asset) => {
                info!(job_id = %job_id, asset = %asset, "Transcode completed");
                Ok(asset)
            }
            Err(e) => {
                remove_partial_output(&output).await;
                if e.is_retryable() {
                    warn!(job_id = %job_id, error = %e, "Storage error, job left for requeue");
                    return Err(e);
                }

                error!(job_id = %job_id, error = %e, "Transcode failed");
                let conn = get_conn(&self.pool)?;
                transcode_jobs::mark_failed(&conn, job_id, &e.to_string())?;
                Err(e)
            }
        }
    }
}
