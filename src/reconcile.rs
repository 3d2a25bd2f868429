//! Keeps each Original's `transcoding` status in line with its live jobs.
//!
//! An Original is `transcoding` exactly when at least one pending or running
//! job references it. A sweep compares the two sets and moves the
//! difference in each direction through the [`StatusSetter`].

use std::collections::HashSet;
use std::fmt;

use rendition_common::{OriginalId, OriginalStatus, Result};
use rendition_db::queries::{originals, transcode_jobs};
use rendition_db::{get_conn, DbPool};
use tokio::sync::Mutex;

use crate::status::StatusSetter;

/// What a sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub marked_transcoding: Vec<OriginalId>,
    pub marked_completed: Vec<OriginalId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.marked_transcoding.is_empty() && self.marked_completed.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} marked transcoding, {} marked completed",
            self.marked_transcoding.len(),
            self.marked_completed.len()
        )
    }
}

pub struct Reconciler {
    pool: DbPool,
    setter: StatusSetter,
    sweep_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(pool: DbPool, setter: StatusSetter) -> Self {
        Self {
            pool,
            setter,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Run one sweep over every Original.
    ///
    /// Concurrent callers queue behind each other, so a transition is only
    /// ever applied (and published) once.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let _guard = self.sweep_lock.lock().await;
        self.sweep()
    }

    fn sweep(&self) -> Result<ReconcileReport> {
        let (live, transcoding) = {
            let conn = get_conn(&self.pool)?;
            let live: HashSet<OriginalId> =
                transcode_jobs::live_original_ids(&conn)?.into_iter().collect();
            let transcoding: HashSet<OriginalId> =
                originals::ids_with_status(&conn, OriginalStatus::Transcoding)?
                    .into_iter()
                    .collect();
            (live, transcoding)
        };

        let mut report = ReconcileReport {
            marked_transcoding: live.difference(&transcoding).copied().collect(),
            marked_completed: transcoding.difference(&live).copied().collect(),
        };
        report.marked_transcoding.sort_unstable();
        report.marked_completed.sort_unstable();

        for &id in &report.marked_transcoding {
            self.setter
                .set_original_status(id, OriginalStatus::Transcoding)?;
        }
        for &id in &report.marked_completed {
            self.setter.set_original_status(id, OriginalStatus::Completed)?;
        }

        if !report.is_empty() {
            tracing::debug!(%report, "Reconciled original statuses");
        }

        Ok(report)
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Broadcaster;
    use rendition_common::{AssetId, AssetSource, JobStatus, OwnerId, TranscodeKind};
    use rendition_db::init_memory_pool;
    use rendition_db::models::{NewOriginal, NewVideo};
    use rendition_db::queries::media;

    fn seed(pool: &DbPool) -> (OriginalId, AssetId) {
        let conn = get_conn(pool).unwrap();
        let original = originals::create_original(
            &conn,
            &NewOriginal {
                owner_id: OwnerId::from(1),
                url: String::new(),
                title: "t".into(),
                audio: true,
                video: true,
            },
        )
        .unwrap();
        let video = media::create_video(
            &conn,
            &NewVideo {
                original_id: original.id,
                source: AssetSource::Original,
                filename: "src.mp4".into(),
                size: 1,
                duration: 1.0,
                codec: "h264".into(),
                container: "mp4".into(),
                width: 1920,
                height: 1080,
                fps: 30.0,
            },
        )
        .unwrap();
        (original.id, AssetId::Video(video.id))
    }

    fn status_of(pool: &DbPool, id: OriginalId) -> OriginalStatus {
        let conn = get_conn(pool).unwrap();
        originals::get_original(&conn, id).unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_live_job_marks_transcoding_then_completed() {
        let pool = init_memory_pool().unwrap();
        let (original_id, source) = seed(&pool);
        let reconciler = Reconciler::new(
            pool.clone(),
            StatusSetter::new(pool.clone(), Broadcaster::new(8)),
        );

        let job = {
            let conn = get_conn(&pool).unwrap();
            transcode_jobs::enqueue(
                &conn,
                original_id,
                source,
                TranscodeKind::video(480, None).unwrap(),
            )
            .unwrap()
        };

        let report = reconciler.reconcile_all().await.unwrap();
        assert_eq!(report.marked_transcoding, vec![original_id]);
        assert_eq!(status_of(&pool, original_id), OriginalStatus::Transcoding);

        get_conn(&pool)
            .and_then(|conn| transcode_jobs::delete(&conn, job.id))
            .unwrap();
        let report = reconciler.reconcile_all().await.unwrap();
        assert_eq!(report.marked_completed, vec![original_id]);
        assert_eq!(status_of(&pool, original_id), OriginalStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_jobs_are_not_live() {
        let pool = init_memory_pool().unwrap();
        let (original_id, source) = seed(&pool);
        let reconciler = Reconciler::new(
            pool.clone(),
            StatusSetter::new(pool.clone(), Broadcaster::new(8)),
        );

        {
            let conn = get_conn(&pool).unwrap();
            let job = transcode_jobs::enqueue(
                &conn,
                original_id,
                source,
                TranscodeKind::video(480, None).unwrap(),
            )
            .unwrap();
            transcode_jobs::set_status(&conn, job.id, JobStatus::Running).unwrap();
        }
        reconciler.reconcile_all().await.unwrap();
        assert_eq!(status_of(&pool, original_id), OriginalStatus::Transcoding);

        {
            let conn = get_conn(&pool).unwrap();
            let job = transcode_jobs::list_for_original(&conn, original_id)
                .unwrap()
                .remove(0);
            transcode_jobs::mark_failed(&conn, job.id, "boom").unwrap();
        }
        reconciler.reconcile_all().await.unwrap();
        assert_eq!(status_of(&pool, original_id), OriginalStatus::Completed);
    }

    #[tokio::test]
    async fn test_untouched_originals_keep_their_status() {
        let pool = init_memory_pool().unwrap();
        let (original_id, _) = seed(&pool);
        let reconciler = Reconciler::new(
            pool.clone(),
            StatusSetter::new(pool.clone(), Broadcaster::new(8)),
        );

        let report = reconciler.reconcile_all().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(status_of(&pool, original_id), OriginalStatus::NotStarted);
    }
}
