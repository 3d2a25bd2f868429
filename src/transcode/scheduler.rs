//! Bounded-concurrency job scheduler.
//!
//! A single selector claims pending jobs one at a time (each claim is an
//! atomic `pending -> running` update) and hands them to worker tasks. The
//! number of workers alive at once is capped by a semaphore whose owned
//! permit travels with the task, so it is released on success, failure and
//! panic alike. A worker that panics marks its job `failed`; one that hits
//! a storage error has its job returned to `pending` on the next tick.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rendition_common::{AssetId, Error, JobId, Result};
use rendition_db::queries::transcode_jobs::{self, JobOrder};
use rendition_db::{get_conn, DbPool};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::JobExecutor;
use crate::config::Config;
use crate::reconcile::Reconciler;

type WorkerOutput = (JobId, Result<AssetId>);

/// Counters for one scheduling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl PassReport {
    /// Count a finished worker. Returns the job to requeue if it stopped on
    /// a retryable error.
    fn record(&mut self, joined: std::result::Result<WorkerOutput, JoinError>) -> Option<JobId> {
        match joined {
            Ok((_, Ok(_))) => {
                self.succeeded += 1;
                None
            }
            Ok((job_id, Err(e))) => {
                self.failed += 1;
                e.is_retryable().then_some(job_id)
            }
            Err(e) => {
                error!(error = %e, "Transcode worker panicked");
                self.panicked += 1;
                None
            }
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dispatched, {} succeeded, {} failed, {} panicked",
            self.dispatched, self.succeeded, self.failed, self.panicked
        )
    }
}

/// Cheap handle for poking a running [`Scheduler`].
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle {
    notify: Arc<Notify>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an immediate dispatch, e.g. after new jobs were enqueued.
    ///
    /// Takes effect even while other jobs are running. A wake sent before
    /// the scheduler starts is kept until it does.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Stop claiming jobs. In-flight jobs run to completion.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct Scheduler {
    pool: DbPool,
    executor: Arc<dyn JobExecutor>,
    reconciler: Arc<Reconciler>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    order: JobOrder,
    tick: Duration,
    notify: Arc<Notify>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        pool: DbPool,
        executor: Arc<dyn JobExecutor>,
        reconciler: Arc<Reconciler>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let handle = SchedulerHandle::new();
        Self {
            pool,
            executor,
            reconciler,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            order: JobOrder::default(),
            tick: Duration::from_secs(10),
            notify: handle.notify,
            cancel: handle.cancel,
        }
    }

    pub fn from_config(
        pool: DbPool,
        executor: Arc<dyn JobExecutor>,
        reconciler: Arc<Reconciler>,
        config: &Config,
    ) -> Self {
        Self::new(pool, executor, reconciler, config.scheduler.max_concurrent)
            .with_order(config.job_order())
            .with_tick(Duration::from_secs(config.scheduler.tick_secs))
    }

    pub fn with_order(mut self, order: JobOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Answer wakes and shutdown requests sent through an existing handle.
    pub fn with_handle(mut self, handle: SchedulerHandle) -> Self {
        self.notify = handle.notify;
        self.cancel = handle.cancel;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            notify: self.notify.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Return jobs orphaned by a previous process to the queue.
    pub fn recover(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        let reset = transcode_jobs::reset_running_to_pending(&conn)?;
        if reset > 0 {
            warn!(count = reset, "Reset interrupted jobs to pending");
        }
        Ok(reset)
    }

    /// Recover, then keep every worker slot busy until shut down.
    ///
    /// Free slots are filled at startup, on every tick, on every wake and
    /// whenever a worker finishes. After shutdown, running jobs are awaited
    /// before this returns.
    pub async fn run(self) -> Result<()> {
        self.recover()?;

        info!(
            max_concurrent = self.max_concurrent,
            tick_secs = self.tick.as_secs(),
            "Scheduler started"
        );
        self.reconcile().await;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        let mut workers = JoinSet::new();
        let mut report = PassReport::default();
        let mut retry: Vec<JobId> = Vec::new();
        // set after a failed claim, cleared by the next tick or wake
        let mut held = false;

        loop {
            if !held {
                if let Err(e) = self.fill_slots(&mut workers, &mut report) {
                    error!(error = %e, "Dispatch failed, retrying next tick");
                    held = true;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    retry.retain(|&job_id| !self.requeue(job_id));
                    held = false;
                    self.reconcile().await;
                }
                _ = self.notify.notified() => {
                    debug!("Scheduler woken");
                    held = false;
                    self.reconcile().await;
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    retry.extend(report.record(joined));
                    if workers.is_empty() {
                        info!(%report, "Workers idle");
                        report = PassReport::default();
                    }
                }
            }
        }

        info!(running = workers.len(), "Scheduler stopping, waiting for running jobs");
        while let Some(joined) = workers.join_next().await {
            retry.extend(report.record(joined));
        }
        retry.retain(|&job_id| !self.requeue(job_id));
        self.reconcile().await;

        info!("Scheduler stopped");
        Ok(())
    }

    /// Drain every currently pending job, then wait for the workers this
    /// pass started.
    ///
    /// Reconciles before and after. A storage error stops dispatching but
    /// in-flight workers are still awaited before it is returned. Jobs that
    /// stopped on a storage error are requeued once the pass is over.
    pub async fn run_pass(&self) -> Result<PassReport> {
        self.reconciler.reconcile_all().await?;

        let mut report = PassReport::default();
        let mut workers = JoinSet::new();
        let mut retry = Vec::new();
        let dispatched = self.dispatch(&mut workers, &mut report, &mut retry).await;

        while let Some(joined) = workers.join_next().await {
            retry.extend(report.record(joined));
        }
        for job_id in retry {
            self.requeue(job_id);
        }

        self.reconciler.reconcile_all().await?;
        dispatched?;

        Ok(report)
    }

    async fn dispatch(
        &self,
        workers: &mut JoinSet<WorkerOutput>,
        report: &mut PassReport,
        retry: &mut Vec<JobId>,
    ) -> Result<()> {
        loop {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                permit = self.semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| Error::internal("scheduler semaphore closed"))?
                }
            };

            if !self.spawn_next(permit, workers, report)? {
                return Ok(());
            }

            while let Some(joined) = workers.try_join_next() {
                retry.extend(report.record(joined));
            }
        }
    }

    /// Claim jobs for every permit that is free right now.
    fn fill_slots(
        &self,
        workers: &mut JoinSet<WorkerOutput>,
        report: &mut PassReport,
    ) -> Result<()> {
        while !self.cancel.is_cancelled() {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                break;
            };
            if !self.spawn_next(permit, workers, report)? {
                break;
            }
        }
        Ok(())
    }

    /// Claim the next pending job and start a worker for it. Returns false
    /// when the queue is empty.
    fn spawn_next(
        &self,
        permit: OwnedSemaphorePermit,
        workers: &mut JoinSet<WorkerOutput>,
        report: &mut PassReport,
    ) -> Result<bool> {
        let claimed = {
            let conn = get_conn(&self.pool)?;
            transcode_jobs::claim_next_pending(&conn, self.order)?
        };
        let Some(job) = claimed else {
            return Ok(false);
        };

        report.dispatched += 1;
        debug!(job_id = %job.id, kind = %job.kind, "Dispatching job");

        let pool = self.pool.clone();
        let executor = self.executor.clone();
        let reconciler = self.reconciler.clone();
        workers.spawn(async move {
            let job_id = job.id;
            let outcome = AssertUnwindSafe(executor.execute(job)).catch_unwind().await;
            drop(permit);

            match &outcome {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(job_id = %job_id, error = %e, "Job did not complete"),
                Err(panic) => fail_panicked(&pool, job_id, &**panic),
            }
            if let Err(e) = reconciler.reconcile_all().await {
                warn!(job_id = %job_id, error = %e, "Reconcile after job failed");
            }

            match outcome {
                Ok(result) => (job_id, result),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        Ok(true)
    }

    /// Return a job that stopped on a storage error to `pending`. Returns
    /// false if the store is still unavailable.
    fn requeue(&self, job_id: JobId) -> bool {
        match get_conn(&self.pool).and_then(|conn| transcode_jobs::requeue(&conn, job_id)) {
            Ok(_) => {
                info!(job_id = %job_id, "Requeued job after storage error");
                true
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Requeue failed, retrying next tick");
                false
            }
        }
    }

    async fn reconcile(&self) {
        if let Err(e) = self.reconciler.reconcile_all().await {
            error!(error = %e, "Reconcile failed, retrying next tick");
        }
    }
}

fn fail_panicked(pool: &DbPool, job_id: JobId, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    error!(job_id = %job_id, panic = message, "Transcode worker panicked, marking job failed");

    let error = format!("worker panicked: {message}");
    if let Err(e) = get_conn(pool).and_then(|conn| transcode_jobs::mark_failed(&conn, job_id, &error)) {
        warn!(job_id = %job_id, error = %e, "Could not mark panicked job failed");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_concurrent", &self.max_concurrent)
            .field("order", &self.order)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
