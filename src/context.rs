//! Process-wide services, constructed once and shared by handle.

use std::sync::Arc;

use rendition_common::Result;
use rendition_db::{init_pool, DbPool};

use crate::config::Config;
use crate::events::Broadcaster;
use crate::reconcile::Reconciler;
use crate::status::StatusSetter;
use crate::transcode::{Orchestrator, Scheduler, SchedulerHandle, TranscodeExecutor};

#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: DbPool,
    pub broadcaster: Broadcaster,
    pub status: StatusSetter,
    pub reconciler: Arc<Reconciler>,
    scheduler: SchedulerHandle,
}

impl AppContext {
    pub fn new(config: Config, pool: DbPool) -> Self {
        let broadcaster = Broadcaster::new(config.events.subscriber_capacity);
        let status = StatusSetter::new(pool.clone(), broadcaster.clone());
        let reconciler = Arc::new(Reconciler::new(pool.clone(), status.clone()));

        Self {
            config: Arc::new(config),
            pool,
            broadcaster,
            status,
            reconciler,
            scheduler: SchedulerHandle::new(),
        }
    }

    /// Open (creating and migrating if needed) the configured database.
    pub fn open(config: Config) -> Result<Self> {
        let db_path = config.database_path();
        tracing::info!(path = %db_path.display(), "Opening database");
        let pool = init_pool(&db_path)?;
        Ok(Self::new(config, pool))
    }

    pub fn executor(&self) -> TranscodeExecutor {
        TranscodeExecutor::from_config(self.pool.clone(), &self.config)
    }

    /// Handle shared by the scheduler and every orchestrator this context
    /// hands out.
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.clone()
    }

    /// A scheduler driving the ffmpeg executor.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from_config(
            self.pool.clone(),
            Arc::new(self.executor()),
            self.reconciler.clone(),
            &self.config,
        )
        .with_handle(self.scheduler_handle())
    }

    /// An orchestrator that wakes the scheduler whenever it enqueues.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::from_config(self.pool.clone(), &self.config)
            .with_scheduler(self.scheduler_handle())
    }
}
