//! Transcode job pipeline: planning, scheduling and execution.

pub mod executor;
pub mod orchestrator;
pub mod scheduler;

pub use executor::{JobExecutor, TranscodeExecutor};
pub use orchestrator::{plan_renditions, Orchestrator};
pub use scheduler::{PassReport, Scheduler, SchedulerHandle};
