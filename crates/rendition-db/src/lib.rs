//! rendition-db: durable storage for originals, media rows and transcode jobs.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, typed models, and query modules. The
//! [`queries::transcode_jobs`] module is the job record store the scheduler
//! claims work from.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
