//! Rendition - durable transcode job scheduling for downloaded media.
//!
//! This library crate exposes the core services for the binary and for
//! integration testing.

pub mod config;
pub mod context;
pub mod events;
pub mod import;
pub mod reconcile;
pub mod status;
pub mod transcode;
