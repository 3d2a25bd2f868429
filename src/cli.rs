use clap::{Parser, Subcommand};
use rendition_common::{JobStatus, MediaKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rendition")]
#[command(author, version, about = "Transcode job scheduler for downloaded media")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Run,

    /// Register a local media file as a downloaded source and plan its renditions
    Import {
        /// File to import
        #[arg(required = true)]
        file: PathBuf,

        /// Owner the new original belongs to
        #[arg(long, default_value = "1")]
        owner: i64,

        /// Whether the file is treated as video or audio
        #[arg(long, default_value = "video")]
        kind: MediaKind,
    },

    /// Plan renditions for an existing original
    Enqueue {
        /// Original id
        original_id: i64,
    },

    /// List transcode jobs
    Jobs {
        /// Only show jobs in this state (pending, running, failed)
        #[arg(long)]
        status: Option<JobStatus>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Return a failed job to the queue
    Retry {
        /// Job id
        job_id: i64,
    },

    /// Bring original statuses in line with outstanding jobs
    Reconcile,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
