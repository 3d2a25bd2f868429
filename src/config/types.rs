use rendition_av::EncodeSettings;
use rendition_db::queries::transcode_jobs::JobOrder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the SQLite database inside the data directory.
pub const DEFAULT_DB_FILE: &str = "rendition.db";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding source files, renditions and (by default) the database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Explicit database location; defaults to `<data_dir>/rendition.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub renditions: RenditionConfig,

    #[serde(default)]
    pub encoder: EncodeSettings,

    #[serde(default)]
    pub events: EventsConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            tools: ToolsConfig::default(),
            scheduler: SchedulerConfig::default(),
            renditions: RenditionConfig::default(),
            encoder: EncodeSettings::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    /// Where the SQLite database lives.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_DB_FILE))
    }

    /// Dispatch priority derived from the reference renditions.
    pub fn job_order(&self) -> JobOrder {
        JobOrder {
            reference_video_height: self.scheduler.reference_video_height,
            reference_audio_kbps: self.scheduler.reference_audio_kbps,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound on a single ffprobe run (default: 60)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn ffmpeg(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn ffprobe(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Maximum number of encodes running at once (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Seconds between scheduling passes (default: 10)
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Video height dispatched ahead of other renditions (default: 480)
    #[serde(default = "default_reference_video_height")]
    pub reference_video_height: u32,

    /// Audio bitrate dispatched ahead of other renditions (default: 96)
    #[serde(default = "default_reference_audio_kbps")]
    pub reference_audio_kbps: u32,
}

fn default_max_concurrent() -> usize {
    2
}
fn default_tick_secs() -> u64 {
    10
}
fn default_reference_video_height() -> u32 {
    480
}
fn default_reference_audio_kbps() -> u32 {
    96
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tick_secs: default_tick_secs(),
            reference_video_height: default_reference_video_height(),
            reference_audio_kbps: default_reference_audio_kbps(),
        }
    }
}

/// How many video renditions a source produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LadderPolicy {
    /// Only the largest ladder height not exceeding the source height.
    #[default]
    BestFit,
    /// Every ladder height not exceeding the source height.
    FullLadder,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenditionConfig {
    /// Target heights, kept sorted in descending order.
    #[serde(default = "default_ladder")]
    pub ladder: Vec<u32>,

    #[serde(default)]
    pub policy: LadderPolicy,

    /// Bitrate of the extracted audio rendition (default: 96)
    #[serde(default = "default_audio_kbps")]
    pub audio_kbps: u32,
}

fn default_ladder() -> Vec<u32> {
    vec![1080, 720, 480, 360, 240, 144]
}
fn default_audio_kbps() -> u32 {
    96
}

impl Default for RenditionConfig {
    fn default() -> Self {
        Self {
            ladder: default_ladder(),
            policy: LadderPolicy::default(),
            audio_kbps: default_audio_kbps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Queue depth per subscriber before it is dropped (default: 64)
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_subscriber_capacity() -> usize {
    64
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}
