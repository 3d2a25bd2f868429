//! Domain enums shared across crates.
//!
//! All enums that are persisted render to the exact lowercase strings stored
//! in SQLite, so `Display` and `FromStr` must stay inverse to one another.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lifecycle status of an Original.
///
/// The retrieval pipeline drives the early states; the transcode core only
/// ever moves an Original into `Transcoding` or `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OriginalStatus {
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "metadata")]
    Metadata,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "download completed")]
    DownloadCompleted,
    #[serde(rename = "transcoding")]
    Transcoding,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl OriginalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Metadata => "metadata",
            Self::Downloading => "downloading",
            Self::DownloadCompleted => "download completed",
            Self::Transcoding => "transcoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OriginalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OriginalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not started" => Ok(Self::NotStarted),
            "metadata" => Ok(Self::Metadata),
            "downloading" => Ok(Self::Downloading),
            "download completed" => Ok(Self::DownloadCompleted),
            "transcoding" => Ok(Self::Transcoding),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid original status: {}", s)),
        }
    }
}

/// Status of a transcode job row.
///
/// There is no success state: a job that finishes is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
        }
    }

    /// Pending and running jobs keep their Original in `transcoding`.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Kind of a media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

/// Where a media asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    /// Supplied by the retrieval pipeline.
    Original,
    /// Produced by the transcode executor.
    Transcode,
}

impl AssetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Transcode => "transcode",
        }
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "transcode" => Ok(Self::Transcode),
            _ => Err(format!("Invalid asset source: {}", s)),
        }
    }
}

/// A requested conversion: the source kind, the target kind, and the
/// target parameters that apply to that target.
///
/// Audio can never be converted to video, so that pair is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscodeKind {
    VideoToVideo {
        /// Target height in pixels. Always even and non-zero.
        height: u32,
        /// Optional target frame rate.
        fps: Option<f64>,
    },
    VideoToAudio {
        kbps: u32,
    },
    AudioToAudio {
        kbps: u32,
    },
}

impl TranscodeKind {
    /// A video rendition of `height` pixels.
    pub fn video(height: u32, fps: Option<f64>) -> Result<Self> {
        validate_height(height)?;
        if let Some(fps) = fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(Error::invalid_input(format!(
                    "target frame rate must be positive, got {fps}"
                )));
            }
        }
        Ok(Self::VideoToVideo { height, fps })
    }

    /// An audio rendition at `kbps` extracted from a source of `src` kind.
    pub fn audio(src: MediaKind, kbps: u32) -> Result<Self> {
        validate_kbps(kbps)?;
        Ok(match src {
            MediaKind::Video => Self::VideoToAudio { kbps },
            MediaKind::Audio => Self::AudioToAudio { kbps },
        })
    }

    /// Rebuild a kind from its persisted columns.
    pub fn from_parts(
        src: MediaKind,
        dst: MediaKind,
        height: Option<u32>,
        fps: Option<f64>,
        kbps: Option<u32>,
    ) -> Result<Self> {
        match (src, dst) {
            (MediaKind::Video, MediaKind::Video) => {
                let height = height
                    .ok_or_else(|| Error::invalid_input("video rendition requires a height"))?;
                Self::video(height, fps)
            }
            (_, MediaKind::Audio) => {
                let kbps = kbps
                    .ok_or_else(|| Error::invalid_input("audio rendition requires a bitrate"))?;
                Self::audio(src, kbps)
            }
            (MediaKind::Audio, MediaKind::Video) => Err(Error::invalid_input(
                "audio sources cannot be transcoded to video",
            )),
        }
    }

    pub fn src_kind(&self) -> MediaKind {
        match self {
            Self::VideoToVideo { .. } | Self::VideoToAudio { .. } => MediaKind::Video,
            Self::AudioToAudio { .. } => MediaKind::Audio,
        }
    }

    pub fn dst_kind(&self) -> MediaKind {
        match self {
            Self::VideoToVideo { .. } => MediaKind::Video,
            Self::VideoToAudio { .. } | Self::AudioToAudio { .. } => MediaKind::Audio,
        }
    }

    pub fn height(&self) -> Option<u32> {
        match self {
            Self::VideoToVideo { height, .. } => Some(*height),
            _ => None,
        }
    }

    pub fn fps(&self) -> Option<f64> {
        match self {
            Self::VideoToVideo { fps, .. } => *fps,
            _ => None,
        }
    }

    pub fn kbps(&self) -> Option<u32> {
        match self {
            Self::VideoToAudio { kbps } | Self::AudioToAudio { kbps } => Some(*kbps),
            Self::VideoToVideo { .. } => None,
        }
    }
}

impl fmt::Display for TranscodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoToVideo {
                height,
                fps: Some(fps),
            } => write!(f, "video->video {height}p@{fps}"),
            Self::VideoToVideo { height, fps: None } => write!(f, "video->video {height}p"),
            Self::VideoToAudio { kbps } => write!(f, "video->audio {kbps}k"),
            Self::AudioToAudio { kbps } => write!(f, "audio->audio {kbps}k"),
        }
    }
}

fn validate_height(height: u32) -> Result<()> {
    if height == 0 {
        return Err(Error::invalid_input("target height must be non-zero"));
    }
    if height % 2 != 0 {
        return Err(Error::invalid_input(format!(
            "target height must be even, got {height}"
        )));
    }
    Ok(())
}

fn validate_kbps(kbps: u32) -> Result<()> {
    if kbps == 0 {
        return Err(Error::invalid_input("target bitrate must be non-zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_original_status_strings_match_storage() {
        for status in [
            OriginalStatus::NotStarted,
            OriginalStatus::Metadata,
            OriginalStatus::Downloading,
            OriginalStatus::DownloadCompleted,
            OriginalStatus::Transcoding,
            OriginalStatus::Completed,
            OriginalStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<OriginalStatus>(), Ok(status));
        }
        assert_eq!(OriginalStatus::NotStarted.to_string(), "not started");
        assert!("done".parse::<OriginalStatus>().is_err());
    }

    #[test]
    fn test_original_status_serde_uses_storage_strings() {
        let json = serde_json::to_string(&OriginalStatus::DownloadCompleted).unwrap();
        assert_eq!(json, "\"download completed\"");
    }

    #[test]
    fn test_job_status_liveness() {
        assert!(JobStatus::Pending.is_live());
        assert!(JobStatus::Running.is_live());
        assert!(!JobStatus::Failed.is_live());
        assert_eq!("running".parse::<JobStatus>(), Ok(JobStatus::Running));
        assert!("completed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_transcode_kind_accessors() {
        let kind = TranscodeKind::video(720, Some(30.0)).unwrap();
        assert_eq!(kind.src_kind(), MediaKind::Video);
        assert_eq!(kind.dst_kind(), MediaKind::Video);
        assert_eq!(kind.height(), Some(720));
        assert_eq!(kind.fps(), Some(30.0));
        assert_eq!(kind.kbps(), None);

        let kind = TranscodeKind::audio(MediaKind::Audio, 96).unwrap();
        assert_eq!(kind, TranscodeKind::AudioToAudio { kbps: 96 });
        assert_eq!(kind.src_kind(), MediaKind::Audio);
        assert_eq!(kind.dst_kind(), MediaKind::Audio);
    }

    #[test]
    fn test_transcode_kind_rejects_invalid_targets() {
        assert_matches!(TranscodeKind::video(0, None), Err(Error::InvalidInput(_)));
        assert_matches!(TranscodeKind::video(481, None), Err(Error::InvalidInput(_)));
        assert_matches!(
            TranscodeKind::video(480, Some(0.0)),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            TranscodeKind::audio(MediaKind::Video, 0),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn test_from_parts_rejects_audio_to_video() {
        let result =
            TranscodeKind::from_parts(MediaKind::Audio, MediaKind::Video, Some(480), None, None);
        assert_matches!(result, Err(Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_parts_requires_target_parameters() {
        assert_matches!(
            TranscodeKind::from_parts(MediaKind::Video, MediaKind::Video, None, None, Some(96)),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            TranscodeKind::from_parts(MediaKind::Video, MediaKind::Audio, None, None, Some(128)),
            Ok(TranscodeKind::VideoToAudio { kbps: 128 })
        );
    }

    #[test]
    fn test_transcode_kind_display() {
        let kind = TranscodeKind::video(240, None).unwrap();
        assert_eq!(kind.to_string(), "video->video 240p");
        let kind = TranscodeKind::audio(MediaKind::Video, 96).unwrap();
        assert_eq!(kind.to_string(), "video->audio 96k");
    }
}
