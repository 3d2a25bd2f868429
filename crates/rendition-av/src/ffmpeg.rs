//! ffmpeg argument builders and the encoder wrapper.
//!
//! Video renditions are H.264 in MP4 with AAC audio; audio renditions are
//! MP3. The scale filter keeps the aspect ratio with `-2` so the computed
//! width is always even, which libx264 requires.

use std::path::{Path, PathBuf};

use rendition_common::{Error, Result, TranscodeKind};
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// Encoder quality knobs for video renditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// x264 constant rate factor.
    pub crf: u8,
    /// x264 speed preset.
    pub preset: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "veryfast".to_string(),
        }
    }
}

/// AAC bitrate (kbps) paired with a video rendition of `height` pixels.
pub fn audio_bitrate_for_height(height: u32) -> u32 {
    match height {
        0..=144 => 64,
        145..=480 => 96,
        481..=719 => 128,
        _ => 160,
    }
}

/// File extension of the output produced for `kind`.
pub fn output_extension(kind: &TranscodeKind) -> &'static str {
    match kind {
        TranscodeKind::VideoToVideo { .. } => "mp4",
        TranscodeKind::VideoToAudio { .. } | TranscodeKind::AudioToAudio { .. } => "mp3",
    }
}

/// Build the ffmpeg arguments producing `kind` from `input` into `output`.
pub fn rendition_args(
    kind: &TranscodeKind,
    input: &Path,
    output: &Path,
    settings: &EncodeSettings,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    match *kind {
        TranscodeKind::VideoToVideo { height, fps } => {
            let mut filter = format!("scale=-2:{height}");
            if let Some(fps) = fps {
                filter.push_str(&format!(",fps={fps}"));
            }
            args.extend([
                "-vf".to_string(),
                filter,
                "-c:v".to_string(),
                "libx264".to_string(),
                "-crf".to_string(),
                settings.crf.to_string(),
                "-preset".to_string(),
                settings.preset.clone(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                format!("{}k", audio_bitrate_for_height(height)),
            ]);
        }
        TranscodeKind::VideoToAudio { kbps } | TranscodeKind::AudioToAudio { kbps } => {
            args.extend([
                "-vn".to_string(),
                "-c:a".to_string(),
                "libmp3lame".to_string(),
                "-b:a".to_string(),
                format!("{kbps}k"),
            ]);
        }
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Runs ffmpeg to produce renditions.
#[derive(Debug, Clone)]
pub struct Encoder {
    program: PathBuf,
    settings: EncodeSettings,
}

impl Encoder {
    pub fn new(program: PathBuf, settings: EncodeSettings) -> Self {
        Self { program, settings }
    }

    /// The command that would produce `kind` from `input` into `output`.
    pub fn command(&self, kind: &TranscodeKind, input: &Path, output: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(rendition_args(kind, input, output, &self.settings));
        cmd
    }

    /// Encode `input` into `output`.
    ///
    /// Success means the encoder exited zero and `output` exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the encoder cannot be started, exits
    /// non-zero, or leaves no output file behind.
    pub async fn encode(&self, kind: &TranscodeKind, input: &Path, output: &Path) -> Result<()> {
        let result = self
            .command(kind, input, output)
            .output()
            .await
            .map_err(|e| Error::encode(e.to_string()))?;

        if !result.status.success() {
            return Err(Error::encode(format!(
                "encoder exited with {}: {}",
                result.status,
                stderr_tail(&result.stderr, 5)
            )));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(Error::encode(format!(
                "encoder produced no output at {}",
                output.display()
            )));
        }

        Ok(())
    }
}

/// Last `n` non-empty lines of ffmpeg's (very chatty) stderr.
fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
