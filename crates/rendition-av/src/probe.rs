//! ffprobe-based metrics extraction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rendition_common::{Error, MediaKind, Result};
use serde::Deserialize;

use crate::command::ToolCommand;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

/// Metrics describing one media file.
///
/// Fields that do not apply to the probed kind are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetrics {
    pub duration: f64,
    pub codec: String,
    pub container: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub kbps: u32,
}

/// Runs ffprobe against files in storage.
#[derive(Debug, Clone)]
pub struct Prober {
    program: PathBuf,
    timeout: Duration,
}

impl Prober {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Probe the single `kind` stream of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Probe`] if ffprobe fails, its output cannot be
    /// parsed, or the file does not contain exactly one `kind` stream.
    pub async fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaMetrics> {
        let selector = match kind {
            MediaKind::Video => "v",
            MediaKind::Audio => "a",
        };

        let output = ToolCommand::new(self.program.clone())
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                selector,
            ])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await
            .map_err(|e| Error::probe(e.to_string()))?;

        parse_ffprobe_json(&output.stdout, kind)
    }
}

/// Interpret ffprobe's JSON for a file expected to hold one `kind` stream.
pub fn parse_ffprobe_json(json: &str, kind: MediaKind) -> Result<MediaMetrics> {
    let parsed: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::probe(format!("invalid ffprobe output: {e}")))?;

    let [stream] = parsed.streams.as_slice() else {
        return Err(Error::probe(format!(
            "expected exactly one {kind} stream, found {}",
            parsed.streams.len()
        )));
    };

    let format = parsed.format.as_ref();
    let duration = stream
        .duration
        .as_deref()
        .or_else(|| format.and_then(|f| f.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut metrics = MediaMetrics {
        duration,
        codec: stream.codec_name.clone().unwrap_or_default(),
        container: format.map(|f| f.format_name.clone()).unwrap_or_default(),
        ..MediaMetrics::default()
    };

    match kind {
        MediaKind::Video => {
            metrics.width = stream.width.unwrap_or(0);
            metrics.height = stream.height.unwrap_or(0);
            metrics.fps = stream
                .r_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .unwrap_or(0.0);
        }
        MediaKind::Audio => {
            // stream bitrate is absent for some containers; fall back to the
            // container's overall rate
            let bps = stream
                .bit_rate
                .as_deref()
                .or_else(|| format.and_then(|f| f.bit_rate.as_deref()))
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            metrics.kbps = u32::try_from(bps / 1000).unwrap_or(u32::MAX);
        }
    }

    Ok(metrics)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
