//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

use rendition_common::{Error, Result};

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the tool's version banner, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available by running it with `-version`, the flag
/// both ffmpeg and ffprobe understand.
///
/// # Example
///
/// ```no_run
/// use rendition_av::check_tool;
/// use std::path::Path;
///
/// let info = check_tool("ffprobe", Path::new("ffprobe"));
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, program: &Path) -> ToolInfo {
    match Command::new(program).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(program).ok(),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the encoder and the probe at their configured locations.
pub fn check_tools(ffmpeg: &Path, ffprobe: &Path) -> Vec<ToolInfo> {
    vec![check_tool("ffmpeg", ffmpeg), check_tool("ffprobe", ffprobe)]
}

/// Get the path to a tool, preferring a configured path over `PATH` lookup.
///
/// # Errors
///
/// Returns [`Error::Tool`] if the tool is neither at the configured path nor
/// on `PATH`.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Ok(found) = which::which(path) {
            return Ok(found);
        }
    }

    which::which(name).map_err(|_| Error::tool(name, "not found on PATH"))
}
