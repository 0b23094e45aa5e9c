use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::{ProbeConfig, ToolsConfig};
use crate::error::{ProbeError, Result};
use crate::media::types::MediaInfo;
use crate::tool;

/// Inspects media files with `ffprobe`
#[derive(Debug, Clone)]
pub struct MediaProber {
    ffprobe: PathBuf,
    min_file_size: u64,
    min_duration: f64,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<i64>,
    #[serde(default)]
    height: Option<i64>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

impl FfprobeStream {
    fn positive_duration(&self) -> Option<f64> {
        self.duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| *d > 0.0)
    }
}

impl MediaProber {
    pub fn new(tools: &ToolsConfig, probe: &ProbeConfig) -> Self {
        Self {
            ffprobe: tools.ffprobe.clone(),
            min_file_size: probe.min_file_size,
            min_duration: probe.min_duration,
        }
    }

    /// Probe `path`, returning its metadata or the reason it is unusable
    ///
    /// Problems with the file are `ProbeError`s. A missing or unrunnable
    /// ffprobe is an engine failure and propagates as such.
    pub async fn probe<P: AsRef<Path>>(&self, path: P) -> Result<MediaInfo> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        self.check_file(path)?;

        let mut args: Vec<OsString> = ["-v", "warning", "-print_format", "json", "-show_format", "-show_streams"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(path.as_os_str().to_owned());

        let output = tool::run(&self.ffprobe, args).await?;

        if !output.success {
            return Err(ProbeError::ToolFailed {
                path: path_str,
                stderr: excerpt(&output.stderr, 300),
            }
            .into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        let info = parse_ffprobe_json(&json).map_err(|reason| ProbeError::ParseFailed {
            path: path_str.clone(),
            reason,
        })?;

        if info.duration <= self.min_duration {
            return Err(ProbeError::InvalidDuration {
                path: path_str,
                duration: info.duration,
            }
            .into());
        }

        debug!(
            "Probed {}: {:.2}s, {:?}x{:?}, audio: {}",
            path_str, info.duration, info.width, info.height, info.has_audio
        );
        Ok(info)
    }

    /// Existence and minimum size check shared by every input kind
    pub fn check_file(&self, path: &Path) -> std::result::Result<u64, ProbeError> {
        let metadata = std::fs::metadata(path).map_err(|_| ProbeError::NotFound {
            path: path.display().to_string(),
        })?;

        if !metadata.is_file() {
            return Err(ProbeError::NotFound {
                path: path.display().to_string(),
            });
        }

        let size = metadata.len();
        if size < self.min_file_size {
            return Err(ProbeError::TooSmall {
                path: path.display().to_string(),
                size,
            });
        }

        Ok(size)
    }
}

/// Extract duration, dimensions and audio presence from `ffprobe -print_format json`
///
/// Duration comes from the first video stream, then the first audio stream, then
/// the container, taking the first strictly positive value. A duration of zero is
/// returned when none is usable; callers apply their own threshold.
pub fn parse_ffprobe_json(json: &str) -> std::result::Result<MediaInfo, String> {
    let parsed: FfprobeOutput = serde_json::from_str(json).map_err(|e| e.to_string())?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let format_duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| *d > 0.0);

    let duration = video
        .and_then(FfprobeStream::positive_duration)
        .or_else(|| audio.and_then(FfprobeStream::positive_duration))
        .or(format_duration)
        .unwrap_or(0.0);

    let (width, height) = match video.map(|v| (v.width.unwrap_or(0), v.height.unwrap_or(0))) {
        Some((w, h)) if w > 0 && h > 0 => (u32::try_from(w).ok(), u32::try_from(h).ok()),
        _ => (None, None),
    };

    Ok(MediaInfo {
        duration,
        width,
        height,
        has_audio: audio.is_some(),
    })
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
