//! Video probing and thumbnail extraction
//!
//! Duration and dimensions come from `ffprobe`, representative frames from
//! `ffmpeg`. When the tools are missing or fail, probing falls back to
//! [`VideoInfo::FALLBACK`] so a publish can still proceed.

use crate::config::UploadSettings;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Duration and frame size of a video file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    pub const FALLBACK: VideoInfo = VideoInfo {
        duration_secs: 15.0,
        width: 1080,
        height: 1920,
    };

    /// Duration in whole milliseconds, as declared to the upload host
    pub fn duration_ms(&self) -> u64 {
        (self.duration_secs.max(0.0) * 1000.0).round() as u64
    }

    /// Duration in seconds, as declared to configure calls
    ///
    /// Derived from [`VideoInfo::duration_ms`] so both declarations agree.
    pub fn length_secs(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }
}

/// Source of video metadata and thumbnail frames
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Probe `path`; never fails, falling back to defaults
    async fn probe_video(&self, path: &Path) -> VideoInfo;

    /// Write one representative JPEG frame of `video` to `output`
    async fn extract_frame(&self, video: &Path, output: &Path) -> Result<()>;
}

/// [`MediaProbe`] backed by the ffmpeg command-line tools
#[derive(Debug, Clone)]
pub struct FfmpegProbe {
    ffprobe: String,
    ffmpeg: String,
    timeout: Duration,
}

impl FfmpegProbe {
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            ffprobe: settings.ffprobe_path.clone(),
            ffmpeg: settings.ffmpeg_path.clone(),
            timeout: Duration::from_secs(settings.probe_timeout_secs),
        }
    }

    async fn run_ffprobe(&self, path: &Path) -> Result<VideoInfo> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::internal(format!("{} timed out", self.ffprobe)))??;
        if !output.status.success() {
            return Err(Error::internal(format!(
                "{} exited with {}",
                self.ffprobe, output.status
            )));
        }

        parse_ffprobe(&output.stdout)
    }
}

#[async_trait]
impl MediaProbe for FfmpegProbe {
    async fn probe_video(&self, path: &Path) -> VideoInfo {
        match self.run_ffprobe(path).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    "Could not probe {}: {}; assuming {}x{} {}s",
                    path.display(),
                    e,
                    VideoInfo::FALLBACK.width,
                    VideoInfo::FALLBACK.height,
                    VideoInfo::FALLBACK.duration_secs
                );
                VideoInfo::FALLBACK
            }
        }
    }

    async fn extract_frame(&self, video: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-vframes", "1", "-q:v", "2"])
            .arg(output)
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::internal(format!("{} timed out", self.ffmpeg)))??;
        if !result.status.success() {
            return Err(Error::internal(format!(
                "{} exited with {}",
                self.ffmpeg, result.status
            )));
        }

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::internal("ffmpeg produced an empty frame"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeStream {
    codec_type: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_ffprobe(stdout: &[u8]) -> Result<VideoInfo> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| Error::internal("no video stream found"))?;
    let duration_secs = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| Error::internal("no usable duration"))?;

    if stream.width == 0 || stream.height == 0 {
        return Err(Error::internal("video stream without dimensions"));
    }

    Ok(VideoInfo {
        duration_secs,
        width: stream.width,
        height: stream.height,
    })
}
