//! ffmpeg/ffprobe-backed [`MediaEngine`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use segforge_core::config::SegmentConfig;
use segforge_core::{Error, MediaDescriptor, Result, TranscodeCause};

use crate::command::ToolCommand;
use crate::engine::{AudioFormat, MediaEngine, SegmentRequest};
use crate::probe::probe_with_ffprobe;
use crate::tools::ToolRegistry;

/// Video filter that rebases timestamps to zero.
const VIDEO_FILTER: &str = "setpts=PTS-STARTPTS";
/// Appended to the audio format filter so audio starts at zero alongside video.
const AUDIO_RESET: &str = "asetpts=PTS-STARTPTS";

/// Probe timeout; ffprobe only reads headers.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// A [`MediaEngine`] that shells out to the ffmpeg and ffprobe CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    audio: AudioFormat,
    timeout: Duration,
}

impl FfmpegEngine {
    /// Create an engine from explicit binary paths.
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf, config: &SegmentConfig) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            audio: AudioFormat::from_config(config),
            timeout: config.engine_timeout(),
        }
    }

    /// Create an engine from discovered tools.
    ///
    /// Fails with [`Error::Tool`] if ffmpeg or ffprobe is unavailable.
    pub fn from_registry(tools: &ToolRegistry, config: &SegmentConfig) -> Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?.path.clone();
        let ffprobe = tools.require("ffprobe")?.path.clone();
        Ok(Self::new(ffmpeg, ffprobe, config))
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaDescriptor> {
        probe_with_ffprobe(&self.ffprobe, path, PROBE_TIMEOUT).await
    }

    async fn transcode_segment(&self, request: &SegmentRequest) -> Result<()> {
        tracing::debug!(
            input = %request.input.display(),
            output = %request.output.display(),
            start = request.start_secs,
            length = request.max_duration_secs,
            audio = request.include_audio,
            "ffmpeg segment"
        );

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.timeout(self.timeout);
        cmd.args(segment_args(request, &self.audio));

        match cmd.execute().await {
            Ok(_) => Ok(()),
            Err(Error::Tool { message, .. }) => {
                Err(Error::transcode(TranscodeCause::Engine, message))
            }
            Err(Error::ToolTimeout { timeout, .. }) => Err(Error::transcode(
                TranscodeCause::Timeout,
                format!("ffmpeg killed after {}s", timeout.as_secs()),
            )),
            Err(other) => Err(other),
        }
    }
}

/// Build the ffmpeg argument list for one segment.
///
/// Seeking happens on the input side (`-ss`/`-t` before `-i`). Both streams
/// are rebased to zero and audio is resampled to `audio`; when
/// `include_audio` is false the output carries video only.
pub fn segment_args(request: &SegmentRequest, audio: &AudioFormat) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-nostdin".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format_secs(request.start_secs),
        "-t".into(),
        request.max_duration_secs.to_string(),
        "-i".into(),
        request.input.to_string_lossy().into_owned(),
    ];

    let graph = if request.include_audio {
        format!(
            "[0:v:0]{VIDEO_FILTER}[v];[0:a:0]{},{AUDIO_RESET}[a]",
            audio.aformat_filter()
        )
    } else {
        format!("[0:v:0]{VIDEO_FILTER}[v]")
    };
    args.push("-filter_complex".to_string());
    args.push(graph);

    let maps: &[&str] = if request.include_audio {
        &["-map", "[v]", "-map", "[a]"]
    } else {
        &["-map", "[v]", "-an"]
    };
    args.extend(maps.iter().map(|s| s.to_string()));

    if is_mp4_family(&request.output) {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }

    args.push(request.output.to_string_lossy().into_owned());
    args
}

fn format_secs(secs: f64) -> String {
    let s = format!("{secs:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn is_mp4_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "mp4" | "mov" | "m4v"))
        .unwrap_or(false)
}
