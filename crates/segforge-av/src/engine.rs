//! The narrow interface segforge uses to reach the media engine.
//!
//! Everything above this trait treats the engine as a black box that can
//! report a file's duration/streams and cut one window into a new file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use segforge_core::config::SegmentConfig;
use segforge_core::{MediaDescriptor, Result};

/// Fixed audio format every segment is resampled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_format: String,
    pub sample_rate: u32,
    pub channel_layout: String,
}

impl AudioFormat {
    pub fn from_config(config: &SegmentConfig) -> Self {
        Self {
            sample_format: config.audio_sample_format.clone(),
            sample_rate: config.audio_sample_rate,
            channel_layout: config.audio_channel_layout.clone(),
        }
    }

    /// ffmpeg `aformat` filter expression for this format.
    pub fn aformat_filter(&self) -> String {
        format!(
            "aformat=sample_fmts={}:sample_rates={}:channel_layouts={}",
            self.sample_format, self.sample_rate, self.channel_layout
        )
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::from_config(&SegmentConfig::default())
    }
}

/// One window to cut out of an input.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    pub input: PathBuf,
    pub start_secs: f64,
    /// Upper bound on the output length; the engine clips at end of input.
    pub max_duration_secs: u32,
    /// Whether an audio stream should be carried into the output.
    pub include_audio: bool,
    /// Destination; overwritten if it exists.
    pub output: PathBuf,
}

/// A media engine capable of probing inputs and materializing segments.
///
/// Implementations must be safe to share across tasks. Futures returned by
/// [`MediaEngine::transcode_segment`] may be dropped at any point (timeout or
/// cancellation); implementations must stop writing when that happens.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Human-readable name identifying this engine implementation.
    fn name(&self) -> &'static str;

    /// Report duration and stream composition of `path`.
    ///
    /// Fails with [`segforge_core::Error::Probe`] when the file is unreadable,
    /// has no parseable duration, or has no video stream.
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor>;

    /// Cut `request` into `request.output`.
    ///
    /// Engine failures surface as [`segforge_core::Error::Transcode`] carrying
    /// the engine's diagnostics.
    async fn transcode_segment(&self, request: &SegmentRequest) -> Result<()>;
}
