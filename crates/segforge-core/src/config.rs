//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! storage, session, segment and tool sections. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub segment: SegmentConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.storage.allowed_extensions.is_empty() {
            warnings.push("storage.allowed_extensions is empty; every upload will be rejected".into());
        }
        if self.storage.max_upload_bytes == 0 {
            warnings.push("storage.max_upload_bytes is 0; every upload will be rejected".into());
        }
        if self.sessions.default_part_duration_secs == 0 {
            warnings.push(
                "sessions.default_part_duration_secs is 0; callers must always supply a duration"
                    .into(),
            );
        }
        if self.sessions.idle_timeout_secs == 0 {
            warnings.push("sessions.idle_timeout_secs is 0; sessions expire immediately".into());
        }
        if self.sessions.cleanup_interval_secs == 0 {
            warnings.push("sessions.cleanup_interval_secs is 0; the expiry sweep is disabled".into());
        }
        if self.segment.max_concurrent == 0 {
            warnings.push("segment.max_concurrent is 0; 1 will be used".into());
        }
        if self.segment.engine_timeout_secs == 0 {
            warnings.push("segment.engine_timeout_secs is 0; every engine call will time out".into());
        }

        let valid_formats = ["u8", "s16", "s32", "flt", "dbl", "u8p", "s16p", "s32p", "fltp", "dblp"];
        if !valid_formats.contains(&self.segment.audio_sample_format.as_str()) {
            warnings.push(format!(
                "segment.audio_sample_format '{}' is not a recognized sample format (valid: {})",
                self.segment.audio_sample_format,
                valid_formats.join(", ")
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where session files live and what uploads are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Accepted upload extensions, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_upload_bytes: 100 * 1024 * 1024,
            allowed_extensions: vec!["mp4".into(), "mov".into(), "avi".into()],
        }
    }
}

impl StorageConfig {
    /// Create the upload and output directories if they do not exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds without a transition after which a session is reclaimed.
    pub idle_timeout_secs: u64,
    /// How often the expiry sweep runs.
    pub cleanup_interval_secs: u64,
    /// Part duration used when the caller supplies none.
    pub default_part_duration_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            cleanup_interval_secs: 60,
            default_part_duration_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn default_part_duration(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.default_part_duration_secs)
    }
}

/// What to do when an input has no audio stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAudioPolicy {
    /// Produce video-only segments.
    #[default]
    VideoOnly,
    /// Reject the input with a probe error.
    Fail,
}

/// Segment output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Container extension of each part (also selects the muxer).
    pub container: String,
    pub audio_sample_format: String,
    pub audio_sample_rate: u32,
    pub audio_channel_layout: String,
    /// Upper bound on windows transcoded at once, across a session's inputs.
    pub max_concurrent: usize,
    /// Budget for one probe or transcode call.
    pub engine_timeout_secs: u64,
    pub missing_audio: MissingAudioPolicy,
}

fn default_max_concurrent() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            container: "mp4".into(),
            audio_sample_format: "fltp".into(),
            audio_sample_rate: 44_100,
            audio_channel_layout: "stereo".into(),
            max_concurrent: default_max_concurrent(),
            engine_timeout_secs: 600,
            missing_audio: MissingAudioPolicy::default(),
        }
    }
}

impl SegmentConfig {
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Concurrency limit, never below 1.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}
