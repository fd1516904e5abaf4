//! Materializes one segment window through the media engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use segforge_av::{MediaEngine, SegmentRequest};
use segforge_core::{Error, InputRef, Result, SegmentArtifact, SegmentWindow, SessionId, TranscodeCause};
use tokio_util::sync::CancellationToken;

/// Everything needed to cut one window out of one input.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub session_id: SessionId,
    pub input: InputRef,
    pub window: SegmentWindow,
    /// Carry the audio stream; false produces a video-only artifact.
    pub include_audio: bool,
    pub output: PathBuf,
}

/// Runs [`SegmentJob`]s against a [`MediaEngine`] with a per-call timeout.
#[derive(Clone)]
pub struct SegmentExecutor {
    engine: Arc<dyn MediaEngine>,
    timeout: Duration,
}

impl SegmentExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    /// Produce the artifact for `job`, overwriting any existing output.
    ///
    /// # Errors
    ///
    /// - [`Error::InputMissing`] if the input is gone when the call starts.
    /// - [`Error::Transcode`] with cause `Engine` (engine diagnostics),
    ///   `Timeout`, or `Cancelled` (when `cancel` fires first).
    pub async fn execute(&self, job: &SegmentJob, cancel: &CancellationToken) -> Result<SegmentArtifact> {
        match tokio::fs::metadata(&job.input.path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(Error::input_missing(job.input.path.clone())),
        }

        if let Some(parent) = job.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let request = SegmentRequest {
            input: job.input.path.clone(),
            start_secs: job.window.start_secs,
            max_duration_secs: job.window.length_secs,
            include_audio: job.include_audio,
            output: job.output.clone(),
        };

        tracing::debug!(
            session_id = %job.session_id,
            input = job.input.index,
            window = job.window.index,
            output = %job.output.display(),
            "Transcoding segment"
        );

        // Dropping the engine future on timeout/cancel kills the child process.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::transcode(TranscodeCause::Cancelled, "processing cancelled"));
            }
            r = tokio::time::timeout(self.timeout, self.engine.transcode_segment(&request)) => r,
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(classify(e)),
            Err(_elapsed) => {
                return Err(Error::transcode(
                    TranscodeCause::Timeout,
                    format!("{} exceeded {}s", self.engine.name(), self.timeout.as_secs()),
                ))
            }
        }

        let byte_size = match tokio::fs::metadata(&job.output).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(Error::transcode(
                    TranscodeCause::Engine,
                    format!("{} reported success but wrote no output", self.engine.name()),
                ))
            }
        };

        Ok(SegmentArtifact {
            session_id: job.session_id,
            input: job.input.clone(),
            window_index: job.window.index,
            path: job.output.clone(),
            byte_size,
        })
    }
}

/// Fold raw tool failures into the transcode taxonomy.
fn classify(err: Error) -> Error {
    match err {
        Error::Tool { message, .. } => Error::transcode(TranscodeCause::Engine, message),
        Error::ToolTimeout { tool, timeout } => Error::transcode(
            TranscodeCause::Timeout,
            format!("{tool} killed after {}s", timeout.as_secs()),
        ),
        other => other,
    }
}
