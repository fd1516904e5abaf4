//! Unified error type for segforge.
//!
//! Every failure in the segmentation pipeline funnels into [`Error`], which
//! carries enough context for an HTTP layer to derive a status code via
//! [`Error::http_status`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Why a transcode did not produce its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeCause {
    /// The engine exited non-zero or reported a decode error.
    Engine,
    /// The engine call exceeded its time budget and was killed.
    Timeout,
    /// The run was cancelled (session reclaimed mid-flight or sibling failure).
    Cancelled,
}

impl fmt::Display for TranscodeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeCause::Engine => write!(f, "engine"),
            TranscodeCause::Timeout => write!(f, "timeout"),
            TranscodeCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Unified error type covering all failure modes in segforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller input failed validation; raised before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "session").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Media probing failed or the file is not a usable video.
    #[error("Probe error: {0}")]
    Probe(String),

    /// An input file vanished before the engine could read it.
    #[error("Input missing: {}", path.display())]
    InputMissing {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// The engine failed to materialize a segment.
    #[error("Transcode error ({cause}): {diagnostics}")]
    Transcode {
        /// Failure classification.
        cause: TranscodeCause,
        /// Engine diagnostics (stderr) or a short description.
        diagnostics: String,
    },

    /// Building the archive failed.
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// The archive was requested before processing completed.
    #[error("Archive not ready for session {0}")]
    NotReady(String),

    /// Another `process()` call holds the session.
    #[error("Session {0} is already processing")]
    AlreadyProcessing(String),

    /// An external tool could not be spawned or exited non-zero.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool exceeded its time budget.
    #[error("Tool error [{tool}]: timed out after {timeout:?}")]
    ToolTimeout {
        /// Name of the tool that was killed.
        tool: String,
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::NotReady(_) => 409,
            Error::AlreadyProcessing(_) => 409,
            Error::Probe(_) => 422,
            Error::InputMissing { .. } => 422,
            Error::Transcode { .. } => 502,
            Error::Tool { .. } => 502,
            Error::ToolTimeout { .. } => 504,
            Error::Packaging(_) => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable snake_case name of the variant, for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound { .. } => "not_found",
            Error::Probe(_) => "probe",
            Error::InputMissing { .. } => "input_missing",
            Error::Transcode { .. } => "transcode",
            Error::Packaging(_) => "packaging",
            Error::NotReady(_) => "not_ready",
            Error::AlreadyProcessing(_) => "already_processing",
            Error::Tool { .. } => "tool",
            Error::ToolTimeout { .. } => "tool_timeout",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transcode`].
    pub fn transcode(cause: TranscodeCause, diagnostics: impl Into<String>) -> Self {
        Error::Transcode {
            cause,
            diagnostics: diagnostics.into(),
        }
    }

    /// Convenience constructor for [`Error::InputMissing`].
    pub fn input_missing(path: impl Into<PathBuf>) -> Self {
        Error::InputMissing { path: path.into() }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
