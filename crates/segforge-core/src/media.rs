//! Probe results.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Longest input accepted for segmentation: one week.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// What the engine reports about an input file.
///
/// Read-only and never persisted beyond one processing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Path of the probed file.
    pub path: PathBuf,
    /// Total duration in seconds (finite, `>= 0`).
    pub duration_secs: f64,
    /// Whether the file carries a video stream.
    pub has_video: bool,
    /// Whether the file carries an audio stream.
    pub has_audio: bool,
}

impl MediaDescriptor {
    /// `true` when there is nothing to segment.
    pub fn is_empty(&self) -> bool {
        self.duration_secs <= 0.0
    }
}

/// Accept a probed duration for `path`.
///
/// Fails with [`Error::Probe`] unless `secs` is finite, non-negative and at
/// most [`MAX_DURATION_SECS`].
pub fn check_duration(path: &Path, secs: f64) -> Result<f64> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::Probe(format!(
            "{}: invalid duration {secs}",
            path.display()
        )));
    }
    if secs > MAX_DURATION_SECS {
        return Err(Error::Probe(format!(
            "{}: duration {secs}s exceeds the {MAX_DURATION_SECS}s limit",
            path.display()
        )));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_bounds() {
        let path = Path::new("/in/clip.mp4");
        assert_eq!(check_duration(path, 0.0).unwrap(), 0.0);
        assert_eq!(
            check_duration(path, MAX_DURATION_SECS).unwrap(),
            MAX_DURATION_SECS
        );
        for secs in [-0.5, f64::NAN, f64::INFINITY, MAX_DURATION_SECS + 1.0, 1e300] {
            assert!(
                matches!(check_duration(path, secs), Err(Error::Probe(_))),
                "{secs} should be rejected"
            );
        }
    }
}
