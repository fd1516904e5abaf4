//! Segmentation planning.
//!
//! [`plan`] turns a probed duration and a part length into the ordered list of
//! windows the executor materializes. It performs no I/O.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

use crate::media::MAX_DURATION_SECS;

/// One slice of an input's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentWindow {
    /// 0-based position in the plan.
    pub index: usize,
    /// Start offset in seconds.
    pub start_secs: f64,
    /// Requested length in seconds. The last window may ask for more than
    /// remains; the engine clips rather than pads.
    pub length_secs: u32,
}

impl SegmentWindow {
    /// Seconds of the source this window actually covers.
    pub fn effective_length(&self, total_secs: f64) -> f64 {
        (total_secs - self.start_secs)
            .min(f64::from(self.length_secs))
            .max(0.0)
    }
}

/// Compute the windows covering `[0, total_secs)` in steps of `part`.
///
/// Windows start at 0 and advance by `part` while the offset is strictly below
/// `total_secs`, so the count is `ceil(total_secs / part)`. A zero (or
/// non-finite, or negative) duration yields an empty plan; callers treat that
/// as a no-op. Durations past [`MAX_DURATION_SECS`] are planned only up to
/// that bound; callers reject them before planning.
pub fn plan(total_secs: f64, part: NonZeroU32) -> Vec<SegmentWindow> {
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Vec::new();
    }
    let total_secs = total_secs.min(MAX_DURATION_SECS);

    let step = f64::from(part.get());
    let mut windows = Vec::with_capacity((total_secs / step).ceil() as usize);

    let mut index = 0usize;
    loop {
        let start_secs = index as f64 * step;
        if start_secs >= total_secs {
            break;
        }
        windows.push(SegmentWindow {
            index,
            start_secs,
            length_secs: part.get(),
        });
        index += 1;
    }

    windows
}
