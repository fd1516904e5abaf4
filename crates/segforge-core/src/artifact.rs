//! Files a session owns: its inputs, produced segments, and the archive.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::SessionId;

/// A registered input file together with its position in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef {
    /// 0-based position in registration order.
    pub index: usize,
    /// Path of the persisted upload.
    pub path: PathBuf,
}

/// One materialized segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentArtifact {
    pub session_id: SessionId,
    /// The input this segment was cut from.
    pub input: InputRef,
    /// Index of the window inside its input's plan.
    pub window_index: usize,
    pub path: PathBuf,
    /// Size of the output file in bytes.
    pub byte_size: u64,
}

impl SegmentArtifact {
    /// Archive member name: the output's base file name.
    pub fn member_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Key giving the deterministic (input, window) packing order.
    pub fn order_key(&self) -> (usize, usize) {
        (self.input.index, self.window_index)
    }
}

/// The single packaged file bundling a session's segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub session_id: SessionId,
    pub path: PathBuf,
    /// Member names in archive order.
    pub members: Vec<String>,
}
