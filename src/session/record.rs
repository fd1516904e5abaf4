//! Per-session bookkeeping owned by the [`SessionManager`](super::SessionManager).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use segforge_core::{Archive, InputRef, SegmentArtifact, SessionId};

/// Where a session sits in its lifecycle. A session without a record is
/// EMPTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uploaded,
    Processing,
    Processed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uploaded => write!(f, "uploaded"),
            SessionState::Processing => write!(f, "processing"),
            SessionState::Processed => write!(f, "processed"),
        }
    }
}

/// Everything the manager knows about one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub state: SessionState,
    /// Persisted uploads in registration order.
    pub inputs: Vec<InputRef>,
    pub part_duration: NonZeroU32,
    /// Segments of the last successful run, in (input, window) order.
    pub artifacts: Vec<SegmentArtifact>,
    pub archive: Option<Archive>,
    pub created_at: DateTime<Utc>,
    /// Drives the idle-timeout policy.
    pub last_transition: DateTime<Utc>,
}

impl SessionRecord {
    pub(crate) fn new(id: SessionId, inputs: Vec<InputRef>, part_duration: NonZeroU32) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Uploaded,
            inputs,
            part_duration,
            artifacts: Vec::new(),
            archive: None,
            created_at: now,
            last_transition: now,
        }
    }

    pub(crate) fn transition(&mut self, state: SessionState) {
        tracing::debug!(session_id = %self.id, from = %self.state, to = %state, "Session transition");
        self.state = state;
        self.last_transition = Utc::now();
    }

    /// Every file this record references: inputs, segments and the archive.
    pub fn owned_files(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|i| i.path.clone())
            .chain(self.artifacts.iter().map(|a| a.path.clone()))
            .chain(self.archive.iter().map(|a| a.path.clone()))
            .collect()
    }

    /// Time since the last state change.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn owned_files_covers_every_reference() {
        let id = SessionId::new();
        let input = InputRef {
            index: 0,
            path: PathBuf::from("/up/a.mp4"),
        };
        let mut record = SessionRecord::new(id, vec![input.clone()], NonZeroU32::new(10).unwrap());
        record.artifacts.push(SegmentArtifact {
            session_id: id,
            input,
            window_index: 0,
            path: PathBuf::from("/out/p0.mp4"),
            byte_size: 1,
        });
        record.archive = Some(Archive {
            session_id: id,
            path: PathBuf::from("/out/v.zip"),
            members: vec!["p0.mp4".into()],
        });

        assert_eq!(
            record.owned_files(),
            vec![
                PathBuf::from("/up/a.mp4"),
                PathBuf::from("/out/p0.mp4"),
                PathBuf::from("/out/v.zip"),
            ]
        );
    }

    #[test]
    fn transition_moves_the_idle_clock() {
        let mut record = SessionRecord::new(SessionId::new(), Vec::new(), NonZeroU32::new(5).unwrap());
        let before = record.last_transition;
        std::thread::sleep(std::time::Duration::from_millis(5));
        record.transition(SessionState::Processing);
        assert_eq!(record.state, SessionState::Processing);
        assert!(record.last_transition > before);
        assert_eq!(record.created_at, before);
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionState::Processed).unwrap(),
            "\"processed\""
        );
    }
}
