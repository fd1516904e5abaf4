//! Best-effort file deletion for session reclaim.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use segforge_core::naming::is_owned_by;
use segforge_core::SessionId;
use serde::Serialize;

/// Outcome of deleting a session's files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    /// Files deleted by this call.
    pub removed: usize,
    /// Files that were already gone.
    pub missing: usize,
    /// Files that could not be deleted (logged).
    pub failed: usize,
}

impl ReclaimReport {
    /// No deletion failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Regular files in `dir` whose names carry the session's prefix.
///
/// A missing directory yields nothing.
pub(crate) async fn owned_files_in(dir: &Path, session: &SessionId) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return found,
        Err(e) => {
            tracing::warn!(session_id = %session, dir = %dir.display(), "Cannot list directory: {e}");
            return found;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let owned = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| is_owned_by(name, session));
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if owned && is_file {
                    found.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(session_id = %session, dir = %dir.display(), "Directory scan aborted: {e}");
                break;
            }
        }
    }
    found
}

/// Delete every path once. Absent files count as success.
pub(crate) async fn remove_files(
    session: &SessionId,
    paths: impl IntoIterator<Item = PathBuf>,
) -> ReclaimReport {
    let unique: BTreeSet<PathBuf> = paths.into_iter().collect();
    let mut report = ReclaimReport::default();

    for path in unique {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
            Err(e) => {
                tracing::warn!(
                    session_id = %session,
                    path = %path.display(),
                    "Failed to delete session file: {e}"
                );
                report.failed += 1;
            }
        }
    }
    report
}
