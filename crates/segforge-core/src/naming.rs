//! On-disk naming conventions for session files.
//!
//! Every file a session owns starts with `{session_id}_`; cleanup relies on
//! that prefix to find stragglers from aborted runs.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::ids::SessionId;

/// Name of a persisted upload: `{session}_{secure_name}`.
pub fn upload_file_name(session: &SessionId, secure_name: &str) -> String {
    format!("{session}_{secure_name}")
}

/// Name of one segment output.
///
/// Single-input sessions use `{session}_part{window}.{ext}`. When a session
/// has several inputs the window index restarts per input, so the input index
/// is added: `{session}_input{input}_part{window}.{ext}`.
pub fn segment_file_name(
    session: &SessionId,
    input_index: usize,
    input_count: usize,
    window_index: usize,
    extension: &str,
) -> String {
    if input_count > 1 {
        format!("{session}_input{input_index}_part{window_index}.{extension}")
    } else {
        format!("{session}_part{window_index}.{extension}")
    }
}

/// Name of the session archive: `{session}_videos.zip`.
pub fn archive_file_name(session: &SessionId) -> String {
    format!("{session}_videos.zip")
}

/// Whether `file_name` belongs to `session`.
pub fn is_owned_by(file_name: &str, session: &SessionId) -> bool {
    file_name.starts_with(&session.file_prefix())
}

/// Reduce a client-supplied file name to a safe, flat ASCII name.
///
/// Non-ASCII characters are dropped, path separators become spaces, runs of
/// whitespace collapse to `_`, anything outside `[A-Za-z0-9_.-]` is removed
/// and leading/trailing `.`/`_` are trimmed. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex"));

    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    unsafe_chars
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Lower-cased extension of `name`, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Whether `name` carries one of the `allowed` extensions (case-insensitive).
pub fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    match extension_of(name) {
        Some(ext) => allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}
