//! Persisting client uploads under a session's prefix.

use std::path::{Path, PathBuf};

use segforge_core::config::StorageConfig;
use segforge_core::naming::{has_allowed_extension, secure_filename, upload_file_name};
use segforge_core::{Error, Result, SessionId};

/// Copy `source` into the upload directory as `{session}_{secure_name}`.
///
/// `original_name` is the client-supplied name; it decides the extension
/// check and, once sanitized, the stored name.
///
/// # Errors
///
/// [`Error::Validation`] for a disallowed extension, an unusable name, or a
/// file over the size limit. Nothing is written in those cases.
pub async fn store_upload(
    storage: &StorageConfig,
    session: &SessionId,
    source: &Path,
    original_name: &str,
) -> Result<PathBuf> {
    if !has_allowed_extension(original_name, &storage.allowed_extensions) {
        return Err(Error::Validation(format!(
            "unsupported file type: {original_name} (allowed: {})",
            storage.allowed_extensions.join(", ")
        )));
    }

    let secure_name = secure_filename(original_name);
    if secure_name.is_empty() {
        return Err(Error::Validation(format!("unusable file name: {original_name:?}")));
    }

    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|_| Error::input_missing(source))?;
    if meta.len() > storage.max_upload_bytes {
        return Err(Error::Validation(format!(
            "{original_name} is {} bytes; the limit is {}",
            meta.len(),
            storage.max_upload_bytes
        )));
    }

    tokio::fs::create_dir_all(&storage.upload_dir).await?;
    let dest = storage.upload_dir.join(upload_file_name(session, &secure_name));
    tokio::fs::copy(source, &dest).await?;

    tracing::info!(
        session_id = %session,
        upload = %dest.display(),
        bytes = meta.len(),
        "Stored upload"
    );
    Ok(dest)
}
