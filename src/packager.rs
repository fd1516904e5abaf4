//! Bundles a session's segments into one ZIP archive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use segforge_core::{Archive, Error, Result, SegmentArtifact, SessionId};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write `artifacts` into a ZIP at `archive_path`, in the given order.
///
/// Members are stored uncompressed under their base file names. The archive
/// is built at a sibling `.partial` path and renamed into place, so a failure
/// never leaves a half-written file at `archive_path`.
///
/// # Errors
///
/// [`Error::Packaging`] if a member file is missing or the archive cannot be
/// written.
pub async fn pack(
    session_id: &SessionId,
    artifacts: &[SegmentArtifact],
    archive_path: &Path,
) -> Result<Archive> {
    let members: Vec<(String, PathBuf)> = artifacts
        .iter()
        .map(|a| (a.member_name(), a.path.clone()))
        .collect();
    let target = archive_path.to_path_buf();

    let names = tokio::task::spawn_blocking(move || pack_blocking(&members, &target))
        .await
        .map_err(|e| Error::Packaging(format!("packaging task failed: {e}")))??;

    tracing::info!(
        session_id = %session_id,
        archive = %archive_path.display(),
        members = names.len(),
        "Archive written"
    );

    Ok(Archive {
        session_id: *session_id,
        path: archive_path.to_path_buf(),
        members: names,
    })
}

fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn pack_blocking(members: &[(String, PathBuf)], archive_path: &Path) -> Result<Vec<String>> {
    let partial = partial_path(archive_path);

    let written = write_zip(members, &partial).and_then(|names| {
        std::fs::rename(&partial, archive_path).map_err(|e| {
            Error::Packaging(format!("cannot publish {}: {e}", archive_path.display()))
        })?;
        Ok(names)
    });

    if written.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    written
}

fn write_zip(members: &[(String, PathBuf)], dest: &Path) -> Result<Vec<String>> {
    let file = File::create(dest)
        .map_err(|e| Error::Packaging(format!("cannot create {}: {e}", dest.display())))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);

    let mut names = Vec::with_capacity(members.len());
    for (name, path) in members {
        let mut source = File::open(path)
            .map_err(|e| Error::Packaging(format!("member {} unavailable: {e}", path.display())))?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::Packaging(format!("cannot add {name}: {e}")))?;
        std::io::copy(&mut source, &mut zip)
            .map_err(|e| Error::Packaging(format!("cannot copy {name}: {e}")))?;
        names.push(name.clone());
    }

    let mut inner = zip
        .finish()
        .map_err(|e| Error::Packaging(format!("cannot finalize archive: {e}")))?;
    inner
        .flush()
        .map_err(|e| Error::Packaging(format!("cannot flush archive: {e}")))?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use segforge_core::InputRef;
    use std::io::Read;

    fn artifact(session: SessionId, dir: &Path, window: usize, body: &[u8]) -> SegmentArtifact {
        let path = dir.join(format!("{session}_part{window}.mp4"));
        std::fs::write(&path, body).unwrap();
        SegmentArtifact {
            session_id: session,
            input: InputRef {
                index: 0,
                path: dir.join("in.mp4"),
            },
            window_index: window,
            path,
            byte_size: body.len() as u64,
        }
    }

    #[tokio::test]
    async fn members_keep_order_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::new();
        let artifacts = vec![
            artifact(sid, dir.path(), 0, b"first"),
            artifact(sid, dir.path(), 1, b"second"),
        ];
        let dest = dir.path().join(format!("{sid}_videos.zip"));

        let archive = pack(&sid, &artifacts, &dest).await.unwrap();
        assert_eq!(
            archive.members,
            vec![format!("{sid}_part0.mp4"), format!("{sid}_part1.mp4")]
        );
        assert!(!partial_path(&dest).exists());

        let mut zip = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut body = String::new();
        zip.by_name(&format!("{sid}_part1.mp4"))
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "second");
    }

    #[tokio::test]
    async fn empty_list_yields_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::new();
        let dest = dir.path().join("empty.zip");
        let archive = pack(&sid, &[], &dest).await.unwrap();
        assert!(archive.members.is_empty());
        let zip = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(zip.len(), 0);
    }

    #[tokio::test]
    async fn vanished_member_leaves_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::new();
        let artifacts = vec![
            artifact(sid, dir.path(), 0, b"first"),
            artifact(sid, dir.path(), 1, b"second"),
        ];
        std::fs::remove_file(&artifacts[1].path).unwrap();
        let dest = dir.path().join("out.zip");

        let err = pack(&sid, &artifacts, &dest).await.unwrap_err();
        assert_matches!(err, Error::Packaging(_));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn existing_archive_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::new();
        let dest = dir.path().join("out.zip");
        std::fs::write(&dest, b"stale").unwrap();

        let artifacts = vec![artifact(sid, dir.path(), 0, b"fresh")];
        pack(&sid, &artifacts, &dest).await.unwrap();
        let zip = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
    }
}
