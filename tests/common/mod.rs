//! Shared test harness for integration tests.
//!
//! Provides [`FakeEngine`], an in-process [`MediaEngine`] with scripted probe
//! results and failures, and [`TestHarness`], which wires it into a
//! [`SessionManager`] over a temporary storage root.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use segforge::SessionManager;
use segforge_av::{MediaEngine, SegmentRequest};
use segforge_core::config::Config;
use segforge_core::{Error, MediaDescriptor, Result, SessionId};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
struct FakeMedia {
    duration_secs: f64,
    has_audio: bool,
}

/// Scripted media engine. Inputs are matched by file-name suffix.
pub struct FakeEngine {
    media: HashMap<String, FakeMedia>,
    probe_failures: Vec<String>,
    transcode_failure: Option<String>,
    delay: Duration,
    staggered: bool,
    probe_delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    transcodes: Mutex<HashMap<PathBuf, usize>>,
    requests: Mutex<Vec<SegmentRequest>>,
}

impl FakeEngine {
    /// Every input probes as 10 s with audio unless configured otherwise.
    pub fn new() -> Self {
        Self {
            media: HashMap::new(),
            probe_failures: Vec::new(),
            transcode_failure: None,
            delay: Duration::ZERO,
            staggered: false,
            probe_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            transcodes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_media(mut self, suffix: &str, duration_secs: f64, has_audio: bool) -> Self {
        self.media.insert(
            suffix.to_string(),
            FakeMedia {
                duration_secs,
                has_audio,
            },
        );
        self
    }

    pub fn failing_probe(mut self, suffix: &str) -> Self {
        self.probe_failures.push(suffix.to_string());
        self
    }

    pub fn failing_transcode(mut self, diagnostics: &str) -> Self {
        self.transcode_failure = Some(diagnostics.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Windows further into an input finish sooner, so completion order runs
    /// against plan order. `base` is the delay of a window starting at 0.
    pub fn with_staggered_delay(mut self, base: Duration) -> Self {
        self.delay = base;
        self.staggered = true;
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Most transcodes ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// How many times each output path was transcoded.
    pub fn transcode_counts(&self) -> HashMap<PathBuf, usize> {
        self.transcodes.lock().clone()
    }

    /// Requests seen so far, sorted by output path.
    pub fn requests(&self) -> Vec<SegmentRequest> {
        let mut requests = self.requests.lock().clone();
        requests.sort_by(|a, b| a.output.cmp(&b.output));
        requests
    }

    fn lookup(&self, path: &Path) -> FakeMedia {
        let name = path.to_string_lossy();
        self.media
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix.as_str()))
            .map(|(_, media)| *media)
            .unwrap_or(FakeMedia {
                duration_secs: 10.0,
                has_audio: true,
            })
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> Result<MediaDescriptor> {
        tokio::time::sleep(self.probe_delay).await;
        let name = path.to_string_lossy();
        if self.probe_failures.iter().any(|s| name.ends_with(s.as_str())) {
            return Err(Error::Probe(format!("{name}: invalid data found")));
        }
        let media = self.lookup(path);
        Ok(MediaDescriptor {
            path: path.to_path_buf(),
            duration_secs: media.duration_secs,
            has_video: true,
            has_audio: media.has_audio,
        })
    }

    async fn transcode_segment(&self, request: &SegmentRequest) -> Result<()> {
        *self
            .transcodes
            .lock()
            .entry(request.output.clone())
            .or_insert(0) += 1;
        self.requests.lock().push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = if self.staggered {
            self.delay / (1 + request.start_secs as u32)
        } else {
            self.delay
        };
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(diagnostics) = &self.transcode_failure {
            return Err(Error::tool("fake", diagnostics.clone()));
        }
        let body = format!(
            "{}@{}+{}",
            request.input.display(),
            request.start_secs,
            request.max_duration_secs
        );
        tokio::fs::write(&request.output, body).await?;
        Ok(())
    }
}

/// A [`SessionManager`] over a temporary storage root.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: Config,
    pub engine: Arc<FakeEngine>,
    pub manager: SessionManager,
}

impl TestHarness {
    pub fn new(engine: FakeEngine) -> Self {
        Self::with_config(engine, |_| {})
    }

    pub fn with_config(engine: FakeEngine, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.output_dir = dir.path().join("outputs");
        config.segment.max_concurrent = 2;
        tweak(&mut config);
        config.storage.ensure_dirs().expect("storage dirs");

        let engine = Arc::new(engine);
        let manager = SessionManager::new(engine.clone(), &config);
        Self {
            dir,
            config,
            engine,
            manager,
        }
    }

    /// Write a persisted upload for `session` and return its path.
    pub fn upload(&self, session: &SessionId, name: &str) -> PathBuf {
        let path = self
            .config
            .storage
            .upload_dir
            .join(format!("{session}_{name}"));
        std::fs::write(&path, b"source video").expect("write upload");
        path
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.storage.output_dir
    }

    /// Files in the upload and output directories carrying the session prefix.
    pub fn session_files(&self, session: &SessionId) -> Vec<PathBuf> {
        let prefix = session.file_prefix();
        let mut files = Vec::new();
        for dir in [&self.config.storage.upload_dir, &self.config.storage.output_dir] {
            for entry in std::fs::read_dir(dir).expect("read dir") {
                let entry = entry.expect("dir entry");
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        files
    }

    /// Base names of the files in the output directory for `session`.
    pub fn output_names(&self, session: &SessionId) -> Vec<String> {
        let prefix = session.file_prefix();
        let mut names: Vec<String> = std::fs::read_dir(self.output_dir())
            .expect("read dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(&prefix))
            .collect();
        names.sort();
        names
    }
}

/// Member names of the ZIP at `path`, in archive order.
pub fn zip_members(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("archive entry").name().to_string())
        .collect()
}
