//! Session lifecycle: register, process, fetch, reclaim.
//!
//! The manager is the only component that deletes session files. Sessions are
//! independent slots in a `DashMap`; a per-session async mutex serializes
//! processing and lets reclaim wait for an in-flight run to stop.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use segforge_av::MediaEngine;
use segforge_core::config::{Config, MissingAudioPolicy, SegmentConfig, StorageConfig};
use segforge_core::naming::{archive_file_name, segment_file_name};
use segforge_core::{
    check_duration, plan, Archive, Error, InputRef, MediaDescriptor, Result, SegmentArtifact,
    SessionId, TranscodeCause,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::cleanup::{owned_files_in, remove_files, ReclaimReport};
use super::record::{SessionRecord, SessionState};
use crate::executor::{SegmentExecutor, SegmentJob};
use crate::packager::pack;

struct SessionSlot {
    record: Mutex<SessionRecord>,
    /// Held for the whole of a `process()` run.
    run_lock: tokio::sync::Mutex<()>,
    /// Cancels the current run; replaced at the start of each run.
    cancel: Mutex<CancellationToken>,
    /// Set once reclaim has claimed this slot; a retired slot is never reused.
    retired: AtomicBool,
}

impl SessionSlot {
    fn new(record: SessionRecord) -> Self {
        Self {
            record: Mutex::new(record),
            run_lock: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
            retired: AtomicBool::new(false),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Mark the slot retired if `condition` holds for its record and no run
    /// or registration currently holds it.
    fn retire_if(&self, condition: impl FnOnce(&SessionRecord) -> bool) -> bool {
        let Ok(_run) = self.run_lock.try_lock() else {
            return false;
        };
        let record = self.record.lock();
        if self.is_retired() || !condition(&*record) {
            return false;
        }
        self.retired.store(true, Ordering::SeqCst);
        true
    }
}

/// Moves a session out of PROCESSING when a run ends without committing,
/// including when the `process()` future is dropped mid-run.
struct RunReset<'a> {
    id: &'a SessionId,
    slot: &'a SessionSlot,
    armed: bool,
}

impl RunReset<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunReset<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.slot.cancel.lock().cancel();
        let mut record = self.slot.record.lock();
        if record.state == SessionState::Processing {
            record.transition(SessionState::Uploaded);
            tracing::warn!(session_id = %self.id, "Processing abandoned before completion");
        }
    }
}

struct Inner {
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    executor: SegmentExecutor,
    storage: StorageConfig,
    segment: SegmentConfig,
    idle_timeout: Duration,
}

/// Thread-safe owner of every session record and session file.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager that drives `engine` with the given configuration.
    pub fn new(engine: Arc<dyn MediaEngine>, config: &Config) -> Self {
        let executor = SegmentExecutor::new(engine, config.segment.engine_timeout());
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                executor,
                storage: config.storage.clone(),
                segment: config.segment.clone(),
                idle_timeout: config.sessions.idle_timeout(),
            }),
        }
    }

    fn slot(&self, id: &SessionId) -> Option<Arc<SessionSlot>> {
        self.inner.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of a session's record.
    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.slot(id).map(|slot| slot.record.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Record `inputs` and `part_duration_secs` for `id`, moving it to
    /// UPLOADED.
    ///
    /// Re-registering a processed session deletes the previous run's segments
    /// and archive.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a zero part duration or no inputs; nothing
    ///   changes.
    /// - [`Error::AlreadyProcessing`] while a run holds the session.
    pub async fn register(
        &self,
        id: SessionId,
        inputs: Vec<PathBuf>,
        part_duration_secs: u32,
    ) -> Result<SessionRecord> {
        let part = NonZeroU32::new(part_duration_secs).ok_or_else(|| {
            Error::Validation("part duration must be a positive number of seconds".into())
        })?;
        if inputs.is_empty() {
            return Err(Error::Validation("at least one input file is required".into()));
        }
        let inputs: Vec<InputRef> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, path)| InputRef { index, path })
            .collect();

        loop {
            let slot = match self.inner.sessions.entry(id) {
                Entry::Vacant(vacant) => {
                    let record = SessionRecord::new(id, inputs, part);
                    vacant.insert(Arc::new(SessionSlot::new(record.clone())));
                    tracing::info!(
                        session_id = %id,
                        inputs = record.inputs.len(),
                        part_secs = part.get(),
                        "Registered session"
                    );
                    return Ok(record);
                }
                Entry::Occupied(occupied) => occupied.get().clone(),
            };

            // A retired slot is about to leave the map; retry against a fresh one.
            let guard = slot.run_lock.try_lock();
            if slot.is_retired() {
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            }
            let Ok(guard) = guard else {
                return Err(Error::AlreadyProcessing(id.to_string()));
            };

            let (stale, record) = {
                let mut record = slot.record.lock();
                let stale: Vec<PathBuf> = record
                    .artifacts
                    .iter()
                    .map(|a| a.path.clone())
                    .chain(record.archive.iter().map(|a| a.path.clone()))
                    .collect();
                record.inputs = inputs;
                record.part_duration = part;
                record.artifacts.clear();
                record.archive = None;
                record.transition(SessionState::Uploaded);
                (stale, record.clone())
            };

            if !stale.is_empty() {
                let report = remove_files(&id, stale).await;
                tracing::debug!(session_id = %id, removed = report.removed, "Dropped previous run");
            }
            drop(guard);

            tracing::info!(
                session_id = %id,
                inputs = record.inputs.len(),
                part_secs = part.get(),
                "Re-registered session"
            );
            return Ok(record);
        }
    }

    /// Probe, plan, transcode and package every input of `id`.
    ///
    /// On success the session is PROCESSED and holds the new [`Archive`]. On
    /// any failure, or when the returned future is dropped before it
    /// completes, it returns to UPLOADED with no archive; segment files
    /// already written stay on disk until the session is reclaimed.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown session.
    /// - [`Error::AlreadyProcessing`] if another run holds the session.
    /// - [`Error::Probe`], [`Error::InputMissing`], [`Error::Transcode`] or
    ///   [`Error::Packaging`] from the run itself.
    pub async fn process(&self, id: &SessionId) -> Result<Archive> {
        let slot = self.slot(id).ok_or_else(|| Error::not_found("session", id))?;
        let Ok(_run) = slot.run_lock.try_lock() else {
            return Err(Error::AlreadyProcessing(id.to_string()));
        };

        let token = CancellationToken::new();
        *slot.cancel.lock() = token.clone();
        if slot.is_retired() {
            return Err(Error::not_found("session", id));
        }

        let (inputs, part, stale_archive) = {
            let mut record = slot.record.lock();
            record.transition(SessionState::Processing);
            record.artifacts.clear();
            (record.inputs.clone(), record.part_duration, record.archive.take())
        };
        let mut reset = RunReset {
            id,
            slot: &slot,
            armed: true,
        };

        tracing::info!(
            session_id = %id,
            inputs = inputs.len(),
            part_secs = part.get(),
            "Processing session"
        );

        if let Some(old) = stale_archive {
            remove_files(id, [old.path]).await;
        }

        let result = self.run(id, &inputs, part, &token).await;

        reset.disarm();
        let mut record = slot.record.lock();
        match result {
            Ok((artifacts, archive)) => {
                record.artifacts = artifacts;
                record.archive = Some(archive.clone());
                record.transition(SessionState::Processed);
                tracing::info!(
                    session_id = %id,
                    segments = record.artifacts.len(),
                    archive = %archive.path.display(),
                    "Session processed"
                );
                Ok(archive)
            }
            Err(e) => {
                record.transition(SessionState::Uploaded);
                tracing::error!(session_id = %id, kind = e.kind(), "Processing aborted: {e}");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        id: &SessionId,
        inputs: &[InputRef],
        part: NonZeroU32,
        cancel: &CancellationToken,
    ) -> Result<(Vec<SegmentArtifact>, Archive)> {
        let output_dir = &self.inner.storage.output_dir;
        let extension = &self.inner.segment.container;

        let mut jobs = Vec::new();
        for input in inputs {
            let descriptor = self.describe(input, cancel).await?;
            check_duration(&input.path, descriptor.duration_secs)?;
            let include_audio = match (descriptor.has_audio, self.inner.segment.missing_audio) {
                (true, _) => true,
                (false, MissingAudioPolicy::VideoOnly) => false,
                (false, MissingAudioPolicy::Fail) => {
                    return Err(Error::Probe(format!(
                        "{}: no audio stream",
                        input.path.display()
                    )))
                }
            };

            let windows = plan(descriptor.duration_secs, part);
            tracing::debug!(
                session_id = %id,
                input = input.index,
                duration_secs = descriptor.duration_secs,
                windows = windows.len(),
                audio = include_audio,
                "Planned input"
            );

            jobs.extend(windows.into_iter().map(|window| SegmentJob {
                session_id: *id,
                input: input.clone(),
                window,
                include_audio,
                output: output_dir.join(segment_file_name(
                    id,
                    input.index,
                    inputs.len(),
                    window.index,
                    extension,
                )),
            }));
        }

        let artifacts = self.execute_all(jobs, cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::transcode(TranscodeCause::Cancelled, "processing cancelled"));
        }

        let archive = pack(id, &artifacts, &output_dir.join(archive_file_name(id))).await?;
        Ok((artifacts, archive))
    }

    async fn describe(&self, input: &InputRef, cancel: &CancellationToken) -> Result<MediaDescriptor> {
        if !tokio::fs::try_exists(&input.path).await.unwrap_or(false) {
            return Err(Error::input_missing(input.path.clone()));
        }
        let engine = self.inner.executor.engine();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(Error::transcode(TranscodeCause::Cancelled, "processing cancelled"))
            }
            r = tokio::time::timeout(self.inner.segment.engine_timeout(), engine.probe(&input.path)) => {
                r.unwrap_or_else(|_| {
                    Err(Error::transcode(
                        TranscodeCause::Timeout,
                        format!("{}: probe timed out", input.path.display()),
                    ))
                })
            }
        }
    }

    /// Run every job on the bounded pool. The first failure cancels the rest;
    /// all tasks are joined before returning.
    async fn execute_all(
        &self,
        jobs: Vec<SegmentJob>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SegmentArtifact>> {
        let limit = Arc::new(Semaphore::new(self.inner.segment.concurrency()));
        let abort = cancel.child_token();
        let mut tasks = JoinSet::new();

        for job in jobs {
            let executor = self.inner.executor.clone();
            let limit = limit.clone();
            let abort = abort.clone();
            tasks.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(format!("worker pool closed: {e}")))?;
                executor.execute(&job, &abort).await
            });
        }

        let mut artifacts = Vec::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::Internal(format!("segment task failed: {e}")))
                .and_then(|r| r);
            match outcome {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) if first_error.is_none() => {
                    abort.cancel();
                    first_error = Some(e);
                }
                Err(_) => {}
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        artifacts.sort_by_key(SegmentArtifact::order_key);
        Ok(artifacts)
    }

    /// Path of the session's archive.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] unless the session is PROCESSED and the archive
    /// file still exists.
    pub async fn fetch_archive(&self, id: &SessionId) -> Result<PathBuf> {
        let path = self
            .slot(id)
            .and_then(|slot| {
                let record = slot.record.lock();
                match (&record.state, &record.archive) {
                    (SessionState::Processed, Some(archive)) => Some(archive.path.clone()),
                    _ => None,
                }
            })
            .ok_or_else(|| Error::NotReady(id.to_string()))?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Ok(path)
        } else {
            Err(Error::NotReady(id.to_string()))
        }
    }

    /// Drop the session and delete all of its files.
    ///
    /// Cancels and waits for an in-flight run, deletes every referenced file
    /// plus anything in the upload/output directories carrying the session's
    /// prefix. Idempotent; unknown sessions still get the prefix sweep.
    pub async fn reclaim(&self, id: &SessionId) -> ReclaimReport {
        let slot = self.slot(id);
        if let Some(slot) = &slot {
            slot.retired.store(true, Ordering::SeqCst);
        }
        self.finish_reclaim(id, slot).await
    }

    /// Cancel and await the run of an already retired slot, then delete
    /// everything the session owns.
    async fn finish_reclaim(
        &self,
        id: &SessionId,
        slot: Option<Arc<SessionSlot>>,
    ) -> ReclaimReport {
        let mut targets = Vec::new();

        if let Some(slot) = slot {
            slot.cancel.lock().cancel();
            let _run = slot.run_lock.lock().await;
            self.inner
                .sessions
                .remove_if(id, |_, current| Arc::ptr_eq(current, &slot));
            targets.extend(slot.record.lock().owned_files());
        }

        targets.extend(owned_files_in(&self.inner.storage.upload_dir, id).await);
        targets.extend(owned_files_in(&self.inner.storage.output_dir, id).await);

        let report = remove_files(id, targets).await;
        tracing::info!(
            session_id = %id,
            removed = report.removed,
            missing = report.missing,
            failed = report.failed,
            "Session reclaimed"
        );
        report
    }

    /// Reclaim `id` when none of its inputs remain on disk.
    ///
    /// Returns the report when the session was reclaimed. Sessions held by a
    /// run are left alone, as are sessions re-registered while the inputs
    /// were being checked.
    pub async fn check_session(&self, id: &SessionId) -> Option<ReclaimReport> {
        let slot = self.slot(id)?;
        let inputs = slot.record.lock().inputs.clone();

        for input in &inputs {
            if tokio::fs::try_exists(&input.path).await.unwrap_or(false) {
                return None;
            }
        }

        if !slot.retire_if(|record| record.inputs == inputs) {
            return None;
        }
        tracing::info!(session_id = %id, "Session has no inputs left");
        Some(self.finish_reclaim(id, Some(slot)).await)
    }

    /// Reclaim sessions idle longer than `max_idle`. Sessions held by a run
    /// are skipped. Returns how many were reclaimed.
    pub async fn reclaim_idle(&self, max_idle: Duration) -> usize {
        let max_idle =
            chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::weeks(520));
        let expired = |record: &SessionRecord| record.idle_for(Utc::now()) > max_idle;

        let candidates: Vec<(SessionId, Arc<SessionSlot>)> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| expired(&*entry.value().record.lock()))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut reclaimed = 0;
        for (id, slot) in candidates {
            // Re-checked under the slot: the session may have been touched since.
            if !slot.retire_if(expired) {
                continue;
            }
            tracing::info!(session_id = %id, "Session expired");
            self.finish_reclaim(&id, Some(slot)).await;
            reclaimed += 1;
        }

        if reclaimed > 0 {
            tracing::debug!(reclaimed, "Expired sessions reclaimed");
        }
        reclaimed
    }

    /// Reclaim sessions idle longer than the configured timeout.
    pub async fn reclaim_expired(&self) -> usize {
        self.reclaim_idle(self.inner.idle_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> SessionSlot {
        let input = InputRef {
            index: 0,
            path: PathBuf::from("/uploads/clip.mp4"),
        };
        let part = NonZeroU32::new(10).unwrap();
        SessionSlot::new(SessionRecord::new(SessionId::new(), vec![input], part))
    }

    #[test]
    fn retire_if_checks_the_record() {
        let slot = slot();
        assert!(!slot.retire_if(|r| r.state == SessionState::Processed));
        assert!(!slot.is_retired());

        assert!(slot.retire_if(|r| r.state == SessionState::Uploaded));
        assert!(slot.is_retired());
        assert!(!slot.retire_if(|_| true));
    }

    #[tokio::test]
    async fn retire_if_leaves_held_slots_alone() {
        let slot = slot();
        let run = slot.run_lock.lock().await;
        assert!(!slot.retire_if(|_| true));
        drop(run);
        assert!(slot.retire_if(|_| true));
    }

    #[test]
    fn unfinished_run_resets_to_uploaded() {
        let slot = slot();
        let id = slot.record.lock().id;
        slot.record.lock().transition(SessionState::Processing);
        let token = slot.cancel.lock().clone();

        drop(RunReset {
            id: &id,
            slot: &slot,
            armed: true,
        });
        assert_eq!(slot.record.lock().state, SessionState::Uploaded);
        assert!(token.is_cancelled());
    }
}
