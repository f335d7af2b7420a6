//! Concurrency-capped upload scheduling.
//!
//! Tasks move `Queued -> Uploading -> {Completed | Failed}`. Admission is FIFO and at
//! most `max_concurrent_uploads` tasks are ever `Uploading`. Each admitted task runs on
//! its own tokio task which races the backend transfer against cancellation, a progress
//! ticker and the `upload_timeout` deadline. The transfer itself is spawned separately so
//! that a cancelled or timed-out upload is still observed to completion and whatever it
//! wrote is deleted again.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        errors::{BrowserError, BrowserResult},
        models::{
            FileObject, UploadEvent, UploadObjectRequest, UploadOutcome, UploadSource, UploadState,
            UploadTask,
        },
        value_objects::{BucketId, FolderPath, UploadId},
    },
    ports::StorageBackend,
    services::{
        progress::{advance, ProgressStepper, RandomStepper},
        ObjectStore,
    },
};

const EVENT_CAPACITY: usize = 1024;

/// Upload scheduling limits
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_concurrent_uploads: usize,
    pub upload_timeout: Duration,
    pub progress_interval: Duration,
    /// Finished outcomes kept for lookup and retry; the oldest are evicted first
    pub retained_outcomes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 3,
            upload_timeout: Duration::from_secs(60),
            progress_interval: Duration::from_millis(200),
            retained_outcomes: 256,
        }
    }
}

/// Schedules uploads against a storage backend and records finished objects in the store
#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: UploadConfig,
    store: ObjectStore,
    backend: Arc<dyn StorageBackend>,
    stepper: Arc<dyn ProgressStepper>,
    state: Mutex<CoordinatorState>,
    events: broadcast::Sender<UploadEvent>,
    /// Queued + Uploading tasks plus abandoned transfers still draining
    active: watch::Sender<usize>,
}

#[derive(Default)]
struct CoordinatorState {
    /// Active tasks in submission order
    tasks: Vec<UploadTask>,
    queue: VecDeque<UploadId>,
    running: HashMap<UploadId, CancellationToken>,
    outcomes: HashMap<UploadId, UploadOutcome>,
    /// Insertion order of `outcomes`
    outcome_order: VecDeque<UploadId>,
    /// Cancelled or timed-out transfers the backend has not returned from yet
    draining: usize,
}

impl CoordinatorState {
    fn task_mut(&mut self, id: UploadId) -> Option<&mut UploadTask> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    fn take_task(&mut self, id: UploadId) -> Option<UploadTask> {
        let idx = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(idx))
    }

    fn count(&self, state: UploadState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }

    fn record(&mut self, id: UploadId, outcome: UploadOutcome, limit: usize) {
        if self.outcomes.insert(id, outcome).is_none() {
            self.outcome_order.push_back(id);
        }
        while self.outcome_order.len() > limit {
            let Some(oldest) = self.outcome_order.pop_front() else {
                break;
            };
            self.outcomes.remove(&oldest);
        }
    }
}

impl UploadCoordinator {
    pub fn new(
        store: ObjectStore,
        backend: Arc<dyn StorageBackend>,
        config: UploadConfig,
    ) -> Self {
        Self::with_stepper(store, backend, config, Arc::new(RandomStepper::default()))
    }

    pub fn with_stepper(
        store: ObjectStore,
        backend: Arc<dyn StorageBackend>,
        config: UploadConfig,
        stepper: Arc<dyn ProgressStepper>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (active, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                backend,
                stepper,
                state: Mutex::new(CoordinatorState::default()),
                events,
                active,
            }),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }

    /// Queue one task per source and admit as many as the concurrency cap allows.
    ///
    /// Sources the bucket policy rejects become `Failed` tasks immediately. Must be
    /// called from within a tokio runtime.
    pub fn submit(
        &self,
        bucket: &BucketId,
        folder: &FolderPath,
        sources: Vec<UploadSource>,
    ) -> BrowserResult<Vec<UploadId>> {
        let catalog = self.inner.store.catalog();
        catalog.resolve(bucket)?;

        let mut ids = Vec::with_capacity(sources.len());
        let mut state = self.inner.lock();

        for source in sources {
            let id = UploadId::generate();
            ids.push(id);
            let mut task = UploadTask {
                id,
                target_bucket: bucket.clone(),
                target_folder: folder.clone(),
                type_family: None,
                state: UploadState::Queued,
                progress: 0,
                error: None,
                submitted_at: Utc::now(),
                source,
            };

            match catalog.validate_upload(bucket, &task.source.name, task.source.size()) {
                Ok(family) => {
                    task.type_family = Some(family);
                    tracing::debug!(upload_id = %id, name = %task.source.name, "Upload queued");
                    state.queue.push_back(id);
                    state.tasks.push(task);
                    self.inner.emit(UploadEvent::Queued { id });
                }
                Err(error) => {
                    tracing::warn!(upload_id = %id, name = ?task.source.name, error = %error, "Upload rejected");
                    self.inner.emit(UploadEvent::Failed {
                        id,
                        kind: error.kind(),
                        message: error.to_string(),
                    });
                    task.state = UploadState::Failed;
                    task.error = Some(error);
                    self.inner
                        .record(&mut state, id, UploadOutcome::Failed { task });
                }
            }
        }

        self.inner.pump(&mut state);
        Ok(ids)
    }

    /// Retry a failed upload as a new task
    pub fn resubmit(&self, id: UploadId) -> BrowserResult<UploadId> {
        let task = {
            let state = self.inner.lock();
            if let Some(task) = state.tasks.iter().find(|task| task.id == id) {
                return Err(BrowserError::AlreadyTerminal {
                    id,
                    state: task.state.to_string(),
                });
            }
            match state.outcomes.get(&id) {
                Some(UploadOutcome::Failed { task }) => task.clone(),
                Some(other) => {
                    return Err(BrowserError::AlreadyTerminal {
                        id,
                        state: other.label().to_string(),
                    })
                }
                None => return Err(BrowserError::UploadNotFound { id }),
            }
        };

        let ids = self.submit(&task.target_bucket, &task.target_folder, vec![task.source])?;
        ids.into_iter()
            .next()
            .ok_or(BrowserError::UploadNotFound { id })
    }

    /// Cancel a Queued or Uploading task. No object is created for it; bytes the
    /// backend already accepted are deleted once the transfer returns.
    pub fn cancel(&self, id: UploadId) -> BrowserResult<()> {
        let mut state = self.inner.lock();

        match state.tasks.iter().find(|task| task.id == id).map(|t| t.state) {
            Some(UploadState::Queued) | Some(UploadState::Uploading) => {}
            Some(terminal) => {
                return Err(BrowserError::AlreadyTerminal {
                    id,
                    state: terminal.to_string(),
                })
            }
            None => {
                return Err(match state.outcomes.get(&id) {
                    Some(outcome) => BrowserError::AlreadyTerminal {
                        id,
                        state: outcome.label().to_string(),
                    },
                    None => BrowserError::UploadNotFound { id },
                })
            }
        }

        state.take_task(id);
        state.queue.retain(|queued| *queued != id);
        if let Some(token) = state.running.remove(&id) {
            token.cancel();
            state.draining += 1;
        }
        self.inner.record(&mut state, id, UploadOutcome::Cancelled);

        tracing::info!(upload_id = %id, "Upload cancelled");
        self.inner.emit(UploadEvent::Cancelled { id });
        self.inner.pump(&mut state);
        Ok(())
    }

    /// Active tasks in submission order
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.inner.lock().tasks.clone()
    }

    pub fn task(&self, id: UploadId) -> Option<UploadTask> {
        self.inner
            .lock()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    /// Terminal outcome of a finished task, while it is still retained
    pub fn outcome(&self, id: UploadId) -> Option<UploadOutcome> {
        self.inner.lock().outcomes.get(&id).cloned()
    }

    pub fn retained_outcome_count(&self) -> usize {
        self.inner.lock().outcomes.len()
    }

    pub fn uploading_count(&self) -> usize {
        self.inner.lock().count(UploadState::Uploading)
    }

    pub fn queued_count(&self) -> usize {
        self.inner.lock().count(UploadState::Queued)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// Resolves once nothing is Queued or Uploading and every abandoned transfer has
    /// been cleaned up
    pub async fn wait_idle(&self) {
        let mut active = self.inner.active.subscribe();
        let _ = active.wait_for(|count| *count == 0).await;
    }
}

fn transfer_result(joined: Result<BrowserResult<FileObject>, JoinError>) -> BrowserResult<FileObject> {
    joined.unwrap_or_else(|e| Err(BrowserError::transport("upload", e.to_string())))
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: UploadEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn record(&self, state: &mut CoordinatorState, id: UploadId, outcome: UploadOutcome) {
        state.record(id, outcome, self.config.retained_outcomes.max(1));
    }

    fn publish(&self, state: &CoordinatorState) {
        self.active.send_replace(state.tasks.len() + state.draining);
    }

    /// Admit queued tasks while slots are free, then publish the active count
    fn pump(self: &Arc<Self>, state: &mut CoordinatorState) {
        let max = self.config.max_concurrent_uploads.max(1);

        while state.running.len() < max {
            let Some(id) = state.queue.pop_front() else {
                break;
            };
            let Some(task) = state.task_mut(id) else {
                continue;
            };
            let Some(type_family) = task.type_family.clone() else {
                continue;
            };

            task.state = UploadState::Uploading;
            task.progress = 0;
            let request = UploadObjectRequest {
                bucket: task.target_bucket.clone(),
                folder: task.target_folder.clone(),
                name: task.source.name.clone(),
                type_family,
                content_type: task.source.content_type.clone(),
                data: task.source.data.clone(),
                metadata: task.source.metadata.clone(),
            };

            let token = CancellationToken::new();
            state.running.insert(id, token.clone());

            tracing::info!(
                upload_id = %id,
                bucket = %request.bucket,
                name = %request.name,
                uploading = state.running.len(),
                "Upload admitted"
            );
            self.emit(UploadEvent::Started { id });
            tokio::spawn(Arc::clone(self).run(id, request, token));
        }

        self.publish(state);
    }

    async fn run(self: Arc<Self>, id: UploadId, request: UploadObjectRequest, token: CancellationToken) {
        if token.is_cancelled() {
            self.drained();
            return;
        }

        let bucket = request.bucket.clone();
        let folder = request.folder.clone();
        let timeout = self.config.upload_timeout;

        let backend = Arc::clone(&self.backend);
        let mut transfer = tokio::spawn(async move { backend.upload_object(request).await });
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.config.progress_interval);
        // The first tick completes immediately
        ticker.tick().await;

        let finished = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break None,
                joined = &mut transfer => break Some(transfer_result(joined)),
                _ = &mut deadline => {
                    self.time_out(id, timeout);
                    break None;
                }
                _ = ticker.tick() => self.tick(id),
            }
        };

        match finished {
            Some(Ok(object)) => self.complete(id, &bucket, &folder, object).await,
            Some(Err(error)) => self.fail(id, error),
            None => {
                if let Ok(object) = transfer_result(transfer.await) {
                    self.discard(&bucket, &folder, object).await;
                }
                self.drained();
            }
        }
    }

    fn tick(&self, id: UploadId) {
        let mut state = self.lock();
        let Some(task) = state.task_mut(id) else {
            return;
        };
        if task.state != UploadState::Uploading {
            return;
        }
        let next = advance(task.progress, self.stepper.step(task.progress));
        if next > task.progress {
            task.progress = next;
            self.emit(UploadEvent::Progress { id, progress: next });
        }
    }

    async fn complete(
        self: &Arc<Self>,
        id: UploadId,
        bucket: &BucketId,
        folder: &FolderPath,
        object: FileObject,
    ) {
        let cancelled = {
            let mut state = self.lock();
            match state.task_mut(id) {
                Some(task) => {
                    // Completed but still active until the object is visible in the store
                    task.state = UploadState::Completed;
                    task.progress = 100;
                    self.emit(UploadEvent::Progress { id, progress: 100 });
                    false
                }
                None => true,
            }
        };
        if cancelled {
            self.discard(bucket, folder, object).await;
            self.drained();
            return;
        }

        if let Err(error) = self.store.insert(bucket, folder, object.clone()).await {
            self.fail(id, error);
            return;
        }

        let mut state = self.lock();
        state.take_task(id);
        state.running.remove(&id);
        tracing::info!(upload_id = %id, object_id = %object.id, name = %object.name, "Upload completed");
        self.emit(UploadEvent::Completed {
            id,
            object_id: object.id,
        });
        self.record(&mut state, id, UploadOutcome::Completed { object });
        self.pump(&mut state);
    }

    fn fail(self: &Arc<Self>, id: UploadId, error: BrowserError) {
        let mut state = self.lock();
        let Some(task) = state.take_task(id) else {
            // Cancelled while the backend was failing; nothing was written
            state.draining = state.draining.saturating_sub(1);
            self.publish(&state);
            return;
        };
        state.running.remove(&id);
        self.record_failure(&mut state, task, error);
    }

    /// Fail a task whose transfer is still running; its bytes are discarded once it returns
    fn time_out(self: &Arc<Self>, id: UploadId, timeout: Duration) {
        let mut state = self.lock();
        let Some(task) = state.take_task(id) else {
            return;
        };
        state.running.remove(&id);
        state.draining += 1;
        let error = BrowserError::transport("upload", format!("timed out after {:?}", timeout));
        self.record_failure(&mut state, task, error);
    }

    fn record_failure(self: &Arc<Self>, state: &mut CoordinatorState, mut task: UploadTask, error: BrowserError) {
        let id = task.id;
        tracing::warn!(upload_id = %id, name = %task.source.name, error = %error, "Upload failed");
        self.emit(UploadEvent::Failed {
            id,
            kind: error.kind(),
            message: error.to_string(),
        });
        task.state = UploadState::Failed;
        task.error = Some(error);
        self.record(state, id, UploadOutcome::Failed { task });
        self.pump(state);
    }

    /// Remove what an abandoned transfer wrote, from the backend and from the store
    async fn discard(&self, bucket: &BucketId, folder: &FolderPath, object: FileObject) {
        tracing::info!(bucket = %bucket, object_id = %object.id, name = %object.name, "Discarding bytes of abandoned upload");
        if let Err(e) = self
            .backend
            .delete_objects(bucket, &BTreeSet::from([object.id]))
            .await
        {
            tracing::warn!(bucket = %bucket, object_id = %object.id, error = %e, "Failed to discard abandoned upload");
        }
        if let Err(e) = self.store.remove_named(bucket, folder, &object.name).await {
            tracing::warn!(bucket = %bucket, name = %object.name, error = %e, "Failed to drop abandoned upload from store");
        }
    }

    fn drained(&self) {
        let mut state = self.lock();
        state.draining = state.draining.saturating_sub(1);
        self.publish(&state);
    }
}
