use crate::config::{ClientConfig, PollPolicy};
use crate::error::{DecodeError, JobError, PollError, TriggerError, ValidationError};
use crate::models::{Artifact, BinaryDocument, JobId, JobState, LocalFile, StorageKey, UploadJob};
use crate::services::artifact::decode_artifact;
use crate::services::job_api::JobApi;
use crate::services::poller::Poller;
use crate::services::storage::{ObjectStore, build_storage_key};
use crate::utils::progress::{MonotonicProgress, ProgressObserver};
use crate::utils::validation;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// Held for the lifetime of one job; releases the client when dropped.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, JobError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| JobError::Busy)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives one document through validate, upload, trigger, poll and decode.
///
/// A client runs at most one job at a time; a second `upload`, `run` or
/// `submit` while a job is active fails with [`JobError::Busy`].
pub struct DocumentJobClient {
    config: ClientConfig,
    store: Arc<dyn ObjectStore>,
    api: Arc<dyn JobApi>,
    busy: Arc<AtomicBool>,
}

impl DocumentJobClient {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn ObjectStore>,
        api: Arc<dyn JobApi>,
    ) -> Result<Self, JobError> {
        config
            .validate()
            .map_err(|e| JobError::Config(e.to_string()))?;

        Ok(Self {
            config,
            store,
            api,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn validate(&self, file: &LocalFile) -> Result<(), ValidationError> {
        validation::validate(file, &self.config)
    }

    /// Uploads a file under `{prefix}{unix_millis}-{filename}`.
    pub async fn upload(
        &self,
        file: &LocalFile,
        prefix: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<StorageKey, JobError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.validate(file)?;
        self.upload_unguarded(file, prefix, progress).await
    }

    async fn upload_unguarded(
        &self,
        file: &LocalFile,
        prefix: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<StorageKey, JobError> {
        let key = build_storage_key(prefix, &file.name, Utc::now().timestamp_millis())?;
        let progress = MonotonicProgress::new(progress);

        tracing::info!(
            "📤 Uploading {} ({} bytes) to {}/{}",
            file.name,
            file.size,
            self.store.bucket(),
            key
        );

        self.store
            .put_object(&key, &file.mime_type, file.content.clone(), &progress)
            .await?;

        tracing::info!("✅ Uploaded {}", key);
        Ok(key)
    }

    /// Starts the remote job for an uploaded document.
    pub async fn trigger_job(&self, key: &StorageKey) -> Result<JobId, TriggerError> {
        let job_id = self.api.start_job(self.store.bucket(), key).await?;
        tracing::info!("🚀 Started job {} for {}", job_id, key);
        Ok(job_id)
    }

    pub async fn poll_until_resolved(
        &self,
        job_id: &JobId,
        policy: PollPolicy,
        cancel: CancellationToken,
    ) -> Result<Artifact, PollError> {
        Poller::new(self.api.as_ref(), policy)
            .with_cancellation(cancel)
            .run(job_id)
            .await
    }

    pub fn decode_artifact(&self, artifact: Artifact) -> Result<BinaryDocument, DecodeError> {
        decode_artifact(artifact, &self.config.artifact_mime_type)
    }

    /// Runs the whole workflow on the current task.
    pub async fn run(
        &self,
        file: LocalFile,
        progress: &dyn ProgressObserver,
    ) -> Result<UploadJob, JobError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let (state_tx, _) = watch::channel(JobState::Idle);
        self.execute(file, progress, CancellationToken::new(), &state_tx)
            .await
    }

    /// Validates the file, then runs the workflow on a background task.
    ///
    /// The returned handle reports state changes and can cancel the job.
    pub fn submit(
        self: &Arc<Self>,
        file: LocalFile,
        progress: Arc<dyn ProgressObserver>,
    ) -> Result<JobHandle, JobError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        self.validate(&file)?;

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(JobState::Idle);
        let client = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            client
                .execute(file, progress.as_ref(), token, &state_tx)
                .await
        });

        Ok(JobHandle {
            cancel,
            state: state_rx,
            task,
        })
    }

    async fn execute(
        &self,
        file: LocalFile,
        progress: &dyn ProgressObserver,
        cancel: CancellationToken,
        state_tx: &watch::Sender<JobState>,
    ) -> Result<UploadJob, JobError> {
        let mut job = UploadJob::new(&file);

        match self.drive(&mut job, &file, progress, &cancel, state_tx).await {
            Ok(()) => Ok(job),
            Err(e) => {
                if matches!(e, JobError::Poll(PollError::Timeout { .. })) {
                    tracing::warn!("⌛ {}: {}", file.name, e);
                } else {
                    tracing::error!("❌ Job for {} failed: {}", file.name, e);
                }
                job.fail(e.to_string());
                let _ = state_tx.send(job.state());
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        job: &mut UploadJob,
        file: &LocalFile,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
        state_tx: &watch::Sender<JobState>,
    ) -> Result<(), JobError> {
        let publish = |state: JobState| {
            let _ = state_tx.send(state);
        };

        self.validate(file)?;
        job.validated();
        publish(job.state());

        job.uploading();
        publish(job.state());
        let key = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            key = self.upload_unguarded(file, &self.config.upload_prefix, progress) => key?,
        };
        job.uploaded(key.clone());
        publish(job.state());

        let job_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            job_id = self.trigger_job(&key) => job_id?,
        };
        job.triggered(job_id.clone());
        publish(job.state());

        let artifact = self
            .poll_until_resolved(&job_id, self.config.poll_policy(), cancel.clone())
            .await
            .map_err(|e| match e {
                PollError::Cancelled => JobError::Cancelled,
                other => JobError::Poll(other),
            })?;

        let document = self.decode_artifact(artifact)?;
        job.complete(document);
        publish(job.state());
        Ok(())
    }
}

/// Handle to a job running on a background task.
pub struct JobHandle {
    cancel: CancellationToken,
    state: watch::Receiver<JobState>,
    task: JoinHandle<Result<UploadJob, JobError>>,
}

impl JobHandle {
    /// Current workflow state.
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.clone()
    }

    /// Stops the job at its next suspension point. No further requests are
    /// issued once the current one returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the job to reach a terminal state.
    pub async fn wait(self) -> Result<UploadJob, JobError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(JobError::Cancelled),
            Err(e) => Err(JobError::Task(e.to_string())),
        }
    }
}
