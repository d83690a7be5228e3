use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A document picked by the user, held in memory for the lifetime of one job.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub content: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// Reads a file from disk and detects its MIME type from the content,
    /// falling back to the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let mime_type = infer::get(&content)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| mime_from_extension(path).to_string());

        Ok(Self::new(name, mime_type, Bytes::from(content)))
    }

    /// First bytes of the content, used for signature checks.
    pub fn header(&self) -> &[u8] {
        &self.content[..self.content.len().min(crate::utils::validation::HEADER_LEN)]
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("xlsx") => crate::config::SPREADSHEET_MIME,
        _ => "application/octet-stream",
    }
}

/// Object path under which an uploaded document is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque execution handle returned by the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Validated,
    Uploading,
    Triggering,
    Polling,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Validated => "validated",
            JobState::Uploading => "uploading",
            JobState::Triggering => "triggering",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal output of a remote job as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Base64-encoded document body.
    Inline(String),
    /// Pre-signed, time-limited download URL.
    Reference(String),
}

/// An artifact ready to hand to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryDocument {
    Inline { bytes: Bytes, mime_type: String },
    Reference { url: String },
}

impl BinaryDocument {
    pub fn len(&self) -> Option<usize> {
        match self {
            BinaryDocument::Inline { bytes, .. } => Some(bytes.len()),
            BinaryDocument::Reference { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Running,
    Completed(Artifact),
    Failed(String),
    TransientError(String),
    Timeout,
}

/// One status request issued by the polling loop.
#[derive(Debug, Clone)]
pub struct PollAttempt {
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: PollOutcome,
}

/// Record of a single document going through upload, trigger and polling.
///
/// `job_id` is only ever set by [`UploadJob::triggered`] and `result` only by
/// [`UploadJob::complete`], so both are absent until the matching step succeeds.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub file_name: String,
    pub file_size: u64,
    state: JobState,
    storage_key: Option<StorageKey>,
    job_id: Option<JobId>,
    result: Option<BinaryDocument>,
    last_error: Option<String>,
}

impl UploadJob {
    pub fn new(file: &LocalFile) -> Self {
        Self {
            file_name: file.name.clone(),
            file_size: file.size,
            state: JobState::Idle,
            storage_key: None,
            job_id: None,
            result: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn storage_key(&self) -> Option<&StorageKey> {
        self.storage_key.as_ref()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn result(&self) -> Option<&BinaryDocument> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn validated(&mut self) {
        self.transition(JobState::Idle, JobState::Validated);
    }

    pub fn uploading(&mut self) {
        self.transition(JobState::Validated, JobState::Uploading);
    }

    pub fn uploaded(&mut self, key: StorageKey) {
        if self.transition(JobState::Uploading, JobState::Triggering) {
            self.storage_key = Some(key);
        }
    }

    pub fn triggered(&mut self, job_id: JobId) {
        if self.transition(JobState::Triggering, JobState::Polling) {
            self.job_id = Some(job_id);
        }
    }

    pub fn complete(&mut self, document: BinaryDocument) {
        if self.transition(JobState::Polling, JobState::Completed) {
            self.result = Some(document);
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.state.is_terminal() {
            tracing::warn!("Ignoring failure on finished job {}", self.file_name);
            return;
        }
        self.state = JobState::Failed;
        self.last_error = Some(message.into());
    }

    fn transition(&mut self, from: JobState, to: JobState) -> bool {
        if self.state != from {
            tracing::warn!(
                "Rejected job transition {} -> {} (current state: {})",
                from,
                to,
                self.state
            );
            return false;
        }
        self.state = to;
        true
    }
}
