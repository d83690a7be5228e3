use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File type '{found}' is not allowed (expected one of: {allowed})")]
    WrongType { found: String, allowed: String },

    #[error("File size {size} bytes exceeds maximum allowed {max} bytes ({} MB)", .max / 1024 / 1024)]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Storage request failed: {0}")]
    Storage(String),

    #[error("Multipart upload for '{key}' failed: {message}")]
    Multipart { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Trigger endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Trigger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No '{field}' found in trigger response")]
    MissingJobId { field: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Job did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Job failed: {0}")]
    Remote(String),

    #[error("Polling was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Artifact is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failure of a single status request. Never terminal for the polling loop.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Status request timed out")]
    Timeout,

    #[error("Status endpoint returned status {0}")]
    Status(u16),

    #[error("Status request failed: {0}")]
    Transport(String),

    #[error("Malformed status body: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StatusError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StatusError::Timeout
        } else if e.is_decode() {
            StatusError::Malformed(e.to_string())
        } else {
            StatusError::Transport(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("No assistant endpoint configured")]
    NotConfigured,

    #[error("Invalid assistant endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Assistant request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Assistant returned an error: {0}")]
    Remote(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Any failure that ends a document job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Another document is already being processed")]
    Busy,

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Job task stopped unexpectedly: {0}")]
    Task(String),
}

impl JobError {
    /// Message suitable for showing to the person who submitted the document.
    pub fn user_message(&self) -> String {
        match self {
            JobError::Validation(ValidationError::WrongType { allowed, .. }) => {
                format!("This file type is not supported. Please select: {}.", allowed)
            }
            JobError::Validation(ValidationError::TooLarge { max, .. }) => {
                format!("The document is too large (limit {} MB).", max / 1024 / 1024)
            }
            JobError::Validation(e) => e.to_string(),
            JobError::Upload(_) => "Upload failed. Please try again.".to_string(),
            JobError::Trigger(_) => "Processing could not be started. Please try again.".to_string(),
            JobError::Poll(PollError::Timeout { .. }) => {
                "The document is still being processed. Please check back later.".to_string()
            }
            JobError::Poll(PollError::Remote(msg)) => format!("Processing failed: {}", msg),
            JobError::Poll(PollError::Cancelled) => "Processing was cancelled.".to_string(),
            JobError::Decode(_) => "The converted document could not be read.".to_string(),
            JobError::Cancelled => "Processing was cancelled.".to_string(),
            JobError::Busy => "Please wait for the current document to finish.".to_string(),
            JobError::Config(msg) => format!("Client is misconfigured: {}", msg),
            JobError::Task(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Timeouts are soft: the remote job may still finish after the client gives up.
    pub fn is_soft(&self) -> bool {
        matches!(self, JobError::Poll(PollError::Timeout { .. }))
    }
}
