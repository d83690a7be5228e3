use std::env;
use std::time::Duration;
use validator::Validate;

/// Spreadsheet format produced by the conversion workflow.
pub const SPREADSHEET_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Polling budget for one job: `max_attempts` requests spaced by a fixed `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_secs(10),
        }
    }
}

impl PollPolicy {
    /// Upper bound on the time spent waiting between attempts.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Endpoints, storage target and limits for the document job client
#[derive(Debug, Clone, Validate)]
pub struct ClientConfig {
    /// AWS region of the bucket (default: "ap-south-1")
    #[validate(length(min = 1, message = "Region cannot be empty"))]
    pub region: String,

    /// Destination bucket for uploaded documents
    #[validate(length(min = 3, max = 63, message = "Bucket name must be 3-63 characters"))]
    pub bucket: String,

    /// Custom S3 endpoint (MinIO, localstack). Enables path-style addressing.
    #[validate(url(message = "S3 endpoint must be a valid URL"))]
    pub s3_endpoint: Option<String>,

    /// Logical folder prepended to every storage key (default: "uploads/")
    pub upload_prefix: String,

    /// Job trigger endpoint (POST)
    #[validate(url(message = "Trigger URL must be a valid URL"))]
    pub trigger_url: String,

    /// Job status endpoint (GET ?executionArn=...)
    #[validate(url(message = "Status URL must be a valid URL"))]
    pub status_url: String,

    /// Document assistant endpoint (upload + query actions)
    #[validate(url(message = "Assistant URL must be a valid URL"))]
    pub assistant_url: Option<String>,

    /// Free-form chat endpoint (POST {message} -> {reply})
    #[validate(url(message = "Chat URL must be a valid URL"))]
    pub chat_url: Option<String>,

    /// Accepted MIME types (default: application/pdf)
    #[validate(length(min = 1, message = "At least one MIME type must be allowed"))]
    pub allowed_mime_types: Vec<String>,

    /// Maximum document size in bytes (default: 50 MB)
    #[validate(range(min = 1, message = "Maximum file size must be positive"))]
    pub max_file_size: usize,

    /// Status requests issued before giving up (default: 15)
    #[validate(range(min = 1, message = "At least one poll attempt is required"))]
    pub poll_max_attempts: u32,

    /// Fixed delay between status requests (default: 10s)
    pub poll_interval: Duration,

    /// Per-request timeout for trigger, status and assistant calls (default: 30s)
    pub request_timeout: Duration,

    /// Part size for multipart uploads (default: 8 MB, S3 minimum is 5 MB)
    #[validate(range(min = 5242880, message = "Multipart chunk size must be at least 5 MB"))]
    pub multipart_chunk_size: usize,

    /// MIME type attached to inline artifacts
    pub artifact_mime_type: String,

    /// Response field carrying the job identifier (default: "executionArn")
    #[validate(length(min = 1))]
    pub job_id_field: String,

    /// Status fields carrying a base64 payload, in priority order
    pub inline_payload_fields: Vec<String>,

    /// Status fields carrying a download URL, in priority order
    pub reference_fields: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: "ap-south-1".to_string(),
            bucket: "pdf-upload-bucket".to_string(),
            s3_endpoint: None,
            upload_prefix: "uploads/".to_string(),
            trigger_url: "http://localhost:3001/start".to_string(),
            status_url: "http://localhost:3001/status".to_string(),
            assistant_url: None,
            chat_url: None,
            allowed_mime_types: vec![mime::APPLICATION_PDF.to_string()],
            max_file_size: 50 * 1024 * 1024, // 50 MB
            poll_max_attempts: 15,
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            multipart_chunk_size: 8 * 1024 * 1024, // 8 MB
            artifact_mime_type: SPREADSHEET_MIME.to_string(),
            job_id_field: "executionArn".to_string(),
            inline_payload_fields: vec![
                "base64Excel".to_string(),
                "base64".to_string(),
                "fileBase64".to_string(),
            ],
            reference_fields: vec![
                "signedUrl".to_string(),
                "url".to_string(),
                "downloadUrl".to_string(),
            ],
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            region: env::var("AWS_REGION").unwrap_or(default.region),

            bucket: env::var("S3_BUCKET_NAME").unwrap_or(default.bucket),

            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),

            upload_prefix: env::var("UPLOAD_PREFIX").unwrap_or(default.upload_prefix),

            trigger_url: env::var("TRIGGER_URL").unwrap_or(default.trigger_url),

            status_url: env::var("STATUS_URL").unwrap_or(default.status_url),

            assistant_url: env::var("ASSISTANT_URL").ok().filter(|v| !v.is_empty()),

            chat_url: env::var("CHAT_URL").ok().filter(|v| !v.is_empty()),

            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or(default.allowed_mime_types),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            poll_max_attempts: env::var("POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.poll_max_attempts),

            poll_interval: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.poll_interval),

            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),

            multipart_chunk_size: env::var("MULTIPART_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.multipart_chunk_size),

            artifact_mime_type: env::var("ARTIFACT_MIME_TYPE")
                .unwrap_or(default.artifact_mime_type),

            job_id_field: env::var("JOB_ID_FIELD").unwrap_or(default.job_id_field),

            inline_payload_fields: env::var("INLINE_PAYLOAD_FIELDS")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or(default.inline_payload_fields),

            reference_fields: env::var("REFERENCE_FIELDS")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or(default.reference_fields),
        }
    }

    /// Create config for local development (short polling, local endpoints)
    pub fn development() -> Self {
        Self {
            bucket: "uploads".to_string(),
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            poll_max_attempts: 20,
            poll_interval: Duration::from_secs(5),
            ..Self::default()
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.poll_max_attempts,
            interval: self.poll_interval,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
