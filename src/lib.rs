pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ClientConfig, PollPolicy};
pub use error::{JobError, ValidationError};
pub use models::{Artifact, BinaryDocument, JobId, JobState, LocalFile, StorageKey, UploadJob};
pub use services::assistant::AssistantClient;
pub use services::job_client::{DocumentJobClient, JobHandle};
