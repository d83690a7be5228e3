#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use docjob_client::config::ClientConfig;
use docjob_client::error::UploadError;
use docjob_client::models::{LocalFile, StorageKey};
use docjob_client::services::storage::ObjectStore;
use docjob_client::utils::progress::ProgressObserver;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Object store that keeps uploads in memory and reports progress in quarters.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, (String, Bytes)>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        content_type: &str,
        content: Bytes,
        progress: &dyn ProgressObserver,
    ) -> Result<(), UploadError> {
        for percent in [0, 25, 50, 75, 100] {
            progress.on_progress(percent);
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), content));
        Ok(())
    }
}

/// Client config pointing every endpoint at a mock server, with fast polling.
pub fn config_for(server_uri: &str) -> ClientConfig {
    ClientConfig {
        bucket: "test-bucket".to_string(),
        trigger_url: format!("{}/start", server_uri),
        status_url: format!("{}/status", server_uri),
        assistant_url: Some(format!("{}/assistant", server_uri)),
        chat_url: Some(format!("{}/chat", server_uri)),
        poll_max_attempts: 5,
        poll_interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

pub fn pdf(name: &str, size: usize) -> LocalFile {
    let mut content = b"%PDF-1.7\n".to_vec();
    content.resize(size.max(content.len()), b'0');
    LocalFile::new(name, "application/pdf", Bytes::from(content))
}
