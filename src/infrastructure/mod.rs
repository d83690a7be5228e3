pub mod http;
pub mod storage;

use crate::config::ClientConfig;
use crate::services::assistant::AssistantClient;
use crate::services::job_api::HttpJobApi;
use crate::services::job_client::DocumentJobClient;
use anyhow::Context;
use std::sync::Arc;

/// Wires storage, the job API and the workflow client from one config.
pub async fn setup_client(config: ClientConfig) -> anyhow::Result<Arc<DocumentJobClient>> {
    let http = http::setup_http(&config).context("Failed to build HTTP client")?;
    let api = HttpJobApi::new(http, &config).context("Invalid job endpoint URL")?;
    let store = storage::setup_storage(&config).await;

    let client = DocumentJobClient::new(config, store, Arc::new(api))?;
    Ok(Arc::new(client))
}

pub fn setup_assistant(config: &ClientConfig) -> anyhow::Result<AssistantClient> {
    let http = http::setup_http(config).context("Failed to build HTTP client")?;
    Ok(AssistantClient::new(http, config)?)
}
