use crate::config::ClientConfig;

/// Shared HTTP client for the job and assistant endpoints. Every request
/// inherits the configured timeout.
pub fn setup_http(config: &ClientConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("docjob-client/", env!("CARGO_PKG_VERSION")))
        .build()
}
