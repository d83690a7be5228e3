use crate::config::ClientConfig;
use crate::error::{StatusError, TriggerError};
use crate::models::{Artifact, JobId, StorageKey};
use crate::services::envelope::{find_string, parse_body, unwrap_layers};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Classification of one status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed(Artifact),
    Failed(String),
}

/// Remote collaborators of the document workflow: the job trigger and the
/// job status endpoints.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn start_job(&self, bucket: &str, key: &StorageKey) -> Result<JobId, TriggerError>;

    /// Queries the job once. Errors are per-attempt and never end a job.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus, StatusError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest<'a> {
    storage_bucket: &'a str,
    storage_key: &'a str,
}

const ERROR_FIELDS: &[&str] = &["error", "errorMessage"];
const RUNNING_STATUSES: &[&str] = &["RUNNING", "PENDING", "IN_PROGRESS", "STARTED"];
const FAILED_STATUSES: &[&str] = &["FAILED", "TIMED_OUT", "ABORTED"];

/// Response fields recognised by [`classify_status`].
#[derive(Debug, Clone)]
pub struct StatusFields {
    pub reference: Vec<String>,
    pub inline: Vec<String>,
}

impl StatusFields {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            reference: config.reference_fields.clone(),
            inline: config.inline_payload_fields.clone(),
        }
    }
}

fn first_field(value: &Value, fields: &[String]) -> Option<String> {
    fields.iter().find_map(|field| {
        value
            .get(field.as_str())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Only a non-empty string or an object counts as an error; flags such as
/// `"error": false` or `0` do not.
fn error_message(value: &Value) -> Option<String> {
    ERROR_FIELDS.iter().find_map(|field| match value.get(*field)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        ),
        _ => None,
    })
}

/// Classifies a status body. Each envelope layer is checked for, in order:
/// an artifact URL, an inline payload, an error, and a status word.
pub fn classify_status(body: &Value, fields: &StatusFields) -> Result<JobStatus, StatusError> {
    let mut running = false;

    for (_, layer) in unwrap_layers(body) {
        if let Some(url) = first_field(&layer, &fields.reference) {
            return Ok(JobStatus::Completed(Artifact::Reference(url)));
        }
        if let Some(payload) = first_field(&layer, &fields.inline) {
            return Ok(JobStatus::Completed(Artifact::Inline(payload)));
        }
        if let Some(message) = error_message(&layer) {
            return Ok(JobStatus::Failed(message));
        }

        let Some(status) = layer.get("status").and_then(Value::as_str) else {
            continue;
        };
        let status = status.trim().to_uppercase();
        if FAILED_STATUSES.contains(&status.as_str()) {
            let cause = layer
                .get("cause")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("job ended with status {}", status));
            return Ok(JobStatus::Failed(cause));
        }
        // SUCCEEDED without an artifact means the result is still being published
        if RUNNING_STATUSES.contains(&status.as_str()) || status == "SUCCEEDED" {
            running = true;
        }
    }

    if running {
        Ok(JobStatus::Running)
    } else {
        Err(StatusError::Malformed(format!(
            "unrecognised status response: {}",
            truncate(&body.to_string(), 200)
        )))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// [`JobApi`] over HTTP with JSON bodies.
pub struct HttpJobApi {
    client: reqwest::Client,
    trigger_url: Url,
    status_url: Url,
    job_id_field: String,
    fields: StatusFields,
}

impl HttpJobApi {
    pub fn new(client: reqwest::Client, config: &ClientConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            trigger_url: Url::parse(&config.trigger_url)?,
            status_url: Url::parse(&config.status_url)?,
            job_id_field: config.job_id_field.clone(),
            fields: StatusFields::from_config(config),
        })
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn start_job(&self, bucket: &str, key: &StorageKey) -> Result<JobId, TriggerError> {
        let response = self
            .client
            .post(self.trigger_url.clone())
            .json(&StartJobRequest {
                storage_bucket: bucket,
                storage_key: key.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TriggerError::Status {
                status: status.as_u16(),
                body: truncate(&text, 500).to_string(),
            });
        }

        let missing = || TriggerError::MissingJobId {
            field: self.job_id_field.clone(),
        };
        let body = parse_body(&text).ok_or_else(missing)?;
        let (layer, id) = find_string(&body, &[self.job_id_field.as_str()]).ok_or_else(missing)?;

        tracing::debug!("Job identifier found at {:?}", layer);
        Ok(JobId::new(id))
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus, StatusError> {
        let response = self
            .client
            .get(self.status_url.clone())
            .query(&[(self.job_id_field.as_str(), job_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let body = parse_body(&text)
            .ok_or_else(|| StatusError::Malformed(truncate(&text, 200).to_string()))?;

        classify_status(&body, &self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> StatusFields {
        StatusFields::from_config(&ClientConfig::default())
    }

    #[test]
    fn test_running() {
        assert_eq!(
            classify_status(&json!({"status": "RUNNING"}), &fields()).unwrap(),
            JobStatus::Running
        );
        assert_eq!(
            classify_status(&json!({"status": "running"}), &fields()).unwrap(),
            JobStatus::Running
        );
    }

    #[test]
    fn test_signed_url() {
        assert_eq!(
            classify_status(&json!({"signedUrl": "https://s3/x.xlsx"}), &fields()).unwrap(),
            JobStatus::Completed(Artifact::Reference("https://s3/x.xlsx".to_string()))
        );
    }

    #[test]
    fn test_inline_payload() {
        assert_eq!(
            classify_status(&json!({"status": "SUCCEEDED", "base64Excel": "UEsDBA=="}), &fields())
                .unwrap(),
            JobStatus::Completed(Artifact::Inline("UEsDBA==".to_string()))
        );
    }

    #[test]
    fn test_explicit_error() {
        assert_eq!(
            classify_status(&json!({"error": "bad input"}), &fields()).unwrap(),
            JobStatus::Failed("bad input".to_string())
        );
    }

    #[test]
    fn test_failed_status_word() {
        assert_eq!(
            classify_status(&json!({"status": "FAILED", "cause": "Lambda crashed"}), &fields())
                .unwrap(),
            JobStatus::Failed("Lambda crashed".to_string())
        );
        assert_eq!(
            classify_status(&json!({"status": "TIMED_OUT"}), &fields()).unwrap(),
            JobStatus::Failed("job ended with status TIMED_OUT".to_string())
        );
    }

    #[test]
    fn test_wrapped_status() {
        let body = json!({"statusCode": 200, "body": "{\"signedUrl\":\"https://s3/y\"}"});
        assert_eq!(
            classify_status(&body, &fields()).unwrap(),
            JobStatus::Completed(Artifact::Reference("https://s3/y".to_string()))
        );
    }

    #[test]
    fn test_null_error_is_ignored() {
        assert_eq!(
            classify_status(&json!({"error": null, "status": "RUNNING"}), &fields()).unwrap(),
            JobStatus::Running
        );
    }

    #[test]
    fn test_falsy_error_flags_are_ignored() {
        for flag in [json!(false), json!(0), json!(true), json!({}), json!("")] {
            let body = json!({"status": "RUNNING", "error": flag});
            assert_eq!(
                classify_status(&body, &fields()).unwrap(),
                JobStatus::Running,
                "{body}"
            );
        }
    }

    #[test]
    fn test_error_object_uses_message() {
        assert_eq!(
            classify_status(&json!({"error": {"message": "page 3 unreadable"}}), &fields())
                .unwrap(),
            JobStatus::Failed("page 3 unreadable".to_string())
        );
        assert_eq!(
            classify_status(&json!({"errorMessage": {"code": 7}}), &fields()).unwrap(),
            JobStatus::Failed("{\"code\":7}".to_string())
        );
    }

    #[test]
    fn test_unrecognised_body_is_malformed() {
        assert!(matches!(
            classify_status(&json!({"hello": "world"}), &fields()),
            Err(StatusError::Malformed(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ąęść", 3), "ą");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
