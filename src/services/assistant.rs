use crate::config::ClientConfig;
use crate::error::AssistantError;
use crate::models::LocalFile;
use crate::services::artifact::encode_payload;
use crate::services::envelope::{find_string, parse_body};
use crate::utils::validation::{sanitize_filename, validate_file_size, validate_mime_type};
use serde::Serialize;
use url::Url;

/// Document kinds accepted by the assistant
pub const ASSISTANT_MIME_TYPES: &[&str] = &["application/pdf", "text/plain", "image/png", "image/jpeg"];

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum AssistantRequest<'a> {
    Upload {
        #[serde(rename = "fileName")]
        file_name: &'a str,
        #[serde(rename = "fileBase64")]
        file_base64: String,
    },
    Query {
        question: &'a str,
    },
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Client for the discharge-summary assistant: uploads documents, then
/// answers questions about them. Also speaks to the free-form chat endpoint
/// when one is configured.
pub struct AssistantClient {
    client: reqwest::Client,
    url: Option<Url>,
    chat_url: Option<Url>,
    allowed_mime_types: Vec<String>,
    max_file_size: u64,
}

impl AssistantClient {
    pub fn new(client: reqwest::Client, config: &ClientConfig) -> Result<Self, AssistantError> {
        if config.assistant_url.is_none() && config.chat_url.is_none() {
            return Err(AssistantError::NotConfigured);
        }

        Ok(Self {
            client,
            url: config.assistant_url.as_deref().map(Url::parse).transpose()?,
            chat_url: config.chat_url.as_deref().map(Url::parse).transpose()?,
            allowed_mime_types: ASSISTANT_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            max_file_size: config.max_file_size as u64,
        })
    }

    /// Sends one document inline. Validation happens before any request.
    pub async fn upload_document(&self, file: &LocalFile) -> Result<(), AssistantError> {
        validate_mime_type(&file.mime_type, &self.allowed_mime_types)?;
        validate_file_size(file.size, self.max_file_size)?;
        let file_name = sanitize_filename(&file.name)?;

        tracing::info!("📤 Sending {} to assistant", file_name);

        let url = self.url.as_ref().ok_or(AssistantError::NotConfigured)?;
        send(
            &self.client,
            url,
            &AssistantRequest::Upload {
                file_name: &file_name,
                file_base64: encode_payload(&file.content),
            },
        )
        .await?;

        tracing::info!("✅ Assistant accepted {}", file_name);
        Ok(())
    }

    /// Uploads documents one after another, stopping at the first failure.
    pub async fn upload_documents(&self, files: &[LocalFile]) -> Result<usize, AssistantError> {
        for file in files {
            self.upload_document(file).await?;
        }
        Ok(files.len())
    }

    /// Asks a question about the uploaded documents. Returns an empty string
    /// when the assistant replies without an answer.
    pub async fn ask(&self, question: &str) -> Result<String, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        let url = self.url.as_ref().ok_or(AssistantError::NotConfigured)?;
        let body = send(&self.client, url, &AssistantRequest::Query { question }).await?;

        match find_string(&body, &["answer"]) {
            Some((_, answer)) => Ok(answer),
            None => {
                if let Some((_, error)) = find_string(&body, &["error"]) {
                    return Err(AssistantError::Remote(error));
                }
                tracing::warn!("Assistant response carried no answer");
                Ok(String::new())
            }
        }
    }

    /// Sends one chat message and returns the reply.
    pub async fn chat(&self, message: &str) -> Result<String, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }
        let url = self.chat_url.as_ref().ok_or(AssistantError::NotConfigured)?;

        let body = send(&self.client, url, &ChatRequest { message }).await?;

        match find_string(&body, &["reply"]) {
            Some((_, reply)) => Ok(reply),
            None => match find_string(&body, &["error"]) {
                Some((_, error)) => Err(AssistantError::Remote(error)),
                None => Err(AssistantError::Remote("No reply in response".to_string())),
            },
        }
    }
}

async fn send<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &Url,
    request: &T,
) -> Result<serde_json::Value, AssistantError> {
    let response = client.post(url.clone()).json(request).send().await?;

    let status = response.status();
    let text = response.text().await?;
    let body = parse_body(&text).unwrap_or(serde_json::Value::Null);

    if !status.is_success() {
        // Error payloads are wrapped the same way as answers
        let message = find_string(&body, &["error", "message"])
            .map(|(_, m)| m)
            .unwrap_or_else(|| format!("status {}", status.as_u16()));
        return Err(AssistantError::Remote(message));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shapes() {
        let upload = AssistantRequest::Upload {
            file_name: "summary.pdf",
            file_base64: "JVBERg==".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&upload).unwrap(),
            json!({"action": "upload", "fileName": "summary.pdf", "fileBase64": "JVBERg=="})
        );

        let query = AssistantRequest::Query {
            question: "What medications should I take?",
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"action": "query", "question": "What medications should I take?"})
        );
    }

    #[test]
    fn test_chat_request_shape() {
        assert_eq!(
            serde_json::to_value(ChatRequest { message: "hi" }).unwrap(),
            json!({"message": "hi"})
        );
    }

    #[tokio::test]
    async fn test_chat_only_client_cannot_ask() {
        let config = ClientConfig {
            chat_url: Some("http://localhost:3000/chat".to_string()),
            ..ClientConfig::default()
        };
        let client = AssistantClient::new(reqwest::Client::new(), &config).unwrap();
        assert!(matches!(
            client.ask("anything").await,
            Err(AssistantError::NotConfigured)
        ));
    }

    #[test]
    fn test_requires_endpoint() {
        let result = AssistantClient::new(reqwest::Client::new(), &ClientConfig::default());
        assert!(matches!(result, Err(AssistantError::NotConfigured)));
    }
}
