//! HTTP client for an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::Classifier;
use crate::config::{Config, ConfigError};
use crate::prompt::user_message;

/// Labeling client errors. All of them are recoverable per row.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized: check OPENAI_API_KEY")]
    Unauthorized,

    #[error("HTTP error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Unexpected response: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiClient {
    /// Build from configuration: timeout and optional CA bundle.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(ref path) = config.ca_bundle {
            let pem = std::fs::read(path).map_err(|source| ConfigError::CaBundleUnreadable {
                path: path.clone(),
                source,
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                ConfigError::InvalidCaBundle {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            if certs.is_empty() {
                return Err(ConfigError::InvalidCaBundle {
                    path: path.clone(),
                    reason: "no certificates found".to_string(),
                });
            }
            debug!(path = %path.display(), count = certs.len(), "Trusting extra CA certificates");
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self::with_client(
            config.base_url.clone(),
            config.api_key.clone(),
            builder.build()?,
        ))
    }

    /// Create with an explicit HTTP client.
    pub fn with_client(base_url: impl Into<String>, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response(&self, response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                _ => Err(ClientError::Api { status, body }),
            };
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::Parse(format!("{}: {}", e, body)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClientError::Parse(format!("no message content in {}", body)))?;

        extract_label(&content)
            .ok_or_else(|| ClientError::Parse(format!("empty label in {:?}", content)))
    }
}

#[async_trait]
impl Classifier for OpenAiClient {
    async fn classify(
        &self,
        prompt: &str,
        subject_name: &str,
        model: &str,
    ) -> Result<String, ClientError> {
        let user = user_message(subject_name);
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        self.handle_response(response).await
    }
}

/// Pull a single label out of free-form model output.
///
/// Takes the first non-empty line and strips surrounding quotes/backticks
/// and a trailing period. Returns `None` if nothing is left.
pub fn extract_label(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    let label = line
        .trim_end_matches('.')
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim();
    (!label.is_empty()).then(|| label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_label() {
        assert_eq!(extract_label("Indian"), Some("Indian".to_string()));
    }

    #[test]
    fn test_extract_strips_quotes_and_period() {
        assert_eq!(extract_label("  \"East Asian.\"\n"), Some("East Asian".to_string()));
        assert_eq!(extract_label("'Latino'."), Some("Latino".to_string()));
    }

    #[test]
    fn test_extract_first_non_empty_line() {
        assert_eq!(
            extract_label("\n\nEuropean\nThe surname is common in Germany."),
            Some("European".to_string())
        );
    }

    #[test]
    fn test_extract_empty() {
        assert_eq!(extract_label("   \n  "), None);
        assert_eq!(extract_label("\"\""), None);
    }
}
