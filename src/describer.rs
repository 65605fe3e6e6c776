use crate::config::DescriberConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum DescriberError {
    #[error("no API key configured for the description service")]
    MissingApiKey,
    #[error("description request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("description service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected description response: {0}")]
    InvalidResponse(String),
}

/// Anything that can produce a free-text answer about an image. Handlers
/// depend on this seam so tests run without network access.
#[async_trait]
pub trait Describer: Send + Sync + 'static {
    async fn describe(&self, image_base64: &str, prompt: &str) -> Result<String, DescriberError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint with vision
/// input. The API key comes from the environment; when it is absent every
/// describe call fails, but startup proceeds.
pub struct OpenAiDescriber {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl OpenAiDescriber {
    pub fn new(config: &DescriberConfig) -> Result<Self, DescriberError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set, description requests will be rejected",
                config.api_key_env
            );
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
        })
    }
}

#[async_trait]
impl Describer for OpenAiDescriber {
    async fn describe(&self, image_base64: &str, prompt: &str) -> Result<String, DescriberError> {
        let api_key = self.api_key.as_ref().ok_or(DescriberError::MissingApiKey)?;

        let data_url = format!("data:image/jpeg;base64,{}", image_base64);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: serde_json::json!([
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]),
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(DescriberError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DescriberError::InvalidResponse("no choices in response".to_string()))?;

        Ok(choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DescriberConfig;

    fn test_config(api_key_env: &str) -> DescriberConfig {
        DescriberConfig {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            api_key_env: api_key_env.to_string(),
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_per_call_not_at_startup() {
        let describer =
            OpenAiDescriber::new(&test_config("VISION_GATEWAY_TEST_UNSET_KEY")).unwrap();
        let result = describer.describe("aGVsbG8=", "describe this").await;
        assert!(matches!(result, Err(DescriberError::MissingApiKey)));
    }

    #[test]
    fn request_body_carries_prompt_and_image_url() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: serde_json::json!([
                    {"type": "text", "text": "count the cells"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
                ]),
            }],
            max_tokens: 1000,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["content"][0]["text"], "count the cells");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn response_content_is_extracted() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"two red blood cells"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "two red blood cells");
    }
}
