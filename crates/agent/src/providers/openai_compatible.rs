//! OpenAI chat completions. Ollama serves the same API under `/v1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::llm::{CompletionRequest, LlmClient, LlmError};

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    name: &'static str,
    base_url: String,
    api_key: Option<SecretString>,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Config(error.to_string()))?;
        Ok(Self { name, base_url: base_url.into(), api_key, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            max_tokens: request.max_tokens,
            temperature: 0.2,
            response_format: request.json.then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut call = self.client.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key.expose_secret());
        }

        let response = call.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Rejected { status, body });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::Malformed("no completion choices returned".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}
