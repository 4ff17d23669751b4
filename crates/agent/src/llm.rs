use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pumpfit_core::config::LlmConfig;
use pumpfit_core::StageFailure;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider unreachable: {0}")]
    Unavailable(String),
    #[error("provider call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("provider response could not be used: {0}")]
    Malformed(String),
    #[error("provider rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("provider is misconfigured: {0}")]
    Config(String),
}

impl From<LlmError> for StageFailure {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Timeout { timeout_secs } => Self::ProviderTimeout { timeout_secs },
            LlmError::Malformed(detail) => Self::ProviderMalformedResponse(detail),
            LlmError::Unavailable(_) | LlmError::Rejected { .. } | LlmError::Config(_) => {
                Self::ProviderUnavailable(error.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout { timeout_secs: 0 }
        } else if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

/// Which configured model a call should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Reasoning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object when it supports a response format switch.
    pub json: bool,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Tier-to-model resolution and a per-call deadline around an [`LlmClient`].
#[derive(Clone)]
pub struct Reasoner {
    client: Arc<dyn LlmClient>,
    fast_model: String,
    reasoning_model: String,
    timeout: Duration,
    max_tokens: u32,
}

impl Reasoner {
    pub fn new(client: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            fast_model: config.fast_model.clone(),
            reasoning_model: config.reasoning_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.name()
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Reasoning => &self.reasoning_model,
        }
    }

    /// One provider round-trip. No retries.
    pub async fn ask(&self, tier: ModelTier, system: &str, user: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.model_for(tier).to_string(),
            system: system.to_string(),
            user: user.to_string(),
            max_tokens: self.max_tokens,
            json: true,
        };

        match tokio::time::timeout(self.timeout, self.client.complete(&request)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(LlmError::Timeout { .. })) | Err(_) => {
                Err(LlmError::Timeout { timeout_secs: self.timeout.as_secs() })
            }
            Ok(Err(error)) => Err(error),
        }
    }

    /// Like [`Reasoner::ask`], decoding the first JSON object in the reply.
    pub async fn ask_json<T>(
        &self,
        tier: ModelTier,
        system: &str,
        user: &str,
    ) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
    {
        let text = self.ask(tier, system, user).await?;
        parse_json_reply(&text)
    }
}

/// Decodes a reply that may wrap its JSON in code fences or prose.
pub fn parse_json_reply<T>(reply: &str) -> Result<T, LlmError>
where
    T: DeserializeOwned,
{
    let start = reply
        .find('{')
        .ok_or_else(|| LlmError::Malformed("reply contains no JSON object".to_string()))?;

    // Only the first complete value is decoded; whatever follows it is ignored.
    match serde_json::Deserializer::from_str(&reply[start..]).into_iter::<T>().next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => Err(LlmError::Malformed(error.to_string())),
        None => Err(LlmError::Malformed("reply contains no JSON object".to_string())),
    }
}
