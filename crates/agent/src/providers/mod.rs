pub mod anthropic;
pub mod openai_compatible;

use std::sync::Arc;
use std::time::Duration;

use pumpfit_core::config::{AppConfig, LlmProvider};

use crate::llm::{LlmClient, LlmError, Reasoner};

pub use anthropic::AnthropicClient;
pub use openai_compatible::OpenAiCompatibleClient;

/// Builds the configured provider client. `None` when reasoning is disabled.
pub fn client_from_config(config: &AppConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    if !config.llm.enabled {
        return Ok(None);
    }

    // The reqwest deadline sits a little past the per-call timeout the Reasoner enforces.
    let timeout = Duration::from_secs(config.llm.timeout_secs + 1);
    let base_url = config.llm_base_url().to_string();

    let client: Arc<dyn LlmClient> = match config.llm.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient::new(
            "openai",
            base_url,
            config.llm.api_key.clone(),
            timeout,
        )?),
        LlmProvider::Ollama => {
            Arc::new(OpenAiCompatibleClient::new("ollama", base_url, None, timeout)?)
        }
        LlmProvider::Anthropic => {
            let api_key = config.llm.api_key.clone().ok_or_else(|| {
                LlmError::Config("llm.api_key is required for anthropic".to_string())
            })?;
            Arc::new(AnthropicClient::new(base_url, api_key, timeout)?)
        }
    };
    Ok(Some(client))
}

pub fn reasoner_from_config(config: &AppConfig) -> Result<Option<Reasoner>, LlmError> {
    Ok(client_from_config(config)?.map(|client| Reasoner::new(client, &config.llm)))
}
