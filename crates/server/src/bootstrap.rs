use std::sync::Arc;

use axum::Router;
use pumpfit_agent::{LlmError, RecommendationEngine};
use pumpfit_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("reasoning provider setup failed: {0}")]
    Provider(#[source] LlmError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_enabled = config.llm.enabled,
        "starting application bootstrap"
    );

    let engine = RecommendationEngine::from_config(&config).map_err(BootstrapError::Provider)?;
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        provider = engine.provider_name(),
        ai_enabled = engine.ai_enabled(),
        "recommendation engine initialized"
    );

    Ok(Application { config, engine: Arc::new(engine) })
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(self.engine.clone()).merge(health::router(self.engine.clone()))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.config.server.bind_address, self.config.server.port)
    }
}
