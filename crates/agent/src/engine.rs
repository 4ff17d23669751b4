//! Orchestrates one recommendation run.
//!
//! The full pipeline is sliders, features, semantic intent, context refinement, and
//! arbitration over one ledger, then aggregation. If the first provider call of a run
//! hits an outage the whole run restarts on the rules-only path. Later provider
//! failures only cost the stage they happen in.

use std::sync::Arc;

use pumpfit_core::config::AppConfig;
use pumpfit_core::fallback::FallbackEngine;
use pumpfit_core::scoring::{aggregate, FeatureStage, SliderStage};
use pumpfit_core::{
    PipelineContext, PreferenceProfile, Recommendation, Stage, StageOutcome, ValidationError,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::guardrails::DeltaGuardrails;
use crate::llm::{LlmError, Reasoner};
use crate::providers::reasoner_from_config;
use crate::stages::{ArbitrationStage, ContextRefinementStage, SemanticIntentStage};

#[derive(Clone)]
pub struct RecommendationEngine {
    stages: Vec<Arc<dyn Stage>>,
    provider: Option<&'static str>,
}

impl RecommendationEngine {
    /// Never contacts a provider.
    pub fn rules_only() -> Self {
        Self { stages: Vec::new(), provider: None }
    }

    pub fn with_reasoner(reasoner: Reasoner) -> Self {
        Self::with_guardrails(reasoner, DeltaGuardrails::default())
    }

    pub fn with_guardrails(reasoner: Reasoner, guardrails: DeltaGuardrails) -> Self {
        let provider = reasoner.provider_name();
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(SliderStage),
            Arc::new(FeatureStage),
            Arc::new(SemanticIntentStage::new(reasoner.clone(), guardrails.clone())),
            Arc::new(ContextRefinementStage::new(reasoner.clone(), guardrails.clone())),
            Arc::new(ArbitrationStage::new(reasoner, guardrails)),
        ];
        Self { stages, provider: Some(provider) }
    }

    /// Runs `stages` in order in place of the default pipeline.
    pub fn with_stages(stages: Vec<Arc<dyn Stage>>) -> Self {
        let provider = stages.iter().any(|stage| stage.calls_provider()).then_some("custom");
        Self { stages, provider }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        Ok(match reasoner_from_config(config)? {
            Some(reasoner) => Self::with_reasoner(reasoner),
            None => Self::rules_only(),
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.unwrap_or("none")
    }

    pub async fn recommend_payload(
        &self,
        payload: &Value,
    ) -> Result<Recommendation, ValidationError> {
        let profile = PreferenceProfile::from_value(payload)?;
        Ok(self.recommend(profile).await)
    }

    /// Always returns a complete recommendation.
    pub async fn recommend(&self, profile: PreferenceProfile) -> Recommendation {
        if self.stages.is_empty() || profile.is_empty() {
            let recommendation = FallbackEngine::recommend(profile, None).await;
            log_completion(&recommendation);
            return recommendation;
        }

        let mut ctx = PipelineContext::new(profile.clone());
        let mut contacted = false;
        let mut ai_assisted = false;

        for stage in &self.stages {
            let stage = stage.as_ref();
            let first_call =
                stage.calls_provider() && !contacted && stage.skip_reason(&ctx).is_none();

            match ctx.run(stage).await {
                Ok(report) => {
                    if stage.calls_provider() && report.is_applied() {
                        contacted = true;
                        ai_assisted = true;
                    }
                    if let StageOutcome::Applied { entries } = report.outcome {
                        debug!(
                            event_name = "pipeline.stage.completed",
                            stage = stage.kind().as_str(),
                            entries,
                            "stage applied"
                        );
                    }
                }
                Err(failure) if first_call && failure.is_outage() => {
                    warn!(
                        event_name = "pipeline.fallback.activated",
                        stage = stage.kind().as_str(),
                        error_class = failure.error_class(),
                        error = %failure,
                        "reasoning provider unavailable, scoring with rules only"
                    );
                    let recommendation =
                        FallbackEngine::recommend(profile, Some(failure.to_string())).await;
                    log_completion(&recommendation);
                    return recommendation;
                }
                Err(failure) => {
                    contacted |= stage.calls_provider();
                    warn!(
                        event_name = "pipeline.stage.degraded",
                        stage = stage.kind().as_str(),
                        error_class = failure.error_class(),
                        error = %failure,
                        "stage contributed nothing"
                    );
                }
            }
        }

        let recommendation = aggregate(ctx, ai_assisted, None);
        log_completion(&recommendation);
        recommendation
    }
}

fn log_completion(recommendation: &Recommendation) {
    info!(
        event_name = "pipeline.completed",
        top = recommendation.overall_top.id.key(),
        score = recommendation.overall_top.score,
        ai_assisted = recommendation.ai_assisted,
        fallback = recommendation.debug.fallback_reason.is_some(),
        "recommendation produced"
    );
}
