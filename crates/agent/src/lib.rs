//! Reasoning side of the recommendation pipeline.
//!
//! - `llm`: the provider seam (`LlmClient`) and the tiered, deadline-bound `Reasoner`
//! - `providers`: OpenAI-compatible and Anthropic HTTP clients, chosen from config
//! - `prompts`: catalog context and per-stage instructions
//! - `guardrails`: caps and catalog checks applied to every provider reply
//! - `stages`: semantic intent, context refinement, arbitration
//! - `engine`: `RecommendationEngine`, which runs the pipeline and owns the fallback decision
//!
//! The provider only ever proposes deltas. What lands in the ledger is decided here.

pub mod engine;
pub mod guardrails;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod stages;

pub use engine::RecommendationEngine;
pub use guardrails::DeltaGuardrails;
pub use llm::{CompletionRequest, LlmClient, LlmError, ModelTier, Reasoner};
