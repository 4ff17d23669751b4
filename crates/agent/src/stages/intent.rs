use async_trait::async_trait;
use pumpfit_core::{
    EntrySource, ExtractedIntent, LedgerEntry, PipelineContext, Stage, StageFailure, StageKind,
};
use tracing::debug;

use crate::guardrails::{DeltaGuardrails, IntentReply};
use crate::llm::{ModelTier, Reasoner};
use crate::prompts;
use crate::stages::record_discards;

/// Stage 5: reads weighted intents out of the narrative. Uses the fast tier.
#[derive(Clone)]
pub struct SemanticIntentStage {
    reasoner: Reasoner,
    guardrails: DeltaGuardrails,
}

impl SemanticIntentStage {
    pub fn new(reasoner: Reasoner, guardrails: DeltaGuardrails) -> Self {
        Self { reasoner, guardrails }
    }
}

#[async_trait]
impl Stage for SemanticIntentStage {
    fn kind(&self) -> StageKind {
        StageKind::SemanticIntent
    }

    fn calls_provider(&self) -> bool {
        true
    }

    fn skip_reason(&self, ctx: &PipelineContext) -> Option<&'static str> {
        ctx.profile.narrative().is_empty().then_some("empty narrative")
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let reply: IntentReply = self
            .reasoner
            .ask_json(
                ModelTier::Fast,
                &prompts::intent_system(&self.guardrails),
                &prompts::intent_user(&ctx.profile, &ctx.ledger),
            )
            .await?;

        let bounded = self.guardrails.bound_intents(reply);
        record_discards(ctx, bounded.discarded);

        let mut entries = Vec::new();
        for intent in bounded.intents {
            debug!(
                event_name = "pipeline.intent.extracted",
                label = %intent.label,
                confidence = intent.confidence,
                items = intent.deltas.len(),
                "semantic intent extracted"
            );
            for (item, delta) in &intent.deltas {
                entries.push((
                    *item,
                    LedgerEntry::new(
                        EntrySource::Intent { label: intent.label.clone() },
                        *delta,
                        intent.reason.clone(),
                    ),
                ));
            }
            ctx.trace.intents.push(ExtractedIntent {
                label: intent.label,
                confidence: intent.confidence,
                deltas: intent.deltas.into_iter().collect(),
            });
        }

        Ok(ctx.record_all(entries))
    }
}
