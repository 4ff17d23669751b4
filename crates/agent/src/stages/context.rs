use async_trait::async_trait;
use pumpfit_core::{
    ContextRefinement, EntrySource, LedgerEntry, PipelineContext, Stage, StageFailure, StageKind,
};

use crate::guardrails::{ContextReply, DeltaGuardrails};
use crate::llm::{ModelTier, Reasoner};
use crate::prompts;
use crate::stages::record_discards;

const DEFAULT_JUSTIFICATION: &str = "Adjusted for your follow-up answers";

/// Stage 6: small corrections to the leading candidates from follow-up answers.
/// Skipped outright when there are no answers.
#[derive(Clone)]
pub struct ContextRefinementStage {
    reasoner: Reasoner,
    guardrails: DeltaGuardrails,
}

impl ContextRefinementStage {
    pub fn new(reasoner: Reasoner, guardrails: DeltaGuardrails) -> Self {
        Self { reasoner, guardrails }
    }
}

#[async_trait]
impl Stage for ContextRefinementStage {
    fn kind(&self) -> StageKind {
        StageKind::ContextRefinement
    }

    fn calls_provider(&self) -> bool {
        true
    }

    fn skip_reason(&self, ctx: &PipelineContext) -> Option<&'static str> {
        ctx.profile.follow_up().is_none().then_some("no follow-up answers")
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let candidates = ctx.ledger.leaders(self.guardrails.context_candidates);
        let reply: ContextReply = self
            .reasoner
            .ask_json(
                ModelTier::Reasoning,
                &prompts::context_system(&self.guardrails),
                &prompts::context_user(&ctx.profile, &ctx.ledger, &candidates),
            )
            .await?;

        let bounded = self.guardrails.bound_context(reply, &candidates);
        record_discards(ctx, bounded.discarded);

        let reason = if bounded.justification.is_empty() {
            DEFAULT_JUSTIFICATION.to_string()
        } else {
            bounded.justification.clone()
        };
        let entries = bounded
            .deltas
            .iter()
            .map(|(item, delta)| {
                (*item, LedgerEntry::new(EntrySource::ContextRefinement, *delta, reason.clone()))
            })
            .collect();

        ctx.trace.context_refinement = Some(ContextRefinement {
            candidates,
            deltas: bounded.deltas.into_iter().collect(),
            justification: bounded.justification,
        });
        Ok(ctx.record_all(entries))
    }
}
