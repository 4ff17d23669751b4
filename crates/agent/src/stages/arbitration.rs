use async_trait::async_trait;
use pumpfit_core::{
    ArbitrationVerdict, EntrySource, LedgerEntry, PipelineContext, Stage, StageFailure, StageKind,
};
use tracing::{debug, warn};

use crate::guardrails::{DeltaGuardrails, VerdictReply};
use crate::llm::{ModelTier, Reasoner};
use crate::prompts;

const BOOST_REASON: &str = "Selected as the best overall fit in the final review";

/// Stage 7: holistic review with the authority to nominate the winner.
#[derive(Clone)]
pub struct ArbitrationStage {
    reasoner: Reasoner,
    guardrails: DeltaGuardrails,
}

impl ArbitrationStage {
    pub fn new(reasoner: Reasoner, guardrails: DeltaGuardrails) -> Self {
        Self { reasoner, guardrails }
    }
}

#[async_trait]
impl Stage for ArbitrationStage {
    fn kind(&self) -> StageKind {
        StageKind::Arbitration
    }

    fn calls_provider(&self) -> bool {
        true
    }

    async fn apply(&self, ctx: &mut PipelineContext) -> Result<usize, StageFailure> {
        let reply: VerdictReply = self
            .reasoner
            .ask_json(
                ModelTier::Reasoning,
                &prompts::arbitration_system(&self.guardrails),
                &prompts::arbitration_user(&ctx.profile, &ctx.ledger),
            )
            .await?;

        let nominee = reply.top_choice.clone();
        let Some(verdict) = self.guardrails.bound_verdict(reply) else {
            warn!(
                event_name = "pipeline.catalog_inconsistency",
                stage = StageKind::Arbitration.as_str(),
                item = %nominee,
                "arbitration nominated an item outside the catalog"
            );
            let boost = i64::from(self.guardrails.arbitration_boost);
            ctx.discard(StageKind::Arbitration, nominee.clone(), boost);
            return Err(StageFailure::ProviderMalformedResponse(format!(
                "nominee `{nominee}` is not a catalog item"
            )));
        };

        let previous_leader =
            ctx.ledger.leaders(1).first().copied().unwrap_or(verdict.top_choice);
        debug!(
            event_name = "pipeline.arbitration.verdict",
            nominee = verdict.top_choice.key(),
            previous_leader = previous_leader.key(),
            "arbitration verdict received"
        );

        let entry = LedgerEntry::new(EntrySource::Arbitration, verdict.boost, BOOST_REASON);
        ctx.trace.arbitration = Some(ArbitrationVerdict {
            top_choice: verdict.top_choice,
            previous_leader,
            boost: verdict.boost,
            reasons: verdict.reasons,
            insight: verdict.insight,
        });
        Ok(ctx.record_all(vec![(verdict.top_choice, entry)]))
    }
}
