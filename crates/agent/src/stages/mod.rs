//! Provider-backed stages. Each one asks the [`Reasoner`](crate::llm::Reasoner) once,
//! runs the reply through the guardrails, and only then touches the ledger.

pub mod arbitration;
pub mod context;
pub mod intent;

use pumpfit_core::PipelineContext;
use tracing::warn;

use crate::guardrails::Discard;

pub use arbitration::ArbitrationStage;
pub use context::ContextRefinementStage;
pub use intent::SemanticIntentStage;

fn record_discards(ctx: &mut PipelineContext, discards: Vec<Discard>) {
    for discard in discards {
        warn!(
            event_name = "pipeline.catalog_inconsistency",
            stage = discard.stage.as_str(),
            item = %discard.item,
            delta = discard.delta,
            "discarded delta for an item the stage may not score"
        );
        ctx.discard(discard.stage, discard.item, discard.delta);
    }
}
